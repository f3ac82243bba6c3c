use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, PgPool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Inserts a new chat for the user. The title is fixed at creation and
    /// only changes through an explicit rename.
    pub async fn create(pool: &PgPool, user_id: &str, title: &str) -> Result<Self> {
        let now = Utc::now();
        let chat = query_as::<_, Chat>(
            r#"
            INSERT INTO chats (id, user_id, title, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;

        debug!("Chat created: {:?}", chat);
        Ok(chat)
    }

    pub async fn get(pool: &PgPool, chat_id: Uuid, user_id: &str) -> Result<Option<Self>> {
        let chat = query_as::<_, Chat>(
            r#"
            SELECT * FROM chats
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(chat)
    }

    /// All chats for the user, most recently active first.
    pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Self>> {
        let chats = query_as::<_, Chat>(
            r#"
            SELECT * FROM chats
            WHERE user_id = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(chats)
    }

    pub async fn update_title(
        pool: &PgPool,
        chat_id: Uuid,
        user_id: &str,
        new_title: &str,
    ) -> Result<Self> {
        let chat = query_as::<_, Chat>(
            r#"
            UPDATE chats
            SET title = $1, updated_at = $2
            WHERE id = $3 AND user_id = $4
            RETURNING *
            "#,
        )
        .bind(new_title)
        .bind(Utc::now())
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        debug!("Chat updated: {:?}", chat);
        Ok(chat)
    }

    /// Advances `updated_at` so the chat sorts to the top of the sidebar.
    pub async fn touch(pool: &PgPool, chat_id: Uuid) -> Result<()> {
        query(
            r#"
            UPDATE chats
            SET updated_at = $1
            WHERE id = $2
            "#,
        )
        .bind(Utc::now())
        .bind(chat_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Deletes a chat and, via foreign keys, every message and attachment
    /// text record under it.
    pub async fn delete(pool: &PgPool, chat_id: Uuid, user_id: &str) -> Result<()> {
        query(
            r#"
            DELETE FROM chats
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        debug!("Chat deleted with id: {:?}", chat_id);
        Ok(())
    }
}
