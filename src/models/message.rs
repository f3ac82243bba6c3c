use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{query_as, FromRow, PgPool, Type};
use uuid::Uuid;

use crate::models::attachment::Attachment;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "role_enum", rename_all = "lowercase")] // SQL value name
#[serde(rename_all = "lowercase")] // JSON value name
pub enum Role {
    Assistant,
    User,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub user_id: String,
    pub content: String,
    pub role: Role,
    pub attachments: Json<Vec<Attachment>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Stored in place of user text when a turn carries only attachments, so
    /// content is never empty.
    pub const ATTACHMENT_PLACEHOLDER: &'static str = "[Attachment]";

    pub async fn insert(
        pool: &PgPool,
        chat_id: Uuid,
        user_id: &str,
        content: &str,
        role: Role,
        attachments: Vec<Attachment>,
    ) -> Result<Self> {
        let message = query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, chat_id, user_id, content, role, attachments, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .bind(user_id)
        .bind(content)
        .bind(role)
        .bind(Json(attachments))
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    /// Full history for a chat, oldest first.
    pub async fn for_chat(pool: &PgPool, chat_id: Uuid) -> Result<Vec<Self>> {
        let messages = query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE chat_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }
}
