use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, FromRow, PgPool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// One uploaded file's durable record. Stored inline on the owning message
/// as JSONB; the access URL is re-signed on every read while storage_path
/// stays fixed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub storage_path: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Untruncated extraction result, kept in its own table so the full text
/// survives the display truncation. Written best-effort after the message
/// insert.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttachmentText {
    pub id: Uuid,
    pub attachment_id: Uuid,
    pub chat_id: Uuid,
    pub message_id: Uuid,
    pub user_id: String,
    pub storage_path: String,
    pub extracted_text: String,
    pub created_at: DateTime<Utc>,
}

impl AttachmentText {
    pub fn new(
        attachment_id: Uuid,
        chat_id: Uuid,
        message_id: Uuid,
        user_id: &str,
        storage_path: &str,
        extracted_text: &str,
    ) -> Self {
        AttachmentText {
            id: Uuid::new_v4(),
            attachment_id,
            chat_id,
            message_id,
            user_id: user_id.to_string(),
            storage_path: storage_path.to_string(),
            extracted_text: extracted_text.to_string(),
            created_at: Utc::now(),
        }
    }

    pub async fn insert_all(pool: &PgPool, records: &[AttachmentText]) -> Result<()> {
        for record in records {
            query(
                r#"
                INSERT INTO attachment_texts
                    (id, attachment_id, chat_id, message_id, user_id, storage_path, extracted_text, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(record.id)
            .bind(record.attachment_id)
            .bind(record.chat_id)
            .bind(record.message_id)
            .bind(&record.user_id)
            .bind(&record.storage_path)
            .bind(&record.extracted_text)
            .bind(record.created_at)
            .execute(pool)
            .await?;
        }

        debug!("Persisted {} attachment text records", records.len());
        Ok(())
    }
}
