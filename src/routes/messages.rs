use actix_multipart::Multipart;
use actix_web::{post, web, Error};
use futures_util::StreamExt as _;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::middleware::auth::AuthenticatedUser;
use crate::models::attachment::AttachmentText;
use crate::models::message::{Message, Role};
use crate::models::Chat;
use crate::pipeline::attachments::{process_attachments, UploadedFile};
use crate::pipeline::context::{assemble_context, build_attachments_context};
use crate::pipeline::generate::{generate_reply, generate_title};
use crate::types::SendMessageResponse;
use crate::AppState;

struct SendMessageForm {
    message: String,
    chat_id: Option<Uuid>,
    web_search: bool,
    files: Vec<UploadedFile>,
}

async fn read_form(mut payload: Multipart) -> Result<SendMessageForm, Error> {
    let mut form = SendMessageForm {
        message: String::new(),
        chat_id: None,
        web_search: false,
        files: Vec::new(),
    };

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(actix_web::error::ErrorBadRequest)?;
        let field_name = field.name().to_string();
        let file_name = field
            .content_disposition()
            .get_filename()
            .map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.to_string());

        let mut data = web::BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(actix_web::error::ErrorBadRequest)?;
            data.extend_from_slice(&chunk);
        }

        match field_name.as_str() {
            "message" => form.message = String::from_utf8_lossy(&data).to_string(),
            "chat_id" => {
                let raw = String::from_utf8_lossy(&data);
                let raw = raw.trim();
                if !raw.is_empty() {
                    form.chat_id =
                        Some(Uuid::parse_str(raw).map_err(actix_web::error::ErrorBadRequest)?);
                }
            }
            "web_search" => {
                form.web_search = String::from_utf8_lossy(&data).trim() == "true";
            }
            "files" => form.files.push(UploadedFile {
                name: file_name.unwrap_or_else(|| "upload.bin".to_string()),
                content_type,
                bytes: data.to_vec(),
            }),
            _ => {}
        }
    }

    Ok(form)
}

/// Content stored on the user turn. Attachment-only turns get the
/// placeholder marker so a persisted message never has empty content.
fn user_message_content(text: &str) -> &str {
    if text.trim().is_empty() {
        Message::ATTACHMENT_PLACEHOLDER
    } else {
        text
    }
}

/// The one entry point of the pipeline: accepts the user's text, an optional
/// existing chat id, and raw files; persists the user turn (with processed
/// attachments) and the assistant reply, returning both.
#[post("/send")]
async fn send_message(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    payload: Multipart,
) -> Result<web::Json<SendMessageResponse>, Error> {
    let form = read_form(payload).await?;
    let user_id = authenticated_user.user_id;

    if form.message.trim().is_empty() && form.files.is_empty() {
        return Err(actix_web::error::ErrorBadRequest(
            "Message or attachment required",
        ));
    }

    let chat = match form.chat_id {
        Some(chat_id) => Chat::get(&app_state.pool, chat_id, &user_id)
            .await
            .map_err(|e| {
                error!("Failed to fetch chat: {:?}", e);
                actix_web::error::ErrorInternalServerError(e)
            })?
            .ok_or_else(|| actix_web::error::ErrorNotFound("Chat not found"))?,
        None => {
            let title = if form.message.trim().is_empty() {
                "New conversation".to_string()
            } else {
                let generated = generate_title(&app_state.oai_client, &form.message).await;
                if generated.trim().is_empty() {
                    form.message.trim().chars().take(50).collect()
                } else {
                    generated
                }
            };

            Chat::create(&app_state.pool, &user_id, &title)
                .await
                .map_err(|e| {
                    error!("Failed to create chat: {:?}", e);
                    actix_web::error::ErrorInternalServerError(e)
                })?
        }
    };

    let prior_messages = Message::for_chat(&app_state.pool, chat.id)
        .await
        .map_err(|e| {
            error!("Failed to fetch chat history: {:?}", e);
            actix_web::error::ErrorInternalServerError(e)
        })?;

    // Extraction failures degrade per file inside the pipeline; an error
    // here means an upload failed and the request cannot proceed.
    let processed = process_attachments(
        &app_state.store,
        &app_state.summarizer,
        &user_id,
        chat.id,
        form.files,
    )
    .await
    .map_err(|e| {
        error!("Failed to process attachments: {:?}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?;

    let attachments_context = build_attachments_context(&processed);

    let content = user_message_content(&form.message);
    let attachments = processed
        .iter()
        .map(|item| item.attachment.clone())
        .collect();

    let user_message = Message::insert(
        &app_state.pool,
        chat.id,
        &user_id,
        content,
        Role::User,
        attachments,
    )
    .await
    .map_err(|e| {
        error!("Failed to save message: {:?}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?;

    // Second phase of the non-atomic write: full extraction text goes to its
    // side table. Failure is reported as a warning, never rolled back into
    // the message insert.
    let mut warnings = Vec::new();
    let text_records: Vec<AttachmentText> = processed
        .iter()
        .filter_map(|item| {
            item.full_text.as_ref().map(|full_text| {
                AttachmentText::new(
                    item.attachment.id,
                    chat.id,
                    user_message.id,
                    &user_id,
                    &item.attachment.storage_path,
                    full_text,
                )
            })
        })
        .collect();

    if !text_records.is_empty() {
        if let Err(e) = AttachmentText::insert_all(&app_state.pool, &text_records).await {
            warn!("Failed to save attachment text: {:?}", e);
            warnings.push(format!("Failed to save attachment text: {e}"));
        }
    }

    if let Err(e) = Chat::touch(&app_state.pool, chat.id).await {
        warn!("Failed to bump chat updated_at: {:?}", e);
    }

    let formatted_messages = assemble_context(
        &prior_messages,
        &form.message,
        attachments_context.as_deref(),
    )
    .map_err(|e| {
        error!("Failed to assemble context: {:?}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?;

    let ai_text = generate_reply(
        &app_state.oai_client,
        formatted_messages,
        None,
        0.7,
        form.web_search,
    )
    .await;

    let ai_message = Message::insert(
        &app_state.pool,
        chat.id,
        &user_id,
        &ai_text,
        Role::Assistant,
        Vec::new(),
    )
    .await
    .map_err(|e| {
        error!("Failed to save AI response: {:?}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?;

    Ok(web::Json(SendMessageResponse {
        chat_id: chat.id,
        user_message,
        ai_message,
        warnings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_only_turn_stores_placeholder_content() {
        assert_eq!(user_message_content(""), Message::ATTACHMENT_PLACEHOLDER);
        assert_eq!(user_message_content("   \n\t"), Message::ATTACHMENT_PLACEHOLDER);
        assert_eq!(user_message_content(""), "[Attachment]");
    }

    #[test]
    fn typed_text_is_stored_verbatim() {
        assert_eq!(
            user_message_content("How much should I save?"),
            "How much should I save?"
        );
        // Whitespace-padded text counts as typed text and keeps its padding.
        assert_eq!(user_message_content(" hi "), " hi ");
    }
}
