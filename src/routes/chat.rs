use actix_web::{delete, get, put, web, Error, HttpResponse};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::config::SIGNED_URL_TTL_SECS;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{Chat, Message};
use crate::types::{ChatWithMessages, UpdateChatRequest};
use crate::AppState;

#[get("")]
async fn list_chats(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<web::Json<Vec<Chat>>, Error> {
    let chats = Chat::list_for_user(&app_state.pool, &authenticated_user.user_id)
        .await
        .map_err(|e| {
            error!("Failed to list chats: {:?}", e);
            actix_web::error::ErrorInternalServerError(e)
        })?;

    Ok(web::Json(chats))
}

/// Returns the chat and its messages oldest-first. Attachment URLs are
/// re-signed on every read; a signing failure keeps the stored URL rather
/// than failing the request.
#[get("/{chat_id}")]
async fn get_chat(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    chat_id: web::Path<Uuid>,
) -> Result<web::Json<ChatWithMessages>, Error> {
    let chat = Chat::get(
        &app_state.pool,
        chat_id.into_inner(),
        &authenticated_user.user_id,
    )
    .await
    .map_err(|e| {
        error!("Failed to fetch chat: {:?}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?
    .ok_or_else(|| actix_web::error::ErrorNotFound("Chat not found"))?;

    let mut messages = Message::for_chat(&app_state.pool, chat.id).await.map_err(|e| {
        error!("Failed to fetch messages: {:?}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?;

    for message in &mut messages {
        for attachment in &mut message.attachments.0 {
            match app_state
                .store
                .create_signed_url(&attachment.storage_path, SIGNED_URL_TTL_SECS)
                .await
            {
                Ok(url) => attachment.url = url,
                Err(e) => {
                    error!(
                        "Error generating signed URL for {}: {:?}",
                        attachment.storage_path, e
                    );
                }
            }
        }
    }

    Ok(web::Json(ChatWithMessages { chat, messages }))
}

#[put("/{chat_id}")]
async fn update_chat(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    chat_id: web::Path<Uuid>,
    web::Json(update_chat_request): web::Json<UpdateChatRequest>,
) -> Result<web::Json<Chat>, Error> {
    if update_chat_request.title.trim().is_empty() {
        return Err(actix_web::error::ErrorBadRequest("Title cannot be empty"));
    }

    let chat = Chat::update_title(
        &app_state.pool,
        chat_id.into_inner(),
        &authenticated_user.user_id,
        update_chat_request.title.trim(),
    )
    .await
    .map_err(|e| {
        error!("Failed to update chat: {:?}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?;

    Ok(web::Json(chat))
}

#[delete("/{chat_id}")]
async fn delete_chat(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    chat_id: web::Path<Uuid>,
) -> Result<HttpResponse, Error> {
    Chat::delete(
        &app_state.pool,
        chat_id.into_inner(),
        &authenticated_user.user_id,
    )
    .await
    .map_err(|e| {
        error!("Failed to delete chat: {:?}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?;

    Ok(HttpResponse::NoContent().finish())
}
