use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{chatdb::ChatExt, listingdb::ListingExt, userdb::UserExt},
    dtos::chatdtos::{PaginationQuery, SendMessageDto},
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddeware,
    models::chatmodels::Chat,
    service::realtime::RealtimeEvent,
    AppState,
};

pub fn message_handler() -> Router {
    Router::new()
        .route("/", post(send_message))
        .route("/chats", get(get_user_chats))
        .route("/chat/:chat_id", get(get_chat_messages))
        .route("/read/:chat_id", put(mark_chat_as_read))
        .route("/unread-count", get(get_unread_count))
}

/// Resolves the target chat for a send: an explicit chat id, or a lazy
/// find-or-create against a receiver (optionally scoped to a listing).
async fn resolve_chat(
    app_state: &Arc<AppState>,
    sender_id: Uuid,
    body: &SendMessageDto,
) -> Result<(Chat, bool), HttpError> {
    if let Some(chat_id) = body.chat_id {
        let chat = app_state
            .db_client
            .get_chat_by_id(chat_id)
            .await
            .map_err(|e| HttpError::server_error(e.to_string()))?
            .ok_or_else(|| HttpError::not_found(ErrorMessage::ChatNotFound.to_string()))?;

        return Ok((chat, false));
    }

    let receiver_id = body.receiver_id.ok_or_else(|| {
        HttpError::bad_request("Either chatId or receiverId must be provided")
    })?;

    if receiver_id == sender_id {
        return Err(HttpError::bad_request("Cannot message yourself"));
    }

    let _receiver = app_state
        .db_client
        .get_user(Some(receiver_id), None)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Receiver not found"))?;

    if let Some(listing_id) = body.listing_id {
        let _listing = app_state
            .db_client
            .get_listing_by_id(listing_id)
            .await
            .map_err(|e| HttpError::server_error(e.to_string()))?
            .ok_or_else(|| HttpError::not_found(ErrorMessage::ListingNotFound.to_string()))?;
    }

    let (chat, created) = app_state
        .db_client
        .find_or_create_chat(sender_id, receiver_id, body.listing_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok((chat, created))
}

pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    if body.content.trim().is_empty() {
        return Err(HttpError::bad_request(
            ErrorMessage::EmptyMessageContent.to_string(),
        ));
    }

    let (chat, created) = resolve_chat(&app_state, auth.user.id, &body).await?;

    if !chat.is_participant(auth.user.id) {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let message = app_state
        .db_client
        .send_message(chat.id, auth.user.id, body.content)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    // The message is durable at this point; pushes are best-effort and never
    // fail the request.
    let other = chat.other_participant(auth.user.id);
    if created {
        app_state
            .realtime
            .send(
                other,
                RealtimeEvent::NewChat {
                    chat: chat.clone(),
                    message: message.clone(),
                },
            )
            .await;
    } else {
        app_state
            .realtime
            .send(other, RealtimeEvent::NewMessage(message.clone()))
            .await;
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "success",
            "chat": chat,
            "message": message
        })),
    ))
}

pub async fn get_user_chats(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit.unwrap_or(20).min(100) as i64;
    let offset = ((page - 1) as i64) * limit;

    let chats = app_state
        .db_client
        .get_user_chats(auth.user.id, limit, offset)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "chats": chats
    })))
}

pub async fn get_chat_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(chat_id): Path<Uuid>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let chat = app_state
        .db_client
        .get_chat_by_id(chat_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ChatNotFound.to_string()))?;

    if !chat.is_participant(auth.user.id) {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit.unwrap_or(50).min(200) as i64;
    let offset = ((page - 1) as i64) * limit;

    // Reading a chat marks everything addressed to the reader as read, so
    // the page returned below already reflects the new read state.
    app_state
        .db_client
        .mark_messages_as_read(chat_id, auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let messages = app_state
        .db_client
        .get_chat_messages(chat_id, limit, offset)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "messages": messages
    })))
}

pub async fn mark_chat_as_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let chat = app_state
        .db_client
        .get_chat_by_id(chat_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ChatNotFound.to_string()))?;

    if !chat.is_participant(auth.user.id) {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let marked = app_state
        .db_client
        .mark_messages_as_read(chat_id, auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "markedRead": marked
    })))
}

pub async fn get_unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let count = app_state
        .db_client
        .get_unread_count(auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "unreadCount": count
    })))
}
