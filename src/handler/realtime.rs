use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query,
    },
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{chatdb::ChatExt, userdb::UserExt},
    error::{ErrorMessage, HttpError},
    service::realtime::RealtimeEvent,
    utils::token,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// Events a connected client may push over the socket. Same envelope shape
/// as the server-to-client frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    PrivateMessage {
        chat_id: Uuid,
        message: String,
        receiver_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    Typing { to: Uuid, is_typing: bool },
}

/// Upgrades to a websocket session on the caller's private channel. The
/// browser WebSocket API cannot set headers, so the token rides in the query
/// string instead of going through the HTTP auth layer.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let subject = token::decode_token(query.token, app_state.env.jwt_secret.as_bytes())?;

    let user_id = Uuid::parse_str(&subject)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, app_state, user.id)))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    tracing::debug!("realtime: user {} connected", user_id);

    let (session, mut events) = app_state.realtime.subscribe(user_id).await;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!("realtime: failed to serialize event: {}", err);
                    continue;
                }
            };

            if ws_sender.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let state = app_state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = ws_receiver.next().await {
            if let WsMessage::Text(text) = frame {
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => handle_client_event(&state, user_id, event).await,
                    Err(err) => {
                        tracing::debug!("realtime: ignoring malformed frame: {}", err);
                    }
                }
            }
        }
    });

    // Whichever half finishes first tears the session down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    app_state.realtime.unsubscribe(&session).await;
}

/// Socket-originated events. Failures are logged and swallowed; a bad frame
/// never terminates the session, matching the request path where delivery
/// problems do not surface as errors.
async fn handle_client_event(app_state: &Arc<AppState>, user_id: Uuid, event: ClientEvent) {
    match event {
        ClientEvent::PrivateMessage {
            chat_id,
            message,
            receiver_id,
        } => {
            if message.trim().is_empty() {
                return;
            }

            let chat = match app_state.db_client.get_chat_by_id(chat_id).await {
                Ok(Some(chat)) => chat,
                Ok(None) => {
                    tracing::debug!("realtime: message for unknown chat {}", chat_id);
                    return;
                }
                Err(err) => {
                    tracing::warn!("realtime: chat lookup failed: {}", err);
                    return;
                }
            };

            if !chat.is_participant(user_id) || !chat.is_participant(receiver_id) {
                tracing::debug!(
                    "realtime: user {} not allowed to post in chat {}",
                    user_id,
                    chat_id
                );
                return;
            }

            // Persist first; the store is the system of record.
            let stored = match app_state
                .db_client
                .send_message(chat_id, user_id, message)
                .await
            {
                Ok(stored) => stored,
                Err(err) => {
                    tracing::warn!("realtime: failed to persist message: {}", err);
                    return;
                }
            };

            // Fan out to both sides so the sender's other sessions stay in
            // sync too.
            app_state
                .realtime
                .send(receiver_id, RealtimeEvent::NewMessage(stored.clone()))
                .await;
            app_state
                .realtime
                .send(user_id, RealtimeEvent::NewMessage(stored))
                .await;
        }

        ClientEvent::Typing { to, is_typing } => {
            app_state
                .realtime
                .send(
                    to,
                    RealtimeEvent::Typing {
                        from: user_id,
                        is_typing,
                    },
                )
                .await;
        }
    }
}
