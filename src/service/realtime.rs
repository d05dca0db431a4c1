// service/realtime.rs
use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::models::{
    chatmodels::{Chat, Message},
    listingmodel::Listing,
};

/// Events pushed to a connected user's private channel. Serialized as
/// `{"event": "...", "data": {...}}` frames on the websocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RealtimeEvent {
    NewMessage(Message),
    NewChat { chat: Chat, message: Message },
    #[serde(rename_all = "camelCase")]
    NewMatch {
        listing: Listing,
        matched_listing: Listing,
    },
    #[serde(rename_all = "camelCase")]
    Typing { from: Uuid, is_typing: bool },
}

/// Handle identifying one socket session on a user's channel. Teardown goes
/// through the session so a stale socket cannot evict the channel a newer
/// session registered for the same user. The handle is weak: a lingering
/// session must not keep its replaced channel open.
#[derive(Debug)]
pub struct RealtimeSession {
    user_id: Uuid,
    handle: mpsc::WeakUnboundedSender<RealtimeEvent>,
}

/// Low-latency notification layer. Each connected user owns one mpsc channel
/// keyed by user id; delivery is at-most-once and best-effort — events for
/// absent or closed channels are dropped, the durable record stays in the
/// store. FIFO per channel follows from the mpsc queue.
#[derive(Debug, Default)]
pub struct RealtimeService {
    channels: RwLock<HashMap<Uuid, mpsc::UnboundedSender<RealtimeEvent>>>,
}

impl RealtimeService {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `user_id`'s private channel. A reconnect replaces the
    /// previous session; the stale sender is dropped and its socket task
    /// winds down on the closed channel.
    pub async fn subscribe(
        &self,
        user_id: Uuid,
    ) -> (RealtimeSession, mpsc::UnboundedReceiver<RealtimeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let session = RealtimeSession {
            user_id,
            handle: tx.downgrade(),
        };

        let mut channels = self.channels.write().await;
        if channels.insert(user_id, tx).is_some() {
            tracing::debug!("realtime: replaced existing session for user {}", user_id);
        }

        (session, rx)
    }

    /// Removes the registry entry only while it still belongs to this
    /// session; a replaced session's teardown leaves the successor's
    /// channel alone.
    pub async fn unsubscribe(&self, session: &RealtimeSession) {
        // An unupgradable handle means the registry already dropped this
        // channel; whatever entry exists now belongs to a newer session.
        let Some(handle) = session.handle.upgrade() else {
            return;
        };

        let mut channels = self.channels.write().await;

        if let Some(tx) = channels.get(&session.user_id) {
            if tx.same_channel(&handle) {
                channels.remove(&session.user_id);
                tracing::debug!("realtime: user {} disconnected", session.user_id);
            }
        }
    }

    /// Best-effort point-to-point delivery. Never fails the caller: a
    /// missing or closed channel just means the user is offline.
    pub async fn send(&self, to: Uuid, event: RealtimeEvent) {
        let channels = self.channels.read().await;

        match channels.get(&to) {
            Some(tx) => {
                if tx.send(event).is_err() {
                    tracing::debug!("realtime: channel for user {} closed, dropping event", to);
                }
            }
            None => {
                tracing::debug!("realtime: user {} not connected, dropping event", to);
            }
        }
    }

    pub async fn is_connected(&self, user_id: Uuid) -> bool {
        self.channels.read().await.contains_key(&user_id)
    }

    /// Drops every registered channel, ending all connected socket sessions.
    pub async fn shutdown(&self) {
        let mut channels = self.channels.write().await;
        let count = channels.len();
        channels.clear();

        if count > 0 {
            tracing::info!("realtime: shut down, closed {} session(s)", count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(from: Uuid, is_typing: bool) -> RealtimeEvent {
        RealtimeEvent::Typing { from, is_typing }
    }

    #[tokio::test]
    async fn delivers_in_send_order() {
        let service = RealtimeService::new();
        let user = Uuid::new_v4();
        let origin = Uuid::new_v4();

        let (_session, mut rx) = service.subscribe(user).await;

        service.send(user, typing(origin, true)).await;
        service.send(user, typing(origin, false)).await;

        match rx.recv().await.unwrap() {
            RealtimeEvent::Typing { is_typing, .. } => assert!(is_typing),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            RealtimeEvent::Typing { is_typing, .. } => assert!(!is_typing),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn offline_target_drops_event_silently() {
        let service = RealtimeService::new();
        // No subscription; must not panic or error.
        service.send(Uuid::new_v4(), typing(Uuid::new_v4(), true)).await;
    }

    #[tokio::test]
    async fn reconnect_replaces_previous_session() {
        let service = RealtimeService::new();
        let user = Uuid::new_v4();

        let (_first_session, mut first) = service.subscribe(user).await;
        let (_second_session, mut second) = service.subscribe(user).await;

        service.send(user, typing(Uuid::new_v4(), true)).await;

        assert!(second.recv().await.is_some());
        // The first session's sender was dropped on replacement.
        assert!(first.recv().await.is_none());
    }

    #[tokio::test]
    async fn stale_session_teardown_keeps_reconnected_channel() {
        let service = RealtimeService::new();
        let user = Uuid::new_v4();

        let (first_session, mut first) = service.subscribe(user).await;
        let (_second_session, mut second) = service.subscribe(user).await;

        // The replaced session's send loop ends on the closed channel and
        // its teardown runs; the successor must stay registered.
        assert!(first.recv().await.is_none());
        service.unsubscribe(&first_session).await;

        assert!(service.is_connected(user).await);

        service.send(user, typing(Uuid::new_v4(), true)).await;
        assert!(second.recv().await.is_some());
    }

    #[tokio::test]
    async fn unsubscribe_disconnects() {
        let service = RealtimeService::new();
        let user = Uuid::new_v4();

        let (session, _rx) = service.subscribe(user).await;
        assert!(service.is_connected(user).await);

        service.unsubscribe(&session).await;
        assert!(!service.is_connected(user).await);
    }

    #[tokio::test]
    async fn shutdown_closes_all_sessions() {
        let service = RealtimeService::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let (_session_a, mut rx_a) = service.subscribe(a).await;
        let (_session_b, _rx_b) = service.subscribe(b).await;

        service.shutdown().await;

        assert!(!service.is_connected(a).await);
        assert!(!service.is_connected(b).await);
        assert!(rx_a.recv().await.is_none());
    }

    #[test]
    fn event_wire_format() {
        let event = typing(Uuid::nil(), true);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "typing");
        assert_eq!(json["data"]["isTyping"], true);
    }
}
