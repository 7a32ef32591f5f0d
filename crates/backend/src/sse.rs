//! Server-Sent-Events adapter for the push transport seam.
//!
//! Bridges an axum SSE response to the broker's [`Connection`] trait: the
//! broker writes framed events into an unbounded channel, and the
//! response streams them out as `event: notification` / `data: <json>`
//! frames. The broker [`Subscription`] rides inside the stream, so when
//! the client disconnects and axum drops the stream, the registration is
//! removed from both indexes automatically.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

use warrantly_core::{StoreId, UserId};

use crate::broker::{Connection, ConnectionClosed, NotificationBroker, Subscription};

/// A [`Connection`] backed by an SSE event channel.
///
/// Writes never block: they enqueue into the channel and the response
/// task drains it at the client's pace. Once the client disconnects the
/// receiver is gone and writes report [`ConnectionClosed`].
pub struct SseConnection {
    sender: mpsc::UnboundedSender<Event>,
}

impl Connection for SseConnection {
    fn write_event(
        &self,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), ConnectionClosed> {
        let frame = Event::default().event(event).data(payload.to_string());
        self.sender.send(frame).map_err(|_| ConnectionClosed)
    }
}

/// Event stream that keeps its broker registration alive exactly as long
/// as the response does.
pub struct NotificationStream {
    events: UnboundedReceiverStream<Event>,
    _subscription: Subscription,
}

impl Stream for NotificationStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events)
            .poll_next(cx)
            .map(|event| event.map(Ok))
    }
}

/// Open a long-lived notification stream for a subscriber.
///
/// Registers a fresh connection under whichever of `user_id` / `store_id`
/// is present and returns the SSE response to hand back from the route
/// handler. The keep-alive comment frame doubles as dead-peer detection.
pub fn notification_stream(
    broker: &NotificationBroker,
    user_id: Option<UserId>,
    store_id: Option<StoreId>,
) -> Sse<axum::response::sse::KeepAliveStream<NotificationStream>> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let connection = Arc::new(SseConnection { sender });
    let subscription = broker.subscribe(user_id, store_id, connection);

    Sse::new(NotificationStream {
        events: UnboundedReceiverStream::new(receiver),
        _subscription: subscription,
    })
    .keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tokio_stream::StreamExt;

    use warrantly_core::NotificationId;

    use super::*;
    use crate::models::Notification;

    fn notification(user_id: i64) -> Notification {
        Notification {
            id: NotificationId::new(11),
            user_id: Some(UserId::new(user_id)),
            store_id: None,
            title: "เพิ่มใบรับประกันใหม่".to_owned(),
            body: "body".to_owned(),
            data: serde_json::json!({"type": "warranty_created"}),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_event_enqueues_one_frame() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let conn = SseConnection { sender };

        conn.write_event("notification", &serde_json::json!({"id": 11}))
            .expect("write");

        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_write_after_disconnect_reports_closed() {
        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        let conn = SseConnection { sender };

        let result = conn.write_event("notification", &serde_json::json!({}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stream_delivers_published_events() {
        let broker = NotificationBroker::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Arc::new(SseConnection { sender });
        let subscription = broker.subscribe(Some(UserId::new(7)), None, connection);
        let mut stream = NotificationStream {
            events: UnboundedReceiverStream::new(receiver),
            _subscription: subscription,
        };

        assert_eq!(broker.publish(&notification(7)), 1);

        let frame = stream.next().await.expect("frame");
        assert!(frame.is_ok());
    }

    #[tokio::test]
    async fn test_dropping_response_unsubscribes() {
        let broker = NotificationBroker::new();
        let sse = notification_stream(&broker, Some(UserId::new(7)), None);
        assert_eq!(broker.registration_count(), 1);

        // Client disconnect: axum drops the response and its stream.
        drop(sse);
        assert_eq!(broker.registration_count(), 0);
        assert_eq!(broker.publish(&notification(7)), 0);
    }
}
