//! Notification lifecycle: persist-then-publish, subscriber routing,
//! cleanup on disconnect.

use std::sync::Arc;

use warrantly_backend::broker::NOTIFICATION_EVENT;
use warrantly_backend::models::NewNotification;
use warrantly_backend::{NotificationBroker, NotificationService};
use warrantly_core::{NotificationId, StoreId, UserId};
use warrantly_integration_tests::{MemoryStore, RecordingConnection, init_tracing};

fn service(store: &Arc<MemoryStore>) -> NotificationService<Arc<MemoryStore>> {
    init_tracing();
    NotificationService::new(Arc::clone(store), NotificationBroker::new())
}

fn addressed_to(user_id: Option<i64>, store_id: Option<i64>) -> NewNotification {
    NewNotification {
        user_id: user_id.map(UserId::new),
        store_id: store_id.map(StoreId::new),
        title: "อัปเดตโปรไฟล์ร้าน".to_owned(),
        body: "ข้อมูลโปรไฟล์ร้านของคุณได้รับการอัปเดตแล้ว".to_owned(),
        data: serde_json::json!({"type": "store_profile_updated"}),
    }
}

#[tokio::test]
async fn create_and_publish_persists_before_delivering() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    let conn = Arc::new(RecordingConnection::new());
    let _sub = service
        .broker()
        .subscribe(Some(UserId::new(7)), None, conn.clone());

    let saved = service
        .create_and_publish(addressed_to(Some(7), None))
        .await
        .expect("create");

    // The delivered payload carries the storage-assigned id, so the
    // subscriber can re-fetch the record it was told about.
    let events = conn.received();
    assert_eq!(events.len(), 1);
    let (name, payload) = events.first().expect("one event");
    assert_eq!(name, NOTIFICATION_EVENT);
    assert_eq!(
        payload.get("id"),
        Some(&serde_json::json!(saved.id.as_i64()))
    );
    assert_eq!(store.notification_count(), 1);
}

#[tokio::test]
async fn publish_with_no_live_subscribers_is_a_quiet_success() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    let saved = service
        .create_and_publish(addressed_to(Some(7), None))
        .await
        .expect("create");

    // Persisted even though nobody was listening.
    assert!(!saved.read);
    assert_eq!(store.notification_count(), 1);
    let listed = service
        .list_for_user(UserId::new(7), 50)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn routing_matches_subscriber_identity_exactly() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    let conn = Arc::new(RecordingConnection::new());
    let _sub = service
        .broker()
        .subscribe(Some(UserId::new(7)), None, conn.clone());

    service
        .create_and_publish(addressed_to(Some(7), None))
        .await
        .expect("create");
    // Addressed to user 8 and store 7; this connection is registered
    // under user 7 only, so neither index matches it.
    service
        .create_and_publish(addressed_to(Some(8), Some(7)))
        .await
        .expect("create");

    assert_eq!(conn.received().len(), 1);
}

#[tokio::test]
async fn unsubscribed_connection_receives_nothing() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    let conn = Arc::new(RecordingConnection::new());
    let sub = service
        .broker()
        .subscribe(Some(UserId::new(7)), None, conn.clone());
    drop(sub); // connection closed; its cleanup handler ran

    service
        .create_and_publish(addressed_to(Some(7), None))
        .await
        .expect("create");

    assert!(conn.received().is_empty());
    assert_eq!(service.broker().registration_count(), 0);
}

#[tokio::test]
async fn store_subscriber_receives_store_addressed_events() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    let dashboard = Arc::new(RecordingConnection::new());
    // A store-role account subscribes under both identities.
    let _sub =
        service
            .broker()
            .subscribe(Some(UserId::new(3)), Some(StoreId::new(3)), dashboard.clone());

    service
        .create_and_publish(addressed_to(None, Some(3)))
        .await
        .expect("create");

    assert_eq!(dashboard.received().len(), 1);
}

#[tokio::test]
async fn lists_are_newest_first_and_bounded() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    for i in 1..=5 {
        let mut attrs = addressed_to(Some(7), None);
        attrs.title = format!("notification {i}");
        service.create_and_publish(attrs).await.expect("create");
    }

    let listed = service
        .list_for_user(UserId::new(7), 3)
        .await
        .expect("list");
    let titles: Vec<_> = listed.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["notification 5", "notification 4", "notification 3"]
    );
}

#[tokio::test]
async fn mark_read_flips_only_the_flag() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    let saved = service
        .create_and_publish(addressed_to(None, Some(3)))
        .await
        .expect("create");
    service.mark_read(saved.id).await.expect("mark read");

    let listed = service
        .list_for_store(StoreId::new(3), 50)
        .await
        .expect("list");
    let reread = listed.first().expect("one notification");
    assert!(reread.read);
    assert_eq!(reread.title, saved.title);
}

#[tokio::test]
async fn mark_read_unknown_id_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    let err = service
        .mark_read(NotificationId::new(999))
        .await
        .expect_err("unknown id");
    assert!(matches!(
        err,
        warrantly_backend::storage::StorageError::NotFound
    ));
}

#[tokio::test]
async fn shutdown_disconnects_every_subscriber() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store);

    let a = Arc::new(RecordingConnection::new());
    let b = Arc::new(RecordingConnection::new());
    let _sub_a = service.broker().subscribe(Some(UserId::new(1)), None, a.clone());
    let _sub_b = service
        .broker()
        .subscribe(None, Some(StoreId::new(2)), b.clone());

    service.broker().shutdown();

    service
        .create_and_publish(addressed_to(Some(1), Some(2)))
        .await
        .expect("create");
    assert!(a.received().is_empty());
    assert!(b.received().is_empty());
}
