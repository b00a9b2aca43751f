//! Signed-in flows against a real itinerary server on an ephemeral port.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use dreamcation::models::{ItemPatch, ItemType, NewItem, Owner};
use dreamcation::storage::{KeyValueStorage, LocalStore, MemoryStorage, RemoteStore};
use dreamcation::{ItineraryError, ItineraryService, Notice, SessionGate};
use dreamcation_server::auth::encode_token;

const SECRET: &str = "e2e-secret";

struct TestServer {
    base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let state = dreamcation_server::build_state(Path::new(":memory:"), SECRET).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let _ = dreamcation_server::serve(listener, state, std::future::pending()).await;
        });
        Self { base_url, handle }
    }

    /// One connection per request, so a stopped server is noticed at once
    fn remote(&self) -> RemoteStore {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        RemoteStore::with_client(client, &self.base_url)
    }

    async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

fn token_for(user: &str) -> String {
    encode_token(SECRET.as_bytes(), user, "CUSTOMER", Utc::now().timestamp() + 3600).unwrap()
}

fn service_for(server: &TestServer, storage: Arc<dyn KeyValueStorage>) -> ItineraryService {
    ItineraryService::new(SessionGate::anonymous(), LocalStore::new(storage), server.remote())
}

#[tokio::test]
async fn test_remote_store_crud() {
    let server = TestServer::start().await;
    let remote = server.remote();
    let token = token_for("42");
    let date = NaiveDate::from_ymd_opt(2025, 6, 1);
    let time = NaiveTime::from_hms_opt(10, 0, 0);

    let item = remote
        .add(&token, ItemType::Attraction, "A1", &json!({"name": "Museum"}), date, time, "")
        .await
        .unwrap();
    assert_eq!(item.id, "attraction-A1");
    assert_eq!(item.owner_ref, Owner::User("42".to_string()));

    let again = remote
        .add(&token, ItemType::Attraction, "A1", &json!({}), None, None, "")
        .await;
    assert_eq!(again, Err(ItineraryError::DuplicateItem { id: "attraction-A1".to_string() }));

    let updated = remote
        .update(&token, "attraction-A1", &ItemPatch::notes("Buy tickets early"))
        .await
        .unwrap();
    assert_eq!(updated.notes, "Buy tickets early");
    assert_eq!(updated.date, date);
    assert_eq!(updated.time, time);

    let listed = remote.list(&token).await.unwrap();
    assert_eq!(listed.items, vec![updated]);
    assert_eq!(listed.stats.map(|s| s.attractions), Some(1));

    assert_eq!(
        remote.update(&token, "hotel-missing", &ItemPatch::notes("x")).await,
        Err(ItineraryError::NotFound { id: "hotel-missing".to_string() })
    );

    remote.remove(&token, "attraction-A1").await.unwrap();
    assert!(matches!(
        remote.remove(&token, "attraction-A1").await,
        Err(ItineraryError::NotFound { .. })
    ));

    remote.clear(&token).await.unwrap();
    remote.clear(&token).await.unwrap();
    assert!(remote.list(&token).await.unwrap().items.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_bad_credential_is_remote_failure() {
    let server = TestServer::start().await;
    let err = server.remote().list("not.a.token").await.unwrap_err();
    assert!(matches!(err, ItineraryError::RemoteUnavailable { status: Some(403), .. }));
    server.stop().await;
}

#[tokio::test]
async fn test_rejected_add_is_not_retryable() {
    let server = TestServer::start().await;
    let err = server
        .remote()
        .add(&token_for("42"), ItemType::Hotel, "H1", &serde_json::Value::Null, None, None, "")
        .await
        .unwrap_err();
    assert!(matches!(err, ItineraryError::RemoteUnavailable { status: Some(400), .. }));
    assert!(!err.is_retryable());
    server.stop().await;
}

#[tokio::test]
async fn test_authenticated_service_scenario() {
    let server = TestServer::start().await;
    let service = service_for(&server, Arc::new(MemoryStorage::new()));
    service.session().login(&token_for("42"));

    service.add(NewItem::new("flight", Some("FL1"), json!({"airline": "AA"}))).await.unwrap();
    service.add(NewItem::new("hotel", Some("H1"), json!({"name": "Inn"}))).await.unwrap();
    let duplicate = service.add(NewItem::new("flight", Some("FL1"), json!({}))).await;
    assert_eq!(Notice::for_add(&duplicate), Notice::AlreadySaved { id: "flight-FL1".to_string() });

    let stats = service.statistics().await;
    assert_eq!((stats.flights, stats.hotels, stats.total), (1, 1, 2));

    // A fresh session for the same user sees the server's copy
    let other_device = service_for(&server, Arc::new(MemoryStorage::new()));
    other_device.session().login(&token_for("42"));
    other_device.refresh().await.unwrap();
    assert!(other_device.is_item_present("hotel", "H1").await);

    server.stop().await;
}

#[tokio::test]
async fn test_server_rejects_duplicate_missed_locally() {
    let server = TestServer::start().await;
    let first = service_for(&server, Arc::new(MemoryStorage::new()));
    let second = service_for(&server, Arc::new(MemoryStorage::new()));
    first.session().login(&token_for("42"));
    second.session().login(&token_for("42"));
    second.refresh().await.unwrap();

    first.add(NewItem::new("attraction", Some("A1"), json!({}))).await.unwrap();
    let racing = second.add(NewItem::new("attraction", Some("A1"), json!({}))).await;

    assert_eq!(racing, Err(ItineraryError::DuplicateItem { id: "attraction-A1".to_string() }));
    assert!(second.items().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_login_and_logout_switch_owner() {
    let server = TestServer::start().await;
    let service = service_for(&server, Arc::new(MemoryStorage::new()));

    service.add(NewItem::new("hotel", Some("local-hotel"), json!({}))).await.unwrap();
    assert_eq!(service.snapshot().await.owner, Some(Owner::Local));

    service.session().login(&token_for("42"));
    service.add(NewItem::new("flight", Some("F1"), json!({}))).await.unwrap();
    let signed_in = service.snapshot().await;
    assert_eq!(signed_in.owner, Some(Owner::User("42".to_string())));
    assert_eq!(signed_in.items.len(), 1);
    assert!(signed_in.items.iter().all(|i| i.owner_ref == Owner::User("42".to_string())));

    service.session().logout();
    service.refresh().await.unwrap();
    let signed_out = service.snapshot().await;
    assert_eq!(signed_out.owner, Some(Owner::Local));
    assert!(service.is_item_present("hotel", "local-hotel").await);
    assert!(!service.is_item_present("flight", "F1").await);

    server.stop().await;
}

#[tokio::test]
async fn test_remote_outage_leaves_state_untouched() {
    let server = TestServer::start().await;
    let remote = server.remote();
    let service = ItineraryService::new(
        SessionGate::anonymous(),
        LocalStore::new(Arc::new(MemoryStorage::new())),
        remote,
    );
    service.session().login(&token_for("42"));
    service.add(NewItem::new("hotel", Some("H1"), json!({}))).await.unwrap();
    let before = service.snapshot().await;

    server.stop().await;

    let add = service.add(NewItem::new("flight", Some("F1"), json!({}))).await;
    assert!(matches!(add, Err(ItineraryError::RemoteUnavailable { .. })));
    let update = service.update("hotel-H1", ItemPatch::notes("late check-in")).await;
    assert!(matches!(update, Err(ItineraryError::RemoteUnavailable { .. })));
    assert!(service.clear().await.is_err());

    let after = service.snapshot().await;
    assert_eq!(after.items, before.items);
    assert_eq!(after.stats, before.stats);
}
