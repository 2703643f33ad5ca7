//! Whole sync runs against a mock catalog server.

use crag_core::db::{EntityStore, SettingsRepository};
use crag_core::models::{Area, Blocking, Path, Zone};
use crag_core::{ApiClient, CatalogService, SyncEngine, SyncOutcome, SyncReport, SyncState};
use httpmock::Method::{DELETE, GET, POST};
use httpmock::{Mock, MockServer};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn tree() -> Value {
    json!({
        "data": {
            "areas": [{
                "id": 1,
                "timestamp": 100,
                "display_name": "Alcoi",
                "web_url": "https://example.com/alcoi",
                "image": "5c1b6bd6-1f9a-4a57-9f4e-2f0e2d41d6a1",
                "zones": [{
                    "id": 10,
                    "timestamp": 100,
                    "area_id": 1,
                    "display_name": "Barranc del Cint",
                    "web_url": "",
                    "image": "",
                    "kmz": "",
                    "latitude": 38.7,
                    "longitude": -0.47,
                    "sectors": [{
                        "id": 100,
                        "timestamp": 100,
                        "zone_id": 10,
                        "display_name": "Racó",
                        "image": "",
                        "sun_time": "morning",
                        "weight": "0001",
                        "paths": [{
                            "id": 1000,
                            "timestamp": 100,
                            "sector_id": 100,
                            "display_name": "Diedre",
                            "sketch_id": 3,
                            "grade": "6b+"
                        }]
                    }]
                }]
            }]
        }
    })
}

/// Mocks tree, blocks and last_update; returns the last_update mock.
async fn mock_snapshot(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/tree");
            then.status(200).json_body(tree());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blocks");
            then.status(200).json_body(json!({
                "data": {
                    "blocks": [{
                        "id": 5,
                        "timestamp": 100,
                        "path_id": 1000,
                        "type": "bird",
                        "recurrence": {"from_day": 1, "from_month": 2, "to_day": 30, "to_month": 6}
                    }]
                }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/last_update");
            then.status(200)
                .json_body(json!({"data": {"last_update": 100}}));
        })
        .await
}

async fn engine(
    server: &MockServer,
    api_key: Option<&str>,
) -> SyncEngine<CatalogService, ApiClient> {
    let api = ApiClient::new(server.base_url(), api_key.map(ToString::to_string)).unwrap();
    let store = CatalogService::open_in_memory().await.unwrap();
    SyncEngine::new(store, api)
}

fn completed(outcome: SyncOutcome) -> SyncReport {
    match outcome {
        SyncOutcome::Completed(report) => report,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn first_sync_populates_catalog_and_second_is_skipped() {
    let server = MockServer::start_async().await;
    let last_update = mock_snapshot(&server).await;
    let engine = engine(&server, None).await;
    let cancel = CancellationToken::new();

    let report = completed(engine.sync(false, &cancel).await.unwrap());
    assert_eq!(report.inserted, 5);
    // Read once to decide and once more to record the post-run value.
    assert_eq!(last_update.hits_async().await, 2);
    assert_eq!(engine.status().state, SyncState::Synced);

    let store = engine.store();
    let zone: Zone = store.get(10).await.unwrap().unwrap();
    assert_eq!(zone.display_name, "Barranc del Cint");
    let block: Blocking = store.get(5).await.unwrap().unwrap();
    assert_eq!(block.path_id, 1000);
    assert!(store.load_bookkeeping().await.unwrap().has_synced);

    let outcome = engine.sync(false, &cancel).await.unwrap();
    assert_eq!(outcome, SyncOutcome::AlreadyUpToDate);
    assert_eq!(last_update.hits_async().await, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn local_edit_is_pushed_as_multipart_form() {
    let server = MockServer::start_async().await;
    mock_snapshot(&server).await;
    let push = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/area/1")
                .header("authorization", "Bearer secret")
                .body_contains("displayName")
                .body_contains("Alcoià");
            then.status(200);
        })
        .await;
    let engine = engine(&server, Some("secret")).await;
    let cancel = CancellationToken::new();
    engine.sync(false, &cancel).await.unwrap();

    let mut area: Area = engine.store().get(1).await.unwrap().unwrap();
    area.display_name = "Alcoià".to_string();
    engine.store().save(&mut area).await.unwrap();

    let report = completed(engine.sync(true, &cancel).await.unwrap());

    push.assert_async().await;
    assert_eq!(report.pushed, 1);
    let bookkeeping = engine.store().load_bookkeeping().await.unwrap();
    assert_eq!(bookkeeping.last_local_modification, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_push_is_counted_and_run_completes() {
    let server = MockServer::start_async().await;
    mock_snapshot(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/area/1");
            then.status(422).body("displayName too long");
        })
        .await;
    let engine = engine(&server, Some("secret")).await;
    let cancel = CancellationToken::new();
    engine.sync(false, &cancel).await.unwrap();

    let mut area: Area = engine.store().get(1).await.unwrap().unwrap();
    area.display_name = "x".repeat(300);
    engine.store().save(&mut area).await.unwrap();

    let report = completed(engine.sync(true, &cancel).await.unwrap());

    assert_eq!(report.failed, 1);
    assert_eq!(engine.status().state, SyncState::Synced);
    let bookkeeping = engine.store().load_bookkeeping().await.unwrap();
    assert!(bookkeeping.needs_sync(Some(100)));
}

#[tokio::test(flavor = "multi_thread")]
async fn local_deletion_cascades_to_server() {
    let server = MockServer::start_async().await;
    mock_snapshot(&server).await;
    let delete_path = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/path/1000")
                .header("authorization", "Bearer secret");
            then.status(200);
        })
        .await;
    let delete_block = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/block/5");
            then.status(410);
        })
        .await;
    let engine = engine(&server, Some("secret")).await;
    let cancel = CancellationToken::new();
    engine.sync(false, &cancel).await.unwrap();

    let tombstones = engine.store().remove::<Path>(1000).await.unwrap();
    assert_eq!(tombstones.len(), 2);

    let report = completed(engine.sync(true, &cancel).await.unwrap());

    delete_path.assert_async().await;
    delete_block.assert_async().await;
    assert_eq!(report.deleted_remote, 2);
    assert_eq!(report.inserted, 0);
    assert!(engine.store().get::<Path>(1000).await.unwrap().is_none());
    assert!(engine.store().get::<Blocking>(5).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_leaves_error_state() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/last_update");
            then.status(503).body("maintenance");
        })
        .await;
    let engine = engine(&server, None).await;

    let err = engine
        .sync(false, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(engine.status().state, SyncState::Error);
    assert!(!engine.store().load_bookkeeping().await.unwrap().has_synced);
}
