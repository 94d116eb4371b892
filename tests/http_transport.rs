use http_lifecycle::cache::MemoryStore;
use http_lifecycle::transport::HttpTransport;
use http_lifecycle::{Error, Lifecycle, LifecycleConfig, RequestDescriptor};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_get_json_is_cached_after_first_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/42")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name":"ada"}"#)
        .expect(1)
        .create_async()
        .await;

    let lc = Lifecycle::new(LifecycleConfig::default(), Arc::new(MemoryStore::new())).unwrap();
    let transport = HttpTransport::new(server.url()).unwrap();
    let req = RequestDescriptor::new().with_id("user-42").with_ttl(60_000.0);

    let first = lc.get_json(req.clone(), &transport, "/users/42").await.unwrap();
    let second = lc.get_json(req, &transport, "/users/42").await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.data, json!({"name": "ada"}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_error_is_not_cached() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/flaky")
        .with_status(503)
        .with_body("unavailable")
        .expect(2)
        .create_async()
        .await;

    let lc = Lifecycle::new(LifecycleConfig::default(), Arc::new(MemoryStore::new())).unwrap();
    let transport = HttpTransport::new(server.url()).unwrap();
    let req = RequestDescriptor::new().with_id("flaky").with_ttl(60_000.0);

    for _ in 0..2 {
        let err = lc.get_json(req.clone(), &transport, "/flaky").await.unwrap_err();
        assert!(matches!(err, Error::Remote { status: 503, .. }));
    }
    assert!(lc.tracker().is_empty());
    mock.assert_async().await;
}
