//! End-to-end tests for the HTTP façade, driven through `warp::test` with
//! in-process stub collaborators.

use kgserve_collab::StubCollaborator;
use kgserve_core::{TaskRegistry, Token};
use kgserve_http::{routes, Collaborators, Dispatcher, FailurePolicy};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

fn test_dispatcher(stub: &StubCollaborator) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        Arc::new(TaskRegistry::new()),
        Collaborators::from_single(Arc::new(stub.clone())),
    ))
}

fn submit_body(name: &str, srcs: &[&str]) -> Value {
    json!({
        "host": "localhost",
        "port": 6379,
        "name": name,
        "srcs": srcs,
        "openaikey": "sk-test",
    })
}

async fn submit<F>(api: &F, path: &str, body: &Value) -> (u16, Value)
where
    F: warp::Filter<Error = warp::Rejection> + 'static,
    F::Extract: warp::Reply + Send,
{
    let response = warp::test::request()
        .method("POST")
        .path(path)
        .json(body)
        .reply(api)
        .await;
    let parsed = serde_json::from_slice(response.body()).unwrap();
    (response.status().as_u16(), parsed)
}

async fn poll<F>(api: &F, token: &str) -> (u16, Value)
where
    F: warp::Filter<Error = warp::Rejection> + 'static,
    F::Extract: warp::Reply + Send,
{
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/pull_status?token={token}"))
        .reply(api)
        .await;
    let parsed = serde_json::from_slice(response.body()).unwrap();
    (response.status().as_u16(), parsed)
}

#[tokio::test]
async fn detect_schema_progress_then_single_eviction() {
    let stub = StubCollaborator::new();
    stub.hold_detection();
    let dispatcher = test_dispatcher(&stub);
    let api = routes(Arc::clone(&dispatcher));

    let (status, body) = submit(
        &api,
        "/detect_schema",
        &submit_body("movies", &["doc1.txt", "doc2.txt"]),
    )
    .await;
    assert_eq!(status, 200);
    let token = body["token"].as_str().unwrap().to_string();

    // Still running: detection is held open.
    let (status, body) = poll(&api, &token).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"progress": 0.0}));

    stub.release_detection();
    dispatcher
        .take_handle(&token.parse::<Token>().unwrap())
        .unwrap()
        .join()
        .await
        .unwrap();

    // Detection marks both sources at once; progress jumps straight to 1.0
    // and the schema landed under the companion graph name.
    let (status, body) = poll(&api, &token).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"progress": 1.0}));
    assert_eq!(stub.persisted_graphs(), vec!["movies_schema"]);

    // Completion was observed exactly once.
    let (status, body) = poll(&api, &token).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "Unknown token"}));
}

#[tokio::test]
async fn populate_kg_progress_is_always_a_thirds_fraction() {
    let stub = StubCollaborator::new();
    stub.hold_source("a.txt");
    stub.hold_source("b.txt");
    stub.hold_source("c.txt");
    let dispatcher = test_dispatcher(&stub);
    let api = routes(Arc::clone(&dispatcher));

    let (status, body) = submit(
        &api,
        "/populate_kg",
        &submit_body("movies", &["a.txt", "b.txt", "c.txt"]),
    )
    .await;
    assert_eq!(status, 200);
    let token = body["token"].as_str().unwrap().to_string();
    let task = dispatcher
        .registry()
        .get(&token.parse::<Token>().unwrap())
        .unwrap();

    let (_, body) = poll(&api, &token).await;
    assert_eq!(body["progress"], json!(0.0));

    for (released, expected) in [("b.txt", 1.0 / 3.0), ("c.txt", 2.0 / 3.0)] {
        stub.release_source(released);
        while task.progress() < expected - 1e-9 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let (status, body) = poll(&api, &token).await;
        assert_eq!(status, 200);
        let progress = body["progress"].as_f64().unwrap();
        assert!((progress - expected).abs() < 1e-9);
    }

    stub.release_source("a.txt");
    dispatcher
        .take_handle(&token.parse::<Token>().unwrap())
        .unwrap()
        .join()
        .await
        .unwrap();

    let (_, body) = poll(&api, &token).await;
    assert_eq!(body, json!({"progress": 1.0}));
    let (status, _) = poll(&api, &token).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn failed_source_surfaces_through_status() {
    let stub = StubCollaborator::new();
    stub.fail_source("bad.txt", "boom");
    let dispatcher = test_dispatcher(&stub);
    let api = routes(Arc::clone(&dispatcher));

    let (_, body) = submit(
        &api,
        "/populate_kg",
        &submit_body("movies", &["good.txt", "bad.txt"]),
    )
    .await;
    let token = body["token"].as_str().unwrap().to_string();
    dispatcher
        .take_handle(&token.parse::<Token>().unwrap())
        .unwrap()
        .join()
        .await
        .unwrap();

    let (status, body) = poll(&api, &token).await;
    assert_eq!(status, 200);
    assert_eq!(body["progress"], json!(1.0));
    assert_eq!(body["errors"][0]["source"], "bad.txt");
    assert_eq!(body["errors"][0]["error"], "service error (500): boom");
}

#[tokio::test]
async fn legacy_stall_keeps_task_alive_below_one() {
    let stub = StubCollaborator::new();
    stub.fail_detection("model unavailable");
    let dispatcher = Arc::new(
        Dispatcher::new(
            Arc::new(TaskRegistry::new()),
            Collaborators::from_single(Arc::new(stub.clone())),
        )
        .with_policy(FailurePolicy::LegacyStall),
    );
    let api = routes(Arc::clone(&dispatcher));

    let (_, body) = submit(&api, "/detect_schema", &submit_body("movies", &["a.txt"])).await;
    let token = body["token"].as_str().unwrap().to_string();
    dispatcher
        .take_handle(&token.parse::<Token>().unwrap())
        .unwrap()
        .join()
        .await
        .unwrap();

    // The legacy gap, reproduced on purpose: no errors, progress frozen,
    // the task never evicted.
    for _ in 0..2 {
        let (status, body) = poll(&api, &token).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"progress": 0.0}));
    }
}

#[tokio::test]
async fn missing_body_is_rejected_with_legacy_message() {
    let dispatcher = test_dispatcher(&StubCollaborator::new());
    let api = routes(dispatcher);

    let response = warp::test::request()
        .method("POST")
        .path("/detect_schema")
        .reply(&api)
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({"error": "No data provided"}));
}

#[tokio::test]
async fn empty_source_list_is_a_client_error() {
    let dispatcher = test_dispatcher(&StubCollaborator::new());
    let api = routes(dispatcher);

    let (status, body) = submit(&api, "/populate_kg", &submit_body("movies", &[])).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "task has no sources"}));
}

#[tokio::test]
async fn status_without_token_is_rejected() {
    let dispatcher = test_dispatcher(&StubCollaborator::new());
    let api = routes(dispatcher);

    let response = warp::test::request()
        .method("GET")
        .path("/pull_status")
        .reply(&api)
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({"error": "No token provided"}));
}

#[tokio::test]
async fn undeserializable_query_is_a_client_error() {
    let dispatcher = test_dispatcher(&StubCollaborator::new());
    let api = routes(dispatcher);

    // A repeated parameter fails query deserialization outright, before the
    // handler ever sees a token.
    let response = warp::test::request()
        .method("GET")
        .path("/pull_status?token=a&token=b")
        .reply(&api)
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({"error": "Invalid query string"}));
}

#[tokio::test]
async fn unknown_and_malformed_tokens_are_rejected() {
    let dispatcher = test_dispatcher(&StubCollaborator::new());
    let api = routes(dispatcher);

    let (status, body) = poll(&api, &Token::generate().to_string()).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "Unknown token"}));

    let (status, body) = poll(&api, "not-a-uuid").await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "Unknown token"}));
}
