use axum::http::StatusCode;
use roundturn::api;
use roundturn::db::init_db;
use roundturn::{JobCoordinator, Repository};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    repo: Arc<Repository>,
    jobs: Arc<JobCoordinator>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool.clone()));

    let jobs = JobCoordinator::spawn(pool, 1);
    let state = api::AppState::new(repo.clone(), jobs.clone());
    let app = api::create_router(state);

    TestApp {
        app,
        repo,
        jobs,
        _temp: temp_dir,
    }
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn wait_for_rebuild(jobs: &JobCoordinator, run_id: &str) {
    for _ in 0..500 {
        if !jobs.is_inflight(run_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("rebuild for {} did not finish", run_id);
}

async fn seed_run(app: &axum::Router, run_id: &str) {
    let (status, _) = post_json(
        app.clone(),
        "/v1/ingest/strategy",
        serde_json::json!({"id": "S1", "name": "Momentum Breakout", "kind": "STANDARD"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(
        app.clone(),
        "/v1/ingest/instance",
        serde_json::json!({
            "id": "I1",
            "strategy_id": "S1",
            "symbol": "ES",
            "timeframe": "1m"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(
        app.clone(),
        "/v1/ingest/run",
        serde_json::json!({
            "id": run_id,
            "instance_id": "I1",
            "kind": "BACKTEST",
            "start_utc": "2024-01-02T14:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

fn order_body(run_id: &str, order_id: &str, side: &str, qty: f64) -> serde_json::Value {
    serde_json::json!({
        "run_id": run_id,
        "order_id": order_id,
        "symbol": "ES",
        "side": side,
        "kind": "MARKET",
        "tif": "DAY",
        "qty": qty,
        "status": "FILLED",
        "submit_utc": "2024-01-02T14:30:00Z",
        "position_impact": "OPEN"
    })
}

#[tokio::test]
async fn test_strategy_instance_run_flow() {
    let test_app = setup_test_app().await;
    seed_run(&test_app.app, "R1").await;

    let (status, body) = get(test_app.app, "/v1/runs/R1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "R1");
    assert_eq!(body["status"], "RUNNING");
    assert_eq!(body["kind"], "BACKTEST");
}

#[tokio::test]
async fn test_instance_with_unknown_strategy_is_bad_request() {
    let test_app = setup_test_app().await;

    let (status, body) = post_json(
        test_app.app,
        "/v1/ingest/instance",
        serde_json::json!({"id": "I9", "strategy_id": "nope"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_order_with_nonpositive_qty_rejected() {
    let test_app = setup_test_app().await;
    seed_run(&test_app.app, "R1").await;

    let (status, _) = post_json(
        test_app.app,
        "/v1/ingest/order",
        order_body("R1", "O1", "BUY", 0.0),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_with_unknown_side_rejected() {
    let test_app = setup_test_app().await;
    seed_run(&test_app.app, "R1").await;

    let mut body = order_body("R1", "O1", "BUY", 1.0);
    body["side"] = serde_json::json!("SHORT_EXEMPT");
    let (status, _) = post_json(test_app.app, "/v1/ingest/order", body).await;
    assert!(status.is_client_error(), "got {}", status);
}

#[tokio::test]
async fn test_order_for_unknown_run_rejected_before_write() {
    let test_app = setup_test_app().await;

    let (status, _) = post_json(
        test_app.app,
        "/v1/ingest/order",
        order_body("ghost", "O1", "BUY", 1.0),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let orders = test_app.repo.fetch_orders("ghost").await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_order_batch_replay_is_idempotent() {
    let test_app = setup_test_app().await;
    seed_run(&test_app.app, "R1").await;

    let batch = serde_json::json!({
        "run_id": "R1",
        "orders": [
            order_body("R1", "O1", "BUY", 2.0),
            order_body("R1", "O2", "SELL", 2.0),
        ]
    });
    // Strip the run_id the single-order body carries; the batch names it once.
    let batch = {
        let mut b = batch;
        for o in b["orders"].as_array_mut().unwrap() {
            o.as_object_mut().unwrap().remove("run_id");
        }
        b
    };

    let (status, body) = post_json(test_app.app.clone(), "/v1/ingest/orders", batch.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ingested"], 2);

    let (status, _) = post_json(test_app.app, "/v1/ingest/orders", batch).await;
    assert_eq!(status, StatusCode::OK);

    let orders = test_app.repo.fetch_orders("R1").await.unwrap();
    assert_eq!(orders.len(), 2);
}

#[tokio::test]
async fn test_run_end_transitions_status() {
    let test_app = setup_test_app().await;
    seed_run(&test_app.app, "R1").await;

    let (status, body) = post_json(
        test_app.app.clone(),
        "/v1/ingest/run-end",
        serde_json::json!({"run_id": "R1", "end_utc": "2024-01-02T16:00:00Z"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], true);
    wait_for_rebuild(&test_app.jobs, "R1").await;

    let (status, body) = get(test_app.app, "/v1/runs/R1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert!(body["end_utc"].is_string());
}

#[tokio::test]
async fn test_run_end_for_unknown_run_is_not_found() {
    let test_app = setup_test_app().await;

    let (status, _) = post_json(
        test_app.app,
        "/v1/ingest/run-end",
        serde_json::json!({"run_id": "ghost", "end_utc": "2024-01-02T16:00:00Z"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
