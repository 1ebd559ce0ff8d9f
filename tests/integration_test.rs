use axum::body::Body;
use axum::http::{Request, StatusCode};
use settlex::api::{self, AppState};
use settlex::engine::DistributionPolicy;
use settlex::orchestration::{LifecycleManager, SettlementBatch};
use settlex::referral::{DbReferralSource, ReferralResolver};
use settlex::{init_db, Repository, UserId};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool.clone()));
    let resolver = ReferralResolver::new(Arc::new(DbReferralSource::new(pool)));

    let batch = Arc::new(SettlementBatch::new(
        repo.clone(),
        resolver.clone(),
        DistributionPolicy::default(),
    ));
    let lifecycle = Arc::new(LifecycleManager::new(
        repo.clone(),
        resolver,
        "USDT".to_string(),
    ));

    let state = AppState::new(repo.clone(), batch, lifecycle);
    (api::create_router(state), repo, temp_dir)
}

async fn send_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = builder
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = send_json(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = send_json(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_full_settlement_flow() {
    let (app, repo, _temp) = setup_test_app().await;

    // U is referred by R1, who is referred by R2.
    repo.upsert_referral_edge(&UserId::new("U"), Some(&UserId::new("R1")))
        .await
        .unwrap();
    repo.upsert_referral_edge(&UserId::new("R1"), Some(&UserId::new("R2")))
        .await
        .unwrap();

    // The earnings side appends three pending ledger entries.
    for (id, amount, at) in [("c-1", "50", 1000), ("c-2", "30", 2000), ("c-3", "20", 3000)] {
        let (status, body) = send_json(
            &app,
            "POST",
            "/v1/commissions",
            Some(serde_json::json!({
                "id": id,
                "earnerUserId": "U",
                "amount": amount,
                "createdAtMs": at,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inserted"], true);
    }

    // Scheduler trigger.
    let (status, report) = send_json(&app, "POST", "/v1/settlements/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["settled"], 1);
    assert_eq!(report["conflicts"], 0);

    // One settlement for U: amount 60, shares 10/20/10.
    let (status, body) = send_json(&app, "GET", "/v1/settlements?user=U", None).await;
    assert_eq!(status, StatusCode::OK);
    let settlements = body["settlements"].as_array().unwrap();
    assert_eq!(settlements.len(), 1);
    let s = &settlements[0];
    assert_eq!(s["amount"], "60");
    assert_eq!(s["platformShare"], "10");
    assert_eq!(s["level1Share"], "20");
    assert_eq!(s["level2Share"], "10");
    assert_eq!(s["status"], "pending");
    let settlement_id = s["id"].as_str().unwrap().to_string();

    // All three entries are consumed.
    let (_, commissions) = send_json(&app, "GET", "/v1/commissions?user=U", None).await;
    for entry in commissions["commissions"].as_array().unwrap() {
        assert_eq!(entry["status"], "completed");
        assert_eq!(entry["settlementId"], settlement_id.as_str());
    }

    // Re-running with no new entries settles nothing.
    let (_, report) = send_json(&app, "POST", "/v1/settlements/run", None).await;
    assert_eq!(report["settled"], 0);
    assert_eq!(report["earners"], 0);

    // Payment confirmation creates the platform earning.
    let uri = format!("/v1/settlements/{}/complete", settlement_id);
    let (status, body) = send_json(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], true);
    assert_eq!(body["settlement"]["status"], "completed");

    let (_, earnings) = send_json(&app, "GET", "/v1/platform-earnings", None).await;
    let earnings = earnings["earnings"].as_array().unwrap();
    assert_eq!(earnings.len(), 1);
    assert_eq!(earnings[0]["amount"], "10");
    assert_eq!(earnings[0]["currency"], "USDT");
    assert_eq!(earnings[0]["sourceSettlementId"], settlement_id.as_str());
}

#[tokio::test]
async fn test_append_commission_idempotent() {
    let (app, _repo, _temp) = setup_test_app().await;

    let body = serde_json::json!({
        "id": "c-1",
        "earnerUserId": "U",
        "amount": "25",
        "createdAtMs": 1000,
    });

    let (status, first) = send_json(&app, "POST", "/v1/commissions", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["inserted"], true);

    let (status, second) = send_json(&app, "POST", "/v1/commissions", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["inserted"], false);
    assert_eq!(second["entry"]["amount"], "25");
}

#[tokio::test]
async fn test_append_commission_rejects_bad_amounts() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/v1/commissions",
        Some(serde_json::json!({"earnerUserId": "U", "amount": "-5"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &app,
        "POST",
        "/v1/commissions",
        Some(serde_json::json!({"earnerUserId": "U", "amount": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &app,
        "POST",
        "/v1/commissions",
        Some(serde_json::json!({"earnerUserId": "", "amount": "5"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
