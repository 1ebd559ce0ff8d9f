use axum::body::Body;
use axum::http::{Request, StatusCode};
use settlex::api::{self, AppState};
use settlex::engine::DistributionPolicy;
use settlex::orchestration::{LifecycleManager, SettlementBatch};
use settlex::referral::{DbReferralSource, ReferralResolver};
use settlex::{init_db, CommissionEntry, Decimal, Repository, TimeMs, UserId};
use std::str::FromStr;
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

async fn get_text(app: &axum::Router, uri: &str) -> (StatusCode, String, Option<String>) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
}

#[tokio::test]
async fn test_export_empty_has_header_only() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body, content_type) = get_text(&app, "/v1/settlements/export").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/csv"));

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(
        lines,
        vec!["id,earnerUserId,amount,sourceCommissionIds,createdAt,status"]
    );
}

#[tokio::test]
async fn test_export_rows_match_settlements() {
    let (app, repo, _temp) = setup_test_app().await;

    for (id, amount, at) in [("c-1", "70", 1000i64), ("c-2", "30", 2000)] {
        repo.insert_commission_entry(&CommissionEntry::with_id(
            id,
            UserId::new("u-1"),
            Decimal::from_str(amount).unwrap(),
            TimeMs::new(at),
        ))
        .await
        .unwrap();
    }

    let run = Request::builder()
        .method("POST")
        .uri("/v1/settlements/run")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(run).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body, _) = get_text(&app, "/v1/settlements/export").await;
    assert_eq!(status, StatusCode::OK);

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);

    // The two source ids share one field, comma-joined and therefore quoted.
    let row = lines[1];
    assert!(row.contains("u-1"));
    assert!(row.contains("90"));
    assert!(row.contains("\"c-1,c-2\""));
    assert!(row.ends_with("pending"));
}

#[tokio::test]
async fn test_export_respects_filter() {
    let (app, repo, _temp) = setup_test_app().await;

    for (id, earner) in [("c-1", "u-1"), ("c-2", "u-2")] {
        repo.insert_commission_entry(&CommissionEntry::with_id(
            id,
            UserId::new(earner),
            Decimal::from_str("10").unwrap(),
            TimeMs::new(1000),
        ))
        .await
        .unwrap();
    }

    let run = Request::builder()
        .method("POST")
        .uri("/v1/settlements/run")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(run).await.unwrap();

    let (_, body, _) = get_text(&app, "/v1/settlements/export?user=u-2").await;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("u-2"));
    assert!(!body.contains("u-1"));
}
