use anyhow::Context;
use settlex::orchestration::{scheduler, LifecycleManager, SettlementBatch};
use settlex::referral::{DbReferralSource, ReferralResolver};
use settlex::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;

    let repo = Arc::new(Repository::new(pool.clone()));
    let resolver = ReferralResolver::new(Arc::new(DbReferralSource::new(pool)));

    let batch = Arc::new(SettlementBatch::new(
        repo.clone(),
        resolver.clone(),
        config.distribution_policy(),
    ));
    let lifecycle = Arc::new(LifecycleManager::new(
        repo.clone(),
        resolver,
        config.currency.clone(),
    ));

    // Periodic batch runs alongside the HTTP trigger.
    tokio::spawn(scheduler::run_scheduler(
        batch.clone(),
        config.settlement_interval_ms,
    ));

    let app = api::create_router(api::AppState::new(repo, batch, lifecycle));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
