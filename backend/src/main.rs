use std::net::SocketAddr;
use std::sync::Arc;

use outreach_backend::ai::build_llm_client;
use outreach_backend::automation::build_automation_client;
use outreach_backend::config::{self, RunMode};
use outreach_backend::db;
use outreach_backend::lifecycle::{CancelToken, Engine};
use outreach_backend::routes::{self, AppState};
use outreach_backend::worker::run_worker;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> config::Result<()> {
    // 1. Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load configuration
    let cfg = config::load()?;
    info!("Starting backend in {:?} env, mode={:?}", cfg.env, cfg.mode);

    // 3. Open the database (creates the schema on first run)
    let pool = db::create_pool(&cfg.database_url).await?;
    info!("Connected to {}", cfg.database_url);

    // 4. Gateways and engine
    let automation = build_automation_client(&cfg)?;
    let generator = build_llm_client(&cfg)?;
    let engine = Arc::new(Engine::new(pool, automation, generator, cfg.engine_config()));

    let seeded = engine.seed_default_templates(chrono::Utc::now()).await?;
    if !seeded.is_empty() {
        info!("Seeded {} default templates", seeded.len());
    }

    // 5. Shutdown on Ctrl-C
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested"),
                Err(err) => error!("Failed to listen for Ctrl-C: {:?}", err),
            }
            cancel.cancel();
        });
    }

    let interval = Duration::from_secs(cfg.worker_interval_secs);

    match cfg.mode {
        RunMode::Worker => run_worker(engine, interval, cancel).await,
        RunMode::Server => serve(engine, cfg, cancel).await?,
        RunMode::Both => {
            let worker = tokio::spawn(run_worker(engine.clone(), interval, cancel.clone()));
            serve(engine, cfg, cancel.clone()).await?;
            cancel.cancel();
            if let Err(err) = worker.await {
                error!("Worker task panicked: {:?}", err);
            }
        }
    }

    Ok(())
}

async fn serve(engine: Arc<Engine>, cfg: config::Config, cancel: CancelToken) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    let state = AppState {
        engine,
        http: reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.gateway_timeout_secs))
            .build()?,
        config: cfg,
        cancel: cancel.clone(),
    };
    let app = routes::router(state);

    info!("Listening on http://{}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}
