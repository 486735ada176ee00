mod ai_review;
mod app;
mod catalog;
mod config;
mod db;
mod doi;
mod error;
mod mailer;
mod metrics;
mod models;
mod routes;
mod storage;
mod validation;
mod workflow;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::{AppState, build_router};
use catalog::Catalog;
use config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mnj_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let catalog = Catalog::bundled()?;
    tracing::info!(articles = catalog.articles().len(), "Bundled catalog loaded");

    let pool = db::init_db(&config.database_url, config.admin_username.as_deref()).await?;
    tracing::info!("Database initialized");

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    if config.ai.api_key.is_none() {
        tracing::warn!("AI_GATEWAY_API_KEY not set; AI review requests will fail");
    }
    if config.mail.api_key.is_none() {
        tracing::warn!("RESEND_API_KEY not set; submission emails are disabled");
    }

    let addr = config.bind_addr.clone();
    let app = build_router(AppState::new(pool, config, catalog));

    tracing::info!("Server running on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
