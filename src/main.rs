use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crowd_translate::{config::Config, db::Database, http, scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crowd_translate=info".parse()?),
        )
        .init();

    info!("Starting translation platform server");

    let config = Config::from_env()?;
    let db = Database::new(&config.database_path)?;

    // Background sweep for overdue reviews
    let _scheduler = scheduler::start_scheduler(Arc::new(config.clone()), db.clone()).await?;

    let state = Arc::new(http::AppState::new(config.clone(), db));
    let router = http::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
