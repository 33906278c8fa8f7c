mod config;

use tracing::info;

use duo_api::AppStateInner;
use duo_db::Database;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duo=debug,duo_api=debug,duo_feed=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let db = Database::open(&config.db_path)?;
    let state = AppStateInner::new(db, config.anon_key, config.jwt_secret);
    let app = duo_api::router(state);

    info!("Duo server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
