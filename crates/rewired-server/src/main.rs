use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use rewired_api::{AppState, AppStateInner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rewired=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("REWIRED_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let token_ttl_hours: i64 = std::env::var("REWIRED_TOKEN_TTL_HOURS")
        .unwrap_or_else(|_| "168".into())
        .parse()?;
    let db_path = std::env::var("REWIRED_DB_PATH").unwrap_or_else(|_| "rewired.db".into());
    let static_dir = std::env::var("REWIRED_STATIC_DIR").unwrap_or_else(|_| "static".into());
    let host = std::env::var("REWIRED_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("REWIRED_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = rewired_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        token_ttl_hours,
    });

    let app = rewired_api::router(state)
        .fallback_service(ServeDir::new(&static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Rewired server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
