use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tutor_bookings::app;
use tutor_bookings::config::AppConfig;
use tutor_bookings::db;
use tutor_bookings::services::expiry;
use tutor_bookings::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.jwt_secret == "changeme" {
        tracing::warn!("JWT_SECRET is not set, using the insecure default");
    }

    let conn = db::init_db(&config.database_url)?;
    let state = Arc::new(AppState::new(conn, config.clone()));

    if config.expiry_sweep_enabled {
        expiry::spawn_daily_sweep(state.clone());
        tracing::info!("daily booking expiry sweep enabled");
    }

    let app = app::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("bookings service listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
