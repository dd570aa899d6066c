use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::middleware::rate_limit::RateLimiter;
use crate::services::events::BookingEvent;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub events: broadcast::Sender<BookingEvent>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        let rate_limiter = RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            events,
            rate_limiter,
        }
    }

    pub fn db(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))
    }
}
