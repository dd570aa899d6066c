use std::env;
use std::net::IpAddr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub expiry_sweep_enabled: bool,
    /// Peers whose `X-Forwarded-For` header is believed.
    pub trusted_proxies: Vec<IpAddr>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3004),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "bookings.db".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            rate_limit_max: env::var("RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15 * 60),
            expiry_sweep_enabled: env::var("EXPIRY_SWEEP_ENABLED")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            trusted_proxies: env::var("TRUSTED_PROXIES")
                .map(|v| parse_ip_list(&v))
                .unwrap_or_default(),
        }
    }
}

fn parse_ip_list(raw: &str) -> Vec<IpAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(entry = s, "ignoring invalid TRUSTED_PROXIES entry");
                None
            }
        })
        .collect()
}
