use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::state::AppState;

/// Upper bound on the number of clients tracked at once.
pub const MAX_TRACKED_CLIENTS: usize = 10_000;
const PRUNE_INTERVAL: Duration = Duration::from_secs(1);

struct Windows {
    counts: HashMap<String, (Instant, u32)>,
    last_prune: Option<Instant>,
}

/// Fixed-window request counter keyed by client.
pub struct RateLimiter {
    max: u32,
    window: Duration,
    capacity: usize,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self::with_capacity(max, window, MAX_TRACKED_CLIENTS)
    }

    pub fn with_capacity(max: u32, window: Duration, capacity: usize) -> Self {
        Self {
            max,
            window,
            capacity,
            windows: Mutex::new(Windows {
                counts: HashMap::new(),
                last_prune: None,
            }),
        }
    }

    /// Counts one request for `key` and reports whether it is within the limit.
    ///
    /// New clients are refused while the table is full of live windows.
    pub fn check(&self, key: &str, now: Instant) -> bool {
        let Ok(mut windows) = self.windows.lock() else {
            tracing::error!("rate limiter mutex poisoned, letting request through");
            return true;
        };

        if let Some(entry) = windows.counts.get_mut(key) {
            if now.duration_since(entry.0) >= self.window {
                *entry = (now, 0);
            }
            entry.1 += 1;
            return entry.1 <= self.max;
        }

        if windows.counts.len() >= self.capacity {
            let due = windows
                .last_prune
                .map_or(true, |at| now.duration_since(at) >= PRUNE_INTERVAL);
            if due {
                let window = self.window;
                windows
                    .counts
                    .retain(|_, (start, _)| now.duration_since(*start) < window);
                windows.last_prune = Some(now);
            }
            if windows.counts.len() >= self.capacity {
                tracing::warn!(tracked = windows.counts.len(), "rate limiter table full");
                return false;
            }
        }

        windows.counts.insert(key.to_string(), (now, 1));
        1 <= self.max
    }
}

/// Resolves the client address a request is counted against.
///
/// `X-Forwarded-For` is only read when the peer is a trusted proxy, and then
/// the right-most hop that is not itself a trusted proxy wins.
pub fn client_ip(peer: Option<IpAddr>, headers: &HeaderMap, trusted: &[IpAddr]) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted.contains(&peer) {
        return Some(peer);
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    for hop in hops.iter().rev() {
        match hop.parse::<IpAddr>() {
            Ok(ip) if trusted.contains(&ip) => continue,
            Ok(ip) => return Some(ip),
            Err(_) => break,
        }
    }
    Some(peer)
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if req.method() != Method::OPTIONS {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let key = client_ip(peer, req.headers(), &state.config.trusted_proxies)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "local".to_string());
        if !state.rate_limiter.check(&key, Instant::now()) {
            tracing::warn!(client = %key, "rate limit exceeded");
            return Err(AppError::RateLimited(
                "Too many requests, please try again later".to_string(),
            ));
        }
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_limit_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check("a", now));
        assert!(limiter.check("a", now));
        assert!(!limiter.check("a", now));
        // other clients are counted separately
        assert!(limiter.check("b", now));
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check("a", now));
        assert!(!limiter.check("a", now + Duration::from_secs(30)));
        assert!(limiter.check("a", now + Duration::from_secs(61)));
    }

    #[test]
    fn test_table_is_capped() {
        let limiter = RateLimiter::with_capacity(5, Duration::from_secs(60), 2);
        let now = Instant::now();
        assert!(limiter.check("a", now));
        assert!(limiter.check("b", now));
        assert!(!limiter.check("c", now));
        // known clients still get through
        assert!(limiter.check("a", now));
        // expired windows make room again
        assert!(limiter.check("c", now + Duration::from_secs(61)));
    }

    #[test]
    fn test_forwarded_for_ignored_from_untrusted_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        assert_eq!(client_ip(None, &headers, &[]), None);
        assert_eq!(
            client_ip(Some(ip("198.51.100.2")), &headers, &[ip("10.0.0.1")]),
            Some(ip("198.51.100.2"))
        );
    }

    #[test]
    fn test_forwarded_for_from_trusted_proxy() {
        let trusted = [ip("10.0.0.1"), ip("10.0.0.2")];
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "1.2.3.4, 203.0.113.7, 10.0.0.2".parse().unwrap(),
        );
        // the spoofable left-most entry is skipped
        assert_eq!(
            client_ip(Some(ip("10.0.0.1")), &headers, &trusted),
            Some(ip("203.0.113.7"))
        );

        headers.insert("x-forwarded-for", "garbage, 10.0.0.2".parse().unwrap());
        assert_eq!(
            client_ip(Some(ip("10.0.0.1")), &headers, &trusted),
            Some(ip("10.0.0.1"))
        );
    }
}
