//! Fixed-window request limiter for the reset-code endpoints.

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{ApiError, AppState};
use crate::config::RateLimitConfig;

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    trusted_proxies: Vec<IpAddr>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        let trusted_proxies = config
            .trusted_proxy_ips
            .iter()
            .filter_map(|ip| ip.parse().ok())
            .collect();

        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_seconds),
            trusted_proxies,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str, now: Instant) -> RateLimitResult {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if windows.len() > PRUNE_THRESHOLD {
            let span = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < span);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.max_requests {
            return RateLimitResult::Limited {
                retry_after: self.window.saturating_sub(now.duration_since(window.started)),
            };
        }

        window.count += 1;
        RateLimitResult::Allowed {
            remaining: self.max_requests - window.count,
        }
    }

    /// The peer address, or the first `X-Forwarded-For` hop when the peer is a trusted proxy.
    #[must_use]
    pub fn client_ip(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> Option<IpAddr> {
        let peer = peer?;
        if !self.trusted_proxies.contains(&peer) {
            return Some(peer);
        }

        headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|list| list.split(',').next())
            .and_then(|first| first.trim().parse().ok())
            .or(Some(peer))
    }
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |p| p.as_str().to_string());

    let client = state
        .rate_limiter
        .client_ip(peer, request.headers())
        .map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
    let key = format!("{route}|{client}");

    match state.rate_limiter.check(&key, Instant::now()) {
        RateLimitResult::Allowed { .. } => next.run(request).await,
        RateLimitResult::Limited { retry_after } => {
            tracing::warn!(
                event = "rate_limited",
                route = %route,
                client = %client,
                retry_after_secs = retry_after.as_secs(),
                "Request rejected by rate limiter"
            );
            metrics::counter!("rate_limited_requests_total", "route" => route).increment(1);
            ApiError::TooManyRequests("Too many requests, please try again later".to_string())
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, trusted: &[&str]) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_seconds: 60,
            trusted_proxy_ips: trusted.iter().map(ToString::to_string).collect(),
        })
    }

    #[test]
    fn test_sixth_request_in_window_is_limited() {
        let limiter = limiter(5, &[]);
        let now = Instant::now();

        for _ in 0..5 {
            assert!(matches!(
                limiter.check("/api/auth/forgot-password|1.2.3.4", now),
                RateLimitResult::Allowed { .. }
            ));
        }
        assert!(matches!(
            limiter.check("/api/auth/forgot-password|1.2.3.4", now),
            RateLimitResult::Limited { .. }
        ));

        // Separate keys keep separate windows
        assert!(matches!(
            limiter.check("/api/auth/forgot-password|5.6.7.8", now),
            RateLimitResult::Allowed { remaining: 4 }
        ));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = limiter(1, &[]);
        let start = Instant::now();

        assert!(matches!(limiter.check("k", start), RateLimitResult::Allowed { .. }));
        assert!(matches!(limiter.check("k", start), RateLimitResult::Limited { .. }));
        assert!(matches!(
            limiter.check("k", start + Duration::from_secs(61)),
            RateLimitResult::Allowed { .. }
        ));
    }

    #[test]
    fn test_forwarded_header_only_trusted_from_proxy() {
        let limiter = limiter(5, &["10.0.0.1"]);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());

        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let direct: IpAddr = "198.51.100.2".parse().unwrap();

        assert_eq!(
            limiter.client_ip(Some(proxy), &headers),
            Some("203.0.113.9".parse().unwrap())
        );
        assert_eq!(limiter.client_ip(Some(direct), &headers), Some(direct));
        assert_eq!(limiter.client_ip(None, &headers), None);
    }
}
