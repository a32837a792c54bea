//! Per-source-address request rate limiting.
//!
//! Fixed window counter per IP: each address may make `max_requests`
//! requests per `window`; the window starts at the first request and the
//! count resets once it has elapsed. The limiter is shared through the
//! router state rather than a global, and its map is guarded by a mutex.
//!
//! Memory is bounded by `max_tracked`: when the map is full and a new
//! address arrives, expired windows are swept first; if the map is still
//! full the window closest to expiry is evicted. A first request from any
//! address is never refused.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::error::ApiError;

/// Configuration for the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of requests allowed per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
    /// Maximum number of addresses tracked at once.
    pub max_tracked: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
            max_tracked: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// Thread-safe fixed-window rate limiter keyed by source IP.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a request from `ip` and report whether it is within the limit.
    pub fn allow(&self, ip: IpAddr) -> bool {
        self.allow_at(ip, Instant::now())
    }

    fn allow_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !windows.contains_key(&ip) && windows.len() >= self.config.max_tracked {
            windows.retain(|_, w| w.resets_at > now);
            debug!(tracked = windows.len(), "Swept expired rate limit windows");
            if windows.len() >= self.config.max_tracked {
                let oldest = windows
                    .iter()
                    .min_by_key(|(_, w)| w.resets_at)
                    .map(|(&addr, _)| addr);
                if let Some(evicted) = oldest {
                    windows.remove(&evicted);
                    warn!(ip = %ip, evicted = %evicted, "Rate limiter full, evicted oldest window");
                }
            }
        }

        let window = windows.entry(ip).or_insert(Window {
            count: 0,
            resets_at: now + self.config.window,
        });
        if now >= window.resets_at {
            *window = Window {
                count: 0,
                resets_at: now + self.config.window,
            };
        }
        if window.count >= self.config.max_requests {
            return false;
        }
        window.count += 1;
        true
    }

    /// Number of addresses currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Middleware rejecting requests over the limit with 429.
///
/// Requests without a known peer address (no `ConnectInfo`) pass through.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = peer {
        if !limiter.allow(ip) {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            return ApiError::RateLimited.into_response();
        }
    }

    next.run(request).await
}
