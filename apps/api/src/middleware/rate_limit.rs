//! Per-caller fixed-window rate limiter middleware.
//!
//! Callers are identified by the first `X-Forwarded-For` address, else the
//! peer address. Each identity gets `max_per_minute` requests per window;
//! the window restarts on the first request after it lapses.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Extension, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::errors::AppError;

const WINDOW: Duration = Duration::from_secs(60);
/// Above this many tracked callers, lapsed windows are swept on insert.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_minute: u32,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request for `identity`. `Err` carries the seconds until
    /// the caller's window lapses.
    pub fn try_acquire(&self, identity: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        if windows.len() >= SWEEP_THRESHOLD && !windows.contains_key(identity) {
            windows.retain(|_, w| now.duration_since(w.started) < WINDOW);
        }

        let window = windows.entry(identity.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= WINDOW {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.max_per_minute {
            window.count += 1;
            Ok(())
        } else {
            let remaining = WINDOW.saturating_sub(now.duration_since(window.started));
            Err(remaining.as_secs().max(1))
        }
    }
}

fn caller_identity(req: &Request) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(addr) = forwarded {
        return addr.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let identity = caller_identity(&req);
    match limiter.try_acquire(&identity) {
        Ok(()) => next.run(req).await,
        Err(retry_after_secs) => {
            warn!(identity = %identity, path = %req.uri().path(), "Rate limit exceeded");
            AppError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
