//! Sliding-window rate limiting for provider calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::info;

use crate::error::Result;

use super::client::TextGenerator;
use super::types::{Generation, GenerationRequest, Provider};

/// Limits calls to `max_calls` per sliding window (one minute by default).
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: u32,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing `max_calls_per_minute` calls in any 60 second window.
    pub fn per_minute(max_calls_per_minute: u32) -> Self {
        Self::new(max_calls_per_minute, Duration::from_secs(60))
    }

    /// Limiter with a custom window. `max_calls` is raised to at least 1.
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    /// Wait until another call fits in the window, then record it.
    ///
    /// The lock is held while sleeping so waiting callers are served in order.
    pub async fn acquire(&self) {
        let mut calls = self.calls.lock().await;
        self.evict_expired(&mut calls, Instant::now());

        if calls.len() >= self.max_calls as usize {
            if let Some(&oldest) = calls.front() {
                let ready_at = oldest + self.window;
                info!(
                    wait_ms = ready_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "Rate limit reached, waiting"
                );
                sleep_until(ready_at).await;
                self.evict_expired(&mut calls, Instant::now());
            }
        }

        calls.push_back(Instant::now());
    }

    fn evict_expired(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = calls.front() {
            if now.duration_since(front) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Generator wrapper that applies a [`RateLimiter`] before every call.
pub struct RateLimitedClient {
    inner: Arc<dyn TextGenerator>,
    limiter: RateLimiter,
}

impl RateLimitedClient {
    pub fn new(inner: Arc<dyn TextGenerator>, max_calls_per_minute: u32) -> Self {
        Self::with_limiter(inner, RateLimiter::per_minute(max_calls_per_minute))
    }

    pub fn with_limiter(inner: Arc<dyn TextGenerator>, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[async_trait]
impl TextGenerator for RateLimitedClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        self.limiter.acquire().await;
        self.inner.generate(request).await
    }

    fn provider(&self) -> Provider {
        self.inner.provider()
    }
}
