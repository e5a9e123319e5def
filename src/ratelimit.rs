use axum::http::HeaderMap;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How often the lazy sweep of expired windows may run. The sweep is amortized into
/// `check` calls; there is no background task.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// RateLimitBucket
///
/// The fixed preset table of rate-limit buckets. Each bucket pairs with an
/// identifier (normally the caller IP) to form a counter key, so one caller
/// exhausting the login bucket does not affect another caller or another bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitBucket {
    /// Password-grant attempts: 5 per minute.
    Login,
    /// Account registration: 3 per 10 minutes.
    Signup,
    /// General authenticated API mutations: 100 per minute.
    Api,
    /// Payment-order creation: 10 per minute. Consumed by the (out-of-scope)
    /// payment handlers through the same interface.
    Payment,
    /// Administrator bootstrap attempts: 3 per hour.
    AdminSetup,
}

impl RateLimitBucket {
    /// The preset window configuration for this bucket.
    pub fn config(self) -> BucketConfig {
        match self {
            RateLimitBucket::Login => BucketConfig::new(5, Duration::from_secs(60)),
            RateLimitBucket::Signup => BucketConfig::new(3, Duration::from_secs(600)),
            RateLimitBucket::Api => BucketConfig::new(100, Duration::from_secs(60)),
            RateLimitBucket::Payment => BucketConfig::new(10, Duration::from_secs(60)),
            RateLimitBucket::AdminSetup => BucketConfig::new(3, Duration::from_secs(3600)),
        }
    }

    fn key_prefix(self) -> &'static str {
        match self {
            RateLimitBucket::Login => "login",
            RateLimitBucket::Signup => "signup",
            RateLimitBucket::Api => "api",
            RateLimitBucket::Payment => "payment",
            RateLimitBucket::AdminSetup => "admin-setup",
        }
    }
}

/// BucketConfig
///
/// Maximum request count per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl BucketConfig {
    const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

// One live counter window. Created on first request for a key, mutated in place
// while the window is live, removed by the sweep once expired.
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
    window: Duration,
}

/// Decision
///
/// The outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed; `remaining` permits are left in the window
    /// (suitable for an `X-RateLimit-Remaining` header).
    Allowed { remaining: u32 },
    /// The window is exhausted; the caller should wait `retry_after` before
    /// retrying (suitable for a `Retry-After` header).
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// RateLimiter
///
/// Process-wide fixed-window request counters, keyed by `{bucket}:{identifier}`.
/// Pure in-process logic: no I/O, never suspends. Shared across all request tasks
/// as an explicit service object in the application state (never a bare global), so
/// a multi-instance deployment can swap it for an external atomic counter store
/// behind the same interface.
///
/// The per-key read-increment-write sequence must be atomic under parallel request
/// handling; `DashMap`'s entry locking provides that. State is process-local only:
/// horizontally scaled instances each count independently.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    last_sweep: Mutex<Instant>,
}

/// The concrete type used to share the rate limiter across the application state.
pub type RateLimiterState = Arc<RateLimiter>;

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// check
    ///
    /// Consume one unit of `bucket` for `identifier` against the current clock.
    pub fn check(&self, bucket: RateLimitBucket, identifier: &str) -> Decision {
        self.check_at(bucket, identifier, Instant::now())
    }

    /// check_at
    ///
    /// Fixed-window algorithm, evaluated at an explicit `now` so window rollover is
    /// testable without waiting out real windows:
    /// - no entry, or the window has elapsed: the entry restarts at `{count: 1,
    ///   window_start: now}` and the request is allowed with `max - 1` remaining;
    /// - live window below the limit: increment and allow;
    /// - live window at the limit: deny with the time left until the window resets.
    pub fn check_at(&self, bucket: RateLimitBucket, identifier: &str, now: Instant) -> Decision {
        self.sweep(now);

        let config = bucket.config();
        let key = format!("{}:{}", bucket.key_prefix(), identifier);

        let mut entry = self.entries.entry(key).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
            window: config.window,
        });

        if now.duration_since(entry.window_start) >= entry.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count < config.max_requests {
            entry.count += 1;
            Decision::Allowed {
                remaining: config.max_requests - entry.count,
            }
        } else {
            Decision::Denied {
                retry_after: entry.window - now.duration_since(entry.window_start),
            }
        }
    }

    /// Opportunistic full sweep of expired windows, bounding memory to the set of
    /// keys active within their own window plus at most one sweep interval. Runs at
    /// most once per `SWEEP_INTERVAL`.
    fn sweep(&self, now: Instant) {
        {
            let Ok(mut last_sweep) = self.last_sweep.lock() else {
                return;
            };
            if now.duration_since(*last_sweep) < SWEEP_INTERVAL {
                return;
            }
            *last_sweep = now;
        }

        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < entry.window);
    }

    /// Number of live counter entries. Exposed for tests and diagnostics.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// client_ip
///
/// Derives the rate-limit identifier from client-identifying headers: the first hop
/// of the `x-forwarded-for` chain, then `x-real-ip`, else `"unknown"`.
///
/// Behind an untrusted proxy these headers are client-controlled, so the identifier
/// is spoofable. That is a known limitation of header-derived identification; the
/// deployment's edge proxy is expected to overwrite them.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    "unknown".to_string()
}
