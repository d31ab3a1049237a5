//! Rate limiting middleware with per-client and global quotas.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::store::{Acquire, CounterStore, LocalStore, QuotaKey, RedisStore, StoreError};

const GLOBAL_KEY: &str = "global";

/// "N requests per window", parsed from strings like `1 per 5 minutes`,
/// `100 per hour` or `10/second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateLimitSpec {
    pub limit: u64,
    pub window: Duration,
}

impl RateLimitSpec {
    pub const fn per_minutes(limit: u64, minutes: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(minutes * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rate limit '{input}': {reason}")]
pub struct RateLimitSpecError {
    input: String,
    reason: &'static str,
}

impl FromStr for RateLimitSpec {
    type Err = RateLimitSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| RateLimitSpecError {
            input: s.to_string(),
            reason,
        };

        let normalized = s.trim().to_ascii_lowercase();
        let (count, period) = normalized
            .split_once(" per ")
            .or_else(|| normalized.split_once('/'))
            .ok_or_else(|| fail("expected '<count> per <period>'"))?;

        let limit: u64 = count
            .trim()
            .parse()
            .map_err(|_| fail("count is not a number"))?;

        let mut parts = period.split_whitespace();
        let (multiplier, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(n), Some(unit), None) => {
                let n: u64 = n.parse().map_err(|_| fail("period multiplier is not a number"))?;
                (n, unit)
            }
            _ => return Err(fail("expected a period such as 'hour' or '5 minutes'")),
        };

        let unit_secs = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3600,
            "day" => 86_400,
            _ => return Err(fail("unknown period unit")),
        };

        if multiplier == 0 {
            return Err(fail("period must be greater than zero"));
        }

        let window_secs = multiplier
            .checked_mul(unit_secs)
            .ok_or_else(|| fail("period is too large"))?;

        Ok(Self {
            limit,
            window: Duration::from_secs(window_secs),
        })
    }
}

impl fmt::Display for RateLimitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window.as_secs();
        let (n, unit) = if secs % 86_400 == 0 {
            (secs / 86_400, "day")
        } else if secs % 3600 == 0 {
            (secs / 3600, "hour")
        } else if secs % 60 == 0 {
            (secs / 60, "minute")
        } else {
            (secs, "second")
        };
        if n == 1 {
            write!(f, "{} per {}", self.limit, unit)
        } else {
            write!(f, "{} per {} {}s", self.limit, n, unit)
        }
    }
}

impl TryFrom<String> for RateLimitSpec {
    type Error = RateLimitSpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RateLimitSpec> for String {
    fn from(spec: RateLimitSpec) -> Self {
        spec.to_string()
    }
}

/// Which quota turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    Client,
    Global,
}

impl QuotaScope {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotaScope::Client => "client",
            QuotaScope::Global => "global",
        }
    }
}

/// Result of checking a request against both quotas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Limited {
        scope: QuotaScope,
        retry_after: Duration,
    },
}

/// Enforces the per-client and global quotas against a counter store.
///
/// The store is picked once, at construction.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    per_client: RateLimitSpec,
    global: RateLimitSpec,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, per_client: RateLimitSpec, global: RateLimitSpec) -> Self {
        Self {
            store,
            per_client,
            global,
        }
    }

    /// Use Redis when `store_url` is set and reachable, otherwise fall back to
    /// in-process counters for the lifetime of this limiter.
    pub async fn connect(config: &RateLimitConfig) -> Self {
        let store: Arc<dyn CounterStore> = match &config.store_url {
            Some(url) => {
                let timeout = Duration::from_secs(config.store_connect_timeout_secs.max(1));
                match RedisStore::connect(url, timeout).await {
                    Ok(store) => {
                        tracing::info!("Connected to Redis for rate limiting");
                        Arc::new(store)
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "Redis connection failed, using in-memory rate limiting"
                        );
                        Arc::new(LocalStore::new())
                    }
                }
            }
            None => {
                tracing::info!("No counter store configured, using in-memory rate limiting");
                Arc::new(LocalStore::new())
            }
        };

        Self::new(store, config.per_client, config.global)
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Admit or reject one request from `client`. Admission charges both quotas.
    pub async fn check(&self, client: &str) -> Result<Admission, StoreError> {
        let quotas = [
            QuotaKey {
                key: format!("client:{}", client),
                limit: self.per_client.limit,
                window: self.per_client.window,
            },
            QuotaKey {
                key: GLOBAL_KEY.to_string(),
                limit: self.global.limit,
                window: self.global.window,
            },
        ];

        Ok(match self.store.try_acquire(&quotas).await? {
            Acquire::Admitted => Admission::Admitted,
            Acquire::Rejected { quota, retry_after } => Admission::Limited {
                scope: if quota == 0 {
                    QuotaScope::Client
                } else {
                    QuotaScope::Global
                },
                retry_after,
            },
        })
    }
}

/// Client identity attached to admitted requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

/// Source IP of the connection, or "unknown" when the server was not started
/// with connect info.
pub fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware applied in front of the provisioning handler.
///
/// Runs before the body is inspected, so malformed requests are charged too.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&request);

    match limiter.check(&client).await {
        Ok(Admission::Admitted) => {
            request.extensions_mut().insert(ClientAddr(client));
            next.run(request).await
        }
        Ok(Admission::Limited { scope, retry_after }) => {
            tracing::warn!(
                client = %client,
                scope = scope.as_str(),
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(scope.as_str());
            ApiError::RateLimited {
                retry_after: Some(retry_after),
            }
            .into_response()
        }
        Err(e) => {
            tracing::error!(client = %client, backend = limiter.backend(), error = %e, "Rate limit check failed");
            ApiError::Internal.into_response()
        }
    }
}
