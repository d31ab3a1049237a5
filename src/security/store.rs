//! Counter stores backing the rate limiter.
//!
//! Both stores implement fixed-window counting with an all-or-nothing
//! acquire: a hit is recorded against every quota of a request, or against
//! none of them.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tokio::time::Instant;

/// Entries beyond this count trigger a sweep of expired windows.
const SWEEP_THRESHOLD: usize = 10_000;

const KEY_PREFIX: &str = "provision-relay:ratelimit:";

/// Errors raised by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("counter store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("counter store lock poisoned")]
    Poisoned,
}

/// One quota to check for a request: a counter key and its window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaKey {
    pub key: String,
    pub limit: u64,
    pub window: Duration,
}

/// Outcome of an acquire attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    Admitted,
    /// `quota` is the index of the first exhausted quota.
    Rejected { quota: usize, retry_after: Duration },
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Record one hit against every quota if all have capacity left.
    async fn try_acquire(&self, quotas: &[QuotaKey]) -> Result<Acquire, StoreError>;

    /// Short name for logs and metrics.
    fn backend(&self) -> &'static str;
}

struct Window {
    count: u64,
    started: Instant,
    length: Duration,
}

impl Window {
    fn remaining(&self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.started);
        self.length.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

/// In-process fixed-window counters. Limits only this instance.
#[derive(Default)]
pub struct LocalStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire_at(&self, quotas: &[QuotaKey], now: Instant) -> Result<Acquire, StoreError> {
        let mut windows = self.windows.lock().map_err(|_| StoreError::Poisoned)?;

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| w.remaining(now).is_some());
        }

        for (index, quota) in quotas.iter().enumerate() {
            if let Some(window) = windows.get(&quota.key) {
                if let Some(remaining) = window.remaining(now) {
                    if window.count >= quota.limit {
                        return Ok(Acquire::Rejected {
                            quota: index,
                            retry_after: remaining,
                        });
                    }
                }
            }
        }

        for quota in quotas {
            let window = windows.entry(quota.key.clone()).or_insert(Window {
                count: 0,
                started: now,
                length: quota.window,
            });
            if window.remaining(now).is_none() {
                *window = Window {
                    count: 0,
                    started: now,
                    length: quota.window,
                };
            }
            window.count += 1;
        }

        Ok(Acquire::Admitted)
    }
}

#[async_trait]
impl CounterStore for LocalStore {
    async fn try_acquire(&self, quotas: &[QuotaKey]) -> Result<Acquire, StoreError> {
        self.acquire_at(quotas, Instant::now())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// KEYS[i] is a counter; ARGV[2i-1] its limit and ARGV[2i] its window in ms.
// Returns {-1, 0} when admitted, {i - 1, pttl} when quota i is exhausted.
const ACQUIRE_SCRIPT: &str = r#"
for i, key in ipairs(KEYS) do
  local count = tonumber(redis.call('GET', key) or '0')
  if count >= tonumber(ARGV[2 * i - 1]) then
    local ttl = redis.call('PTTL', key)
    if ttl < 0 then ttl = tonumber(ARGV[2 * i]) end
    return {i - 1, ttl}
  end
end
for i, key in ipairs(KEYS) do
  redis.call('INCR', key)
  if redis.call('PTTL', key) < 0 then
    redis.call('PEXPIRE', key, ARGV[2 * i])
  end
end
return {-1, 0}
"#;

/// Redis-backed counters shared by every relay instance.
pub struct RedisStore {
    connection: ConnectionManager,
    script: redis::Script,
    timeout: Duration,
}

impl RedisStore {
    /// Connect and verify the store answers a PING within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;

        let mut connection = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Timeout(timeout))??;

        let _: String = tokio::time::timeout(timeout, redis::cmd("PING").query_async(&mut connection))
            .await
            .map_err(|_| StoreError::Timeout(timeout))??;

        Ok(Self {
            connection,
            script: redis::Script::new(ACQUIRE_SCRIPT),
            timeout,
        })
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn try_acquire(&self, quotas: &[QuotaKey]) -> Result<Acquire, StoreError> {
        let mut invocation = self.script.prepare_invoke();
        for quota in quotas {
            invocation
                .key(format!("{}{}", KEY_PREFIX, quota.key))
                .arg(quota.limit)
                .arg(window_millis(quota.window));
        }

        let mut connection = self.connection.clone();
        let (index, ttl_ms): (i64, i64) =
            tokio::time::timeout(self.timeout, invocation.invoke_async(&mut connection))
                .await
                .map_err(|_| StoreError::Timeout(self.timeout))??;

        if index < 0 {
            Ok(Acquire::Admitted)
        } else {
            Ok(Acquire::Rejected {
                quota: index as usize,
                retry_after: Duration::from_millis(ttl_ms.max(0) as u64),
            })
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

fn window_millis(window: Duration) -> u64 {
    (window.as_millis() as u64).max(1)
}
