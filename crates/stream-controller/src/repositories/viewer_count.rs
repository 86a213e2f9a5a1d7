//! Shared viewer counter.
//!
//! One integer per deployment holds the current audience size. It lives
//! outside the process because several controller instances may serve the
//! same session.
//!
//! # Lifecycle
//!
//! - Unset until the first session start calls [`ViewerCounter::reset`]
//! - `increment` / `decrement` move it by one; on an unset counter they are
//!   no-ops that report `None`
//! - `decrement` at zero stays at zero
//! - Reads of an unset counter return `None`, distinct from `Some(0)`
//!
//! # Key Pattern
//!
//! - `live_viewer_count` - the count as a decimal string

use crate::errors::ScError;
use crate::repositories::lua_scripts;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult, Script};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Redis key holding the live viewer count.
pub const VIEWER_COUNT_KEY: &str = "live_viewer_count";

/// Shared audience counter (enables mocking).
#[async_trait]
pub trait ViewerCounter: Send + Sync {
    /// Set the counter to zero. The only operation that writes an arbitrary value.
    async fn reset(&self) -> Result<(), ScError>;

    /// Add one viewer. Returns the new count, or `None` if the counter is unset.
    async fn increment(&self) -> Result<Option<u64>, ScError>;

    /// Remove one viewer, never going below zero. Returns the new count, or
    /// `None` if the counter is unset.
    async fn decrement(&self) -> Result<Option<u64>, ScError>;

    /// Current count, or `None` if no session has reset the counter.
    async fn read(&self) -> Result<Option<u64>, ScError>;

    /// Check that the backing store answers.
    async fn ping(&self) -> Result<(), ScError>;
}

/// Map a Lua script return value onto the counter contract.
fn script_result(raw: i64) -> Result<Option<u64>, ScError> {
    match raw {
        -1 => Ok(None),
        -2 => Err(ScError::CounterUnavailable(
            "stored count is not an integer".to_string(),
        )),
        value => u64::try_from(value).map(Some).map_err(|_| {
            ScError::CounterUnavailable(format!("unexpected script result {value}"))
        }),
    }
}

// ============================================================================
// Redis implementation
// ============================================================================

/// Redis-backed viewer counter.
///
/// Cheaply cloneable; `ConnectionManager` multiplexes one connection and
/// reconnects on failure. Every operation is bounded by `timeout`, so an
/// unreachable store surfaces as `CounterUnavailable` instead of hanging.
#[derive(Clone)]
pub struct RedisViewerCounter {
    connection: ConnectionManager,
    timeout: Duration,
    increment_script: Script,
    decrement_script: Script,
}

impl RedisViewerCounter {
    /// Connect to the counter store.
    ///
    /// # Errors
    ///
    /// Returns `ScError::CounterUnavailable` if the URL is invalid or the
    /// store cannot be reached within `timeout`.
    pub async fn connect(redis_url: &SecretString, timeout: Duration) -> Result<Self, ScError> {
        let client = Client::open(redis_url.expose_secret()).map_err(|e| {
            // Note: Do NOT log redis_url as it may contain credentials
            error!(target: "sc.repositories.viewer_count", error = %e, "Failed to open Redis client");
            ScError::CounterUnavailable(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = match tokio::time::timeout(timeout, ConnectionManager::new(client)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                error!(target: "sc.repositories.viewer_count", error = %e, "Failed to connect to Redis");
                return Err(ScError::CounterUnavailable(format!(
                    "Failed to connect to Redis: {e}"
                )));
            }
            Err(_) => {
                error!(target: "sc.repositories.viewer_count", "Timed out connecting to Redis");
                return Err(ScError::CounterUnavailable(
                    "Timed out connecting to Redis".to_string(),
                ));
            }
        };

        Ok(Self {
            connection,
            timeout,
            increment_script: Script::new(lua_scripts::GUARDED_INCREMENT),
            decrement_script: Script::new(lua_scripts::CLAMPED_DECREMENT),
        })
    }

    /// Run one store operation under the configured timeout.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> Result<T, ScError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(target: "sc.repositories.viewer_count", operation, error = %e, "Counter operation failed");
                Err(ScError::CounterUnavailable(format!("{operation} failed: {e}")))
            }
            Err(_) => {
                warn!(target: "sc.repositories.viewer_count", operation, "Counter operation timed out");
                Err(ScError::CounterUnavailable(format!("{operation} timed out")))
            }
        }
    }
}

#[async_trait]
impl ViewerCounter for RedisViewerCounter {
    #[instrument(skip_all)]
    async fn reset(&self) -> Result<(), ScError> {
        let mut conn = self.connection.clone();
        self.bounded("reset", conn.set::<_, _, ()>(VIEWER_COUNT_KEY, 0))
            .await?;

        debug!(target: "sc.repositories.viewer_count", "Viewer count reset");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn increment(&self) -> Result<Option<u64>, ScError> {
        let mut conn = self.connection.clone();
        let invocation = self.increment_script.key(VIEWER_COUNT_KEY);
        let raw: i64 = self
            .bounded("increment", invocation.invoke_async(&mut conn))
            .await?;

        script_result(raw)
    }

    #[instrument(skip_all)]
    async fn decrement(&self) -> Result<Option<u64>, ScError> {
        let mut conn = self.connection.clone();
        let invocation = self.decrement_script.key(VIEWER_COUNT_KEY);
        let raw: i64 = self
            .bounded("decrement", invocation.invoke_async(&mut conn))
            .await?;

        script_result(raw)
    }

    #[instrument(skip_all)]
    async fn read(&self) -> Result<Option<u64>, ScError> {
        let mut conn = self.connection.clone();
        let stored: Option<String> = self
            .bounded("read", conn.get(VIEWER_COUNT_KEY))
            .await?;

        match stored {
            None => Ok(None),
            Some(value) => {
                let parsed: i64 = value.parse().map_err(|_| {
                    warn!(target: "sc.repositories.viewer_count", "Stored viewer count is not an integer");
                    ScError::CounterUnavailable("stored count is not an integer".to_string())
                })?;
                // Negative values are never exposed
                Ok(Some(u64::try_from(parsed).unwrap_or(0)))
            }
        }
    }

    async fn ping(&self) -> Result<(), ScError> {
        let mut conn = self.connection.clone();
        let _: String = self
            .bounded("ping", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// Sentinel for "never reset".
const UNSET: i64 = -1;

/// Process-local viewer counter.
///
/// Only suitable for tests and single-instance development: it is not shared
/// between controller instances. Mutations use compare-and-swap, so it has
/// the same no-lost-update and no-negative guarantees as the Redis scripts.
#[derive(Debug)]
pub struct InMemoryViewerCounter {
    value: AtomicI64,
    available: AtomicBool,
}

impl Default for InMemoryViewerCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryViewerCounter {
    /// A counter in the unset state.
    pub fn new() -> Self {
        Self {
            value: AtomicI64::new(UNSET),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ScError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ScError::CounterUnavailable(
                "in-memory counter marked unavailable".to_string(),
            ))
        }
    }

    fn update(&self, step: impl Fn(i64) -> i64) -> Result<Option<u64>, ScError> {
        self.check_available()?;

        let result = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != UNSET).then(|| step(current))
            });

        Ok(result
            .ok()
            .and_then(|previous| u64::try_from(step(previous)).ok()))
    }
}

#[async_trait]
impl ViewerCounter for InMemoryViewerCounter {
    async fn reset(&self) -> Result<(), ScError> {
        self.check_available()?;
        self.value.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn increment(&self) -> Result<Option<u64>, ScError> {
        self.update(|current| current + 1)
    }

    async fn decrement(&self) -> Result<Option<u64>, ScError> {
        self.update(|current| (current - 1).max(0))
    }

    async fn read(&self) -> Result<Option<u64>, ScError> {
        self.check_available()?;
        let value = self.value.load(Ordering::SeqCst);
        Ok(u64::try_from(value).ok())
    }

    async fn ping(&self) -> Result<(), ScError> {
        self.check_available()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_script_result_mapping() {
        assert_eq!(script_result(-1).unwrap(), None);
        assert_eq!(script_result(0).unwrap(), Some(0));
        assert_eq!(script_result(7).unwrap(), Some(7));
        assert!(matches!(
            script_result(-2),
            Err(ScError::CounterUnavailable(_))
        ));
        assert!(matches!(
            script_result(-5),
            Err(ScError::CounterUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unset_counter_reads_none() {
        let counter = InMemoryViewerCounter::new();
        assert_eq!(counter.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_then_read_is_zero() {
        let counter = InMemoryViewerCounter::new();
        counter.reset().await.unwrap();
        assert_eq!(counter.read().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_mutations_on_unset_counter_are_noops() {
        let counter = InMemoryViewerCounter::new();
        assert_eq!(counter.increment().await.unwrap(), None);
        assert_eq!(counter.decrement().await.unwrap(), None);
        assert_eq!(counter.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_increment_and_decrement_return_new_value() {
        let counter = InMemoryViewerCounter::new();
        counter.reset().await.unwrap();

        assert_eq!(counter.increment().await.unwrap(), Some(1));
        assert_eq!(counter.increment().await.unwrap(), Some(2));
        assert_eq!(counter.decrement().await.unwrap(), Some(1));
        assert_eq!(counter.read().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_decrement_at_zero_stays_zero() {
        let counter = InMemoryViewerCounter::new();
        counter.reset().await.unwrap();

        assert_eq!(counter.decrement().await.unwrap(), Some(0));
        assert_eq!(counter.decrement().await.unwrap(), Some(0));
        assert_eq!(counter.read().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_reset_discards_previous_count() {
        let counter = InMemoryViewerCounter::new();
        counter.reset().await.unwrap();
        counter.increment().await.unwrap();
        counter.increment().await.unwrap();

        counter.reset().await.unwrap();
        assert_eq!(counter.read().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_concurrent_updates_lose_nothing() {
        let counter = Arc::new(InMemoryViewerCounter::new());
        counter.reset().await.unwrap();

        let increments = 200;
        let decrements = 120;

        // All increments land before decrements start so the floor never clamps
        let handles: Vec<_> = (0..increments)
            .map(|_| {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move { counter.increment().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let handles: Vec<_> = (0..decrements)
            .map(|_| {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move { counter.decrement().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            counter.read().await.unwrap(),
            Some(increments - decrements)
        );
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_go_negative() {
        let counter = Arc::new(InMemoryViewerCounter::new());
        counter.reset().await.unwrap();
        for _ in 0..5 {
            counter.increment().await.unwrap();
        }

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move { counter.decrement().await })
            })
            .collect();
        for handle in handles {
            let observed = handle.await.unwrap().unwrap();
            assert!(observed.is_some());
        }

        assert_eq!(counter.read().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_unavailable_store_surfaces_error() {
        let counter = InMemoryViewerCounter::new();
        counter.reset().await.unwrap();
        counter.set_available(false);

        assert!(matches!(
            counter.read().await,
            Err(ScError::CounterUnavailable(_))
        ));
        assert!(matches!(
            counter.increment().await,
            Err(ScError::CounterUnavailable(_))
        ));
        assert!(counter.ping().await.is_err());

        counter.set_available(true);
        assert_eq!(counter.read().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_redis_connect_rejects_invalid_url() {
        let url = SecretString::from("not-a-redis-url");
        let result = RedisViewerCounter::connect(&url, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(ScError::CounterUnavailable(_))));
    }
}
