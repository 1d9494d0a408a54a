use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission control for concurrent connections
///
/// Each accepted connection holds a [`ConnectionGuard`] for its whole
/// lifetime; once `max_connections` guards are alive further connections are
/// refused instead of queued.
#[derive(Debug)]
pub struct ConnectionLimiter {
    active_connections: Arc<AtomicUsize>,
    total_connections: AtomicU64,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize) -> Self {
        Self {
            active_connections: Arc::new(AtomicUsize::new(0)),
            total_connections: AtomicU64::new(0),
            semaphore: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Claims a connection slot without waiting
    pub fn try_acquire(&self) -> Result<ConnectionGuard, ConnectionError> {
        let permit = Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|e| match e {
                tokio::sync::TryAcquireError::NoPermits => ConnectionError::LimitReached {
                    max: self.max_connections,
                },
                tokio::sync::TryAcquireError::Closed => ConnectionError::Closed,
            })?;

        let active = self.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total_connections.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            active_connections = active,
            total_connections = total,
            "Connection slot acquired"
        );

        Ok(ConnectionGuard {
            _permit: permit,
            active_connections: Arc::clone(&self.active_connections),
            start_time: Instant::now(),
        })
    }

    pub fn metrics(&self) -> ConnectionMetrics {
        ConnectionMetrics {
            active_connections: self.active_connections.load(Ordering::SeqCst),
            total_connections: self.total_connections.load(Ordering::SeqCst),
            available_slots: self.semaphore.available_permits(),
            max_connections: self.max_connections,
        }
    }
}

/// RAII slot held by a connection task
pub struct ConnectionGuard {
    _permit: OwnedSemaphorePermit,
    active_connections: Arc<AtomicUsize>,
    start_time: Instant,
}

impl ConnectionGuard {
    /// Number of connections alive, this one included
    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.active_connections.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(
            active_connections = active,
            connection_duration_ms = self.start_time.elapsed().as_millis(),
            "Connection slot released"
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection limit of {max} reached")]
    LimitReached { max: usize },
    #[error("Connection limiter closed")]
    Closed,
}

/// Point-in-time view of connection usage
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    pub active_connections: usize,
    pub total_connections: u64,
    pub available_slots: usize,
    pub max_connections: usize,
}

/// Upper bound check for request heads and bodies
#[derive(Debug, Clone)]
pub struct SizeValidator {
    max_size: usize,
}

impl SizeValidator {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn validate_size(&self, size: usize) -> Result<(), SizeError> {
        if size > self.max_size {
            Err(SizeError::TooLarge {
                actual: size,
                max: self.max_size,
            })
        } else {
            Ok(())
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SizeError {
    #[error("{actual} bytes, maximum allowed: {max} bytes")]
    TooLarge { actual: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_limiter() {
        let limiter = ConnectionLimiter::new(2);

        let guard1 = limiter.try_acquire().unwrap();
        let _guard2 = limiter.try_acquire().unwrap();
        assert_eq!(guard1.active(), 2);

        assert!(matches!(
            limiter.try_acquire(),
            Err(ConnectionError::LimitReached { max: 2 })
        ));

        drop(guard1);
        let _guard3 = limiter.try_acquire().unwrap();

        let metrics = limiter.metrics();
        assert_eq!(metrics.active_connections, 2);
        assert_eq!(metrics.total_connections, 3);
        assert_eq!(metrics.available_slots, 0);
    }

    #[test]
    fn test_size_validator() {
        let validator = SizeValidator::new(100);

        assert!(validator.validate_size(50).is_ok());
        assert!(validator.validate_size(100).is_ok());
        assert!(validator.validate_size(101).is_err());
    }
}
