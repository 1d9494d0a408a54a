//! Resource limits applied to connections and requests

pub mod limits;

pub use limits::{
    ConnectionError, ConnectionGuard, ConnectionLimiter, ConnectionMetrics, SizeError,
    SizeValidator,
};
