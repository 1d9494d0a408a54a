use crate::{Error, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the HTTP diagnostics server
///
/// # Examples
///
/// ```rust
/// use echobin::http::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig {
///     bind_addr: "127.0.0.1:8080".parse().unwrap(),
///     max_delay: Duration::from_secs(5),
///     ..HttpConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Largest accepted request body in bytes
    pub max_request_size: usize,
    /// Largest accepted request line plus headers in bytes
    pub max_header_size: usize,
    /// How long to wait for (the rest of) a request before closing
    pub read_timeout: Duration,
    /// Write timeout for responses
    pub write_timeout: Duration,
    /// Upper bound on handling a single request, delays included
    pub request_timeout: Duration,
    /// Ceiling that `/delay/{seconds}` is clamped to
    pub max_delay: Duration,
    /// Server name to include in responses (optional)
    pub server_name: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            max_request_size: 1024 * 1024, // 1MB
            max_header_size: 16 * 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            max_delay: Duration::from_secs(10),
            server_name: Some(concat!("echobin/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl HttpConfig {
    /// Checks that the limits are usable together
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be greater than zero".to_string()));
        }
        if self.max_header_size == 0 {
            return Err(Error::Config("max_header_size must be greater than zero".to_string()));
        }
        if self.max_request_size == 0 {
            return Err(Error::Config("max_request_size must be greater than zero".to_string()));
        }
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(Error::Config("read and write timeouts must be non-zero".to_string()));
        }
        if self.request_timeout <= self.max_delay {
            return Err(Error::Config(format!(
                "request_timeout ({:?}) must exceed max_delay ({:?})",
                self.request_timeout, self.max_delay
            )));
        }
        Ok(())
    }

    /// Builds a configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overrides fields from `ECHOBIN_*` variables resolved through `lookup`
    ///
    /// `ECHOBIN_BIND` takes a full socket address, `ECHOBIN_PORT` only
    /// replaces the port. Durations are given in (fractional) seconds.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("ECHOBIN_BIND") {
            self.bind_addr = parse_var("ECHOBIN_BIND", &bind)?;
        }
        if let Some(port) = lookup("ECHOBIN_PORT") {
            self.bind_addr.set_port(parse_var("ECHOBIN_PORT", &port)?);
        }
        if let Some(max) = lookup("ECHOBIN_MAX_CONNECTIONS") {
            self.max_connections = parse_var("ECHOBIN_MAX_CONNECTIONS", &max)?;
        }
        if let Some(delay) = lookup("ECHOBIN_MAX_DELAY") {
            self.max_delay = parse_seconds("ECHOBIN_MAX_DELAY", &delay)?;
        }
        if let Some(timeout) = lookup("ECHOBIN_REQUEST_TIMEOUT") {
            self.request_timeout = parse_seconds("ECHOBIN_REQUEST_TIMEOUT", &timeout)?;
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={value:?}: {e}")))
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    let seconds: f64 = parse_var(key, value)?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| Error::Config(format!("{key}={value:?}: {e}")))
}
