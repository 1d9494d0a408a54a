use crate::Result;
use async_trait::async_trait;

/// Common trait for long-running servers
#[async_trait]
pub trait ServerTrait {
    /// Binds the configured address and serves until shut down
    async fn run(&self) -> Result<()>;

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;
}
