use crate::Result;
use crate::common::ServerTrait;
use crate::http::{Dispatcher, Entropy, HttpConfig, HttpServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A server running on an ephemeral loopback port
///
/// The server task is aborted when this value is dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub server: Arc<HttpServer>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Asks the server to stop and waits for its accept loop to finish
    pub async fn shutdown(mut self) -> Result<()> {
        let signal = self.server.shutdown_signal();
        // The accept loop subscribes once the task first runs.
        while signal.receiver_count() == 0 && !self.handle.is_finished() {
            tokio::task::yield_now().await;
        }
        let _ = signal.send(());
        (&mut self.handle)
            .await
            .map_err(|e| crate::Error::Config(format!("Server task failed: {e}")))?
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Starts a server for integration tests
///
/// The listener is bound before this returns, so clients may connect
/// immediately. `bind_addr` in `config` is ignored. Random output is seeded
/// for reproducibility.
pub async fn spawn_test_server(config: HttpConfig) -> Result<TestServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let config = HttpConfig {
        bind_addr: addr,
        ..config
    };
    let dispatcher = Dispatcher::new(&config).with_entropy(Entropy::seeded(0x5eed));
    let server = Arc::new(HttpServer::with_dispatcher(config, dispatcher));

    let handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.serve(listener).await })
    };

    Ok(TestServer {
        addr,
        server,
        handle,
    })
}
