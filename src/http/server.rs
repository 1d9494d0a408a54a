use super::codec::HttpCodec;
use super::config::HttpConfig;
use super::dispatch::Dispatcher;
use super::error::HttpError;
use super::request::IncomingRequest;
use super::response::OutgoingResponse;
use crate::Result;
use crate::common::ServerTrait;
use crate::security::{ConnectionLimiter, ConnectionMetrics};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use http::Method;
use http::header::{CONNECTION, HeaderValue};
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::{signal, time::timeout};
use tokio_util::codec::Framed;
use tracing::{Instrument, debug, error, info, warn};

/// HTTP/1.1 diagnostics server
///
/// Each accepted connection runs in its own task; requests on a connection
/// are answered in order.
///
/// # Examples
///
/// ```no_run
/// use echobin::{HttpConfig, HttpServer, ServerTrait};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = HttpConfig {
///         bind_addr: "127.0.0.1:8080".parse()?,
///         ..HttpConfig::default()
///     };
///     let server = HttpServer::new(config);
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct HttpServer {
    config: HttpConfig,
    dispatcher: Arc<Dispatcher>,
    limiter: Arc<ConnectionLimiter>,
    shutdown_signal: Arc<tokio::sync::broadcast::Sender<()>>,
}

type Frames = Framed<TcpStream, HttpCodec>;

impl HttpServer {
    pub fn new(config: HttpConfig) -> Self {
        let dispatcher = Dispatcher::new(&config);
        Self::with_dispatcher(config, dispatcher)
    }

    /// Creates a server around a preconfigured dispatcher
    pub fn with_dispatcher(config: HttpConfig, dispatcher: Dispatcher) -> Self {
        let (shutdown_signal, _) = tokio::sync::broadcast::channel(1);
        Self {
            limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            dispatcher: Arc::new(dispatcher),
            config,
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn metrics(&self) -> ConnectionMetrics {
        self.limiter.metrics()
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Accepts connections from `listener` until shutdown is requested
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "HTTP server listening");

        let mut shutdown_rx = self.shutdown_signal.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping server");
                    break;
                }
            }
        }

        info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let guard = match self.limiter.try_acquire() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(%addr, error = %e, "Connection rejected");
                return;
            }
        };

        let current = guard.active();
        debug!(%addr, current, "Accepted connection");

        let config = self.config.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let span = tracing::info_span!("connection", %addr);

        tokio::spawn(
            async move {
                if let Err(e) = Self::handle_connection(stream, addr, config, dispatcher).await {
                    debug!(%addr, error = %e, "Connection ended with error");
                }
                drop(guard);
                debug!(%addr, "Connection closed");
            }
            .instrument(span),
        );
    }

    /// Serves requests on one connection until it closes or must be closed
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        config: HttpConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<()> {
        let local_addr = stream.local_addr()?;
        let codec = HttpCodec::new(
            addr,
            local_addr,
            config.max_header_size,
            config.max_request_size,
        )
        .with_server_name(config.server_name.clone());
        let mut framed = Framed::new(stream, codec);

        // A request that arrived while the previous one was still being handled.
        let mut pending: Option<std::result::Result<IncomingRequest, HttpError>> = None;

        loop {
            let next = match pending.take() {
                Some(next) => next,
                None => match timeout(config.read_timeout, framed.next()).await {
                    Ok(Some(next)) => next,
                    Ok(None) => {
                        debug!(%addr, "Client closed connection");
                        break;
                    }
                    Err(_) => {
                        debug!(%addr, "Read timeout");
                        break;
                    }
                },
            };

            let request = match next {
                Ok(request) => request,
                Err(HttpError::Io(e)) => return Err(e.into()),
                Err(e) => {
                    warn!(
                        %addr,
                        status = e.status().as_u16(),
                        error = %e,
                        "Rejecting unreadable request"
                    );
                    let response = e.into_response();
                    Self::send(&mut framed, &config, response, false).await?;
                    break;
                }
            };

            let outcome =
                Self::respond_or_abandon(&mut framed, &dispatcher, &request, &mut pending).await;
            let Some(mut response) = outcome else {
                info!(
                    %addr,
                    method = %request.method(),
                    path = request.path(),
                    "Client disconnected, abandoning response"
                );
                break;
            };

            if *request.method() == Method::HEAD {
                response = response.without_body();
            }
            let keep_alive = request.keep_alive() && !response.status().is_informational();
            if !Self::send(&mut framed, &config, response, keep_alive).await? || !keep_alive {
                break;
            }
        }

        Ok(())
    }

    /// Runs the dispatcher while watching the connection
    ///
    /// Returns `None` when the peer goes away first; the handler, and any
    /// timer it is waiting on, is dropped with it. The handler is always
    /// polled first, so a response that is already available is returned
    /// even if the peer has shut down its write side.
    async fn respond_or_abandon(
        framed: &mut Frames,
        dispatcher: &Dispatcher,
        request: &IncomingRequest,
        pending: &mut Option<std::result::Result<IncomingRequest, HttpError>>,
    ) -> Option<OutgoingResponse> {
        let mut handler = pin!(dispatcher.dispatch(request));

        loop {
            tokio::select! {
                biased;

                response = &mut handler => return Some(response),
                next = framed.next(), if pending.is_none() => match next {
                    None | Some(Err(HttpError::Io(_))) => return None,
                    Some(next) => *pending = Some(next),
                },
            }
        }
    }

    /// Writes `response`; returns `false` if the write timed out
    async fn send(
        framed: &mut Frames,
        config: &HttpConfig,
        mut response: OutgoingResponse,
        keep_alive: bool,
    ) -> Result<bool> {
        let connection = if keep_alive { "keep-alive" } else { "close" };
        response
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static(connection));

        match timeout(config.write_timeout, framed.send(response)).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!("Write timeout");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ServerTrait for HttpServer {
    async fn run(&self) -> Result<()> {
        self.config.validate()?;
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}
