use super::error::HttpError;
use super::request::Headers;
use crate::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};
use http::Method;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const MAX_RESPONSE_HEADERS: usize = 64;

/// A response as seen by [`HttpClient`]
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl ClientResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or_default()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::Http(HttpError::Malformed(format!("Response body is not JSON: {e}")))
        })
    }
}

/// Minimal keep-alive HTTP/1.1 client
///
/// Used to drive the server from tests and benchmarks; requests on one
/// client are sent over a single connection.
///
/// ```no_run
/// use echobin::HttpClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = HttpClient::connect("127.0.0.1:8080".parse()?).await?;
///     let response = client.get("/uuid").await?;
///     println!("{} {}", response.status, response.text());
///     Ok(())
/// }
/// ```
pub struct HttpClient {
    stream: TcpStream,
    addr: SocketAddr,
    buffer: BytesMut,
    timeout: Duration,
}

impl HttpClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = timeout(Duration::from_secs(10), TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout("Connection timeout".to_string()))??;
        Ok(Self {
            stream,
            addr,
            buffer: BytesMut::with_capacity(8192),
            timeout: Duration::from_secs(30),
        })
    }

    /// Sets how long to wait for each response
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn get(&mut self, target: &str) -> Result<ClientResponse> {
        self.request(Method::GET, target, &[], &[]).await
    }

    pub async fn request(
        &mut self,
        method: Method,
        target: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<ClientResponse> {
        let mut head = format!("{method} {target} HTTP/1.1\r\n");
        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("host")) {
            head.push_str(&format!("Host: {}\r\n", self.addr));
        }
        for (name, value) in headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if !body.is_empty() || [Method::POST, Method::PUT, Method::PATCH].contains(&method) {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut raw = head.into_bytes();
        raw.extend_from_slice(body);
        self.send_raw(&raw).await?;
        self.read_response(method == Method::HEAD).await
    }

    /// Writes bytes to the connection as-is
    pub async fn send_raw(&mut self, raw: &[u8]) -> Result<()> {
        timeout(self.timeout, self.stream.write_all(raw))
            .await
            .map_err(|_| Error::Timeout("Write timeout".to_string()))??;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads the next complete response from the connection
    pub async fn read_response(&mut self, head_only: bool) -> Result<ClientResponse> {
        timeout(self.timeout, self.read_response_inner(head_only))
            .await
            .map_err(|_| Error::Timeout("Response timeout".to_string()))?
    }

    async fn read_response_inner(&mut self, head_only: bool) -> Result<ClientResponse> {
        loop {
            if let Some((head_len, status, reason, headers)) = parse_head(&self.buffer)? {
                let no_body = head_only
                    || (100..200).contains(&status)
                    || status == 204
                    || status == 304;
                let length = match headers.get("content-length") {
                    _ if no_body => Some(0),
                    Some(value) => Some(value.trim().parse::<usize>().map_err(|_| {
                        let detail = format!("Invalid Content-Length: {value}");
                        Error::Http(HttpError::Malformed(detail))
                    })?),
                    None => None,
                };

                let body = match length {
                    Some(length) => {
                        while self.buffer.len() < head_len + length {
                            self.fill().await?;
                        }
                        self.buffer.advance(head_len);
                        self.buffer.split_to(length).freeze()
                    }
                    // Body delimited by connection close.
                    None => {
                        while self.fill_or_eof().await? {}
                        self.buffer.advance(head_len);
                        self.buffer.split().freeze()
                    }
                };

                return Ok(ClientResponse {
                    status,
                    reason,
                    headers,
                    body,
                });
            }
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Result<()> {
        if self.fill_or_eof().await? {
            Ok(())
        } else {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before response was complete",
            )))
        }
    }

    /// Reads more bytes; returns `false` at end of stream
    async fn fill_or_eof(&mut self) -> Result<bool> {
        let n = self.stream.read_buf(&mut self.buffer).await?;
        Ok(n > 0)
    }

    /// Waits until the server closes the connection
    ///
    /// Returns `true` if the connection was closed without further data.
    pub async fn closed_by_server(&mut self) -> Result<bool> {
        let n = timeout(self.timeout, self.stream.read_buf(&mut self.buffer))
            .await
            .map_err(|_| Error::Timeout("Connection still open".to_string()))??;
        Ok(n == 0)
    }
}

type ParsedHead = (usize, u16, String, Headers);

fn parse_head(buffer: &[u8]) -> Result<Option<ParsedHead>> {
    let mut header_buf = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut response = httparse::Response::new(&mut header_buf);
    match response.parse(buffer) {
        Ok(httparse::Status::Complete(len)) => {
            let mut headers = Headers::new();
            for header in response.headers.iter() {
                headers.push(header.name, String::from_utf8_lossy(header.value).into_owned());
            }
            Ok(Some((
                len,
                response.code.unwrap_or_default(),
                response.reason.unwrap_or_default().to_string(),
                headers,
            )))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(Error::Http(HttpError::Malformed(format!(
            "Failed to parse response head: {e}"
        )))),
    }
}
