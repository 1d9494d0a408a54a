use super::error::HttpError;
use super::request::{Headers, IncomingRequest};
use super::response::OutgoingResponse;
use crate::security::SizeValidator;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::{Method, Version};
use std::net::SocketAddr;
use tokio_util::codec::{Decoder, Encoder};

const MAX_HEADERS: usize = 64;

/// How the body of the request currently being decoded is delimited
#[derive(Debug)]
enum BodyFraming {
    Length(usize),
    Chunked(ChunkedBody),
}

/// Position within a chunked body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkPhase {
    Size,
    Data(usize),
    DataEnd,
    Trailers,
}

/// A chunked body assembled across calls to `decode`
///
/// Input is consumed as soon as it is understood, so each byte is parsed and
/// copied once however the body is split across reads. Chunk extensions and
/// trailers are discarded.
#[derive(Debug)]
struct ChunkedBody {
    body: BytesMut,
    phase: ChunkPhase,
}

impl ChunkedBody {
    fn new() -> Self {
        Self {
            body: BytesMut::new(),
            phase: ChunkPhase::Size,
        }
    }

    /// Consumes what it can from `src`; returns `true` once the body is complete
    ///
    /// A size or trailer line longer than `line_limit` is rejected.
    fn advance(
        &mut self,
        src: &mut BytesMut,
        limit: &SizeValidator,
        line_limit: usize,
    ) -> Result<bool, HttpError> {
        loop {
            match self.phase {
                ChunkPhase::Size => {
                    let (used, size) = match httparse::parse_chunk_size(&src[..]) {
                        Ok(httparse::Status::Complete(parsed)) => parsed,
                        Ok(httparse::Status::Partial) => {
                            check_line(src, line_limit)?;
                            return Ok(false);
                        }
                        Err(_) => {
                            return Err(HttpError::Malformed("Invalid chunk size".to_string()));
                        }
                    };
                    src.advance(used);
                    if size == 0 {
                        self.phase = ChunkPhase::Trailers;
                        continue;
                    }

                    let size = usize::try_from(size)
                        .map_err(|_| HttpError::Malformed("Chunk size out of range".to_string()))?;
                    let total = self.body.len().saturating_add(size);
                    limit.validate_size(total).map_err(|_| HttpError::PayloadTooLarge {
                        actual: total,
                        max: limit.max_size(),
                    })?;
                    self.body.reserve(size);
                    self.phase = ChunkPhase::Data(size);
                }
                ChunkPhase::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(false);
                    }
                    let n = remaining.min(src.len());
                    self.body.put_slice(&src[..n]);
                    src.advance(n);
                    self.phase = if n == remaining {
                        ChunkPhase::DataEnd
                    } else {
                        ChunkPhase::Data(remaining - n)
                    };
                }
                ChunkPhase::DataEnd => {
                    if src.len() < 2 {
                        return Ok(false);
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(HttpError::Malformed(
                            "Missing CRLF after chunk data".to_string(),
                        ));
                    }
                    src.advance(2);
                    self.phase = ChunkPhase::Size;
                }
                // The trailer section ends at the first empty line.
                ChunkPhase::Trailers => {
                    let Some(end) = src.windows(2).position(|w| w == b"\r\n") else {
                        check_line(src, line_limit)?;
                        return Ok(false);
                    };
                    src.advance(end + 2);
                    if end == 0 {
                        return Ok(true);
                    }
                }
            }
        }
    }

    fn take(&mut self) -> Bytes {
        std::mem::take(&mut self.body).freeze()
    }
}

fn check_line(src: &BytesMut, line_limit: usize) -> Result<(), HttpError> {
    if src.len() > line_limit {
        return Err(HttpError::Malformed("Chunk framing line too long".to_string()));
    }
    Ok(())
}

#[derive(Debug)]
struct RequestHead {
    method: Method,
    version: Version,
    target: String,
    headers: Headers,
}

#[derive(Debug)]
enum DecodeState {
    Head,
    Body(RequestHead, BodyFraming),
}

/// HTTP/1.1 server-side framing
///
/// Decodes request heads and their `Content-Length` or chunked bodies into
/// [`IncomingRequest`]s, and encodes [`OutgoingResponse`]s with accurate
/// framing headers.
#[derive(Debug)]
pub struct HttpCodec {
    state: DecodeState,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    head_limit: SizeValidator,
    body_limit: SizeValidator,
    server_name: Option<String>,
}

impl HttpCodec {
    pub fn new(
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        max_header_size: usize,
        max_request_size: usize,
    ) -> Self {
        Self {
            state: DecodeState::Head,
            remote_addr,
            local_addr,
            head_limit: SizeValidator::new(max_header_size),
            body_limit: SizeValidator::new(max_request_size),
            server_name: None,
        }
    }

    /// Adds a `Server` header to every encoded response
    pub fn with_server_name(mut self, server_name: Option<String>) -> Self {
        self.server_name = server_name;
        self
    }

    fn decode_head(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<(RequestHead, BodyFraming)>, HttpError> {
        let mut header_buf = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut header_buf);

        let head_len = match req.parse(src) {
            Ok(httparse::Status::Complete(len)) => len,
            Ok(httparse::Status::Partial) => {
                self.head_limit
                    .validate_size(src.len())
                    .map_err(|e| HttpError::Malformed(format!("Request head too large: {e}")))?;
                return Ok(None);
            }
            Err(e) => {
                return Err(HttpError::Malformed(format!("Failed to parse request head: {e}")));
            }
        };
        self.head_limit
            .validate_size(head_len)
            .map_err(|e| HttpError::Malformed(format!("Request head too large: {e}")))?;

        let method = req
            .method
            .ok_or_else(|| HttpError::Malformed("Missing request method".to_string()))
            .and_then(|m| {
                Method::from_bytes(m.as_bytes())
                    .map_err(|_| HttpError::Malformed(format!("Invalid method: {m}")))
            })?;
        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            other => {
                return Err(HttpError::Malformed(format!("Unsupported HTTP version: {other:?}")));
            }
        };
        let target = req
            .path
            .ok_or_else(|| HttpError::Malformed("Missing request target".to_string()))?
            .to_string();

        let mut headers = Headers::new();
        for header in req.headers.iter() {
            headers.push(header.name, String::from_utf8_lossy(header.value).into_owned());
        }

        let framing = self.body_framing(&headers)?;
        src.advance(head_len);

        Ok(Some((
            RequestHead {
                method,
                version,
                target,
                headers,
            },
            framing,
        )))
    }

    fn body_framing(&self, headers: &Headers) -> Result<BodyFraming, HttpError> {
        let mut lengths = headers.get_all("content-length").peekable();
        let has_length = lengths.peek().is_some();

        if headers.get("transfer-encoding").is_some() {
            if has_length {
                return Err(HttpError::Malformed(
                    "Both Content-Length and Transfer-Encoding present".to_string(),
                ));
            }
            let codings: Vec<&str> = headers
                .get_all("transfer-encoding")
                .flat_map(|value| value.split(','))
                .map(str::trim)
                .filter(|coding| !coding.is_empty())
                .collect();
            return match codings.as_slice() {
                [coding] if coding.eq_ignore_ascii_case("chunked") => {
                    Ok(BodyFraming::Chunked(ChunkedBody::new()))
                }
                _ => Err(HttpError::Malformed(format!(
                    "Unsupported transfer encoding: {}",
                    codings.join(", ")
                ))),
            };
        }

        let mut length = None;
        for value in lengths {
            let parsed: usize = value
                .trim()
                .parse()
                .map_err(|_| HttpError::Malformed(format!("Invalid Content-Length: {value}")))?;
            if length.is_some_and(|existing| existing != parsed) {
                return Err(HttpError::Malformed("Conflicting Content-Length values".to_string()));
            }
            length = Some(parsed);
        }

        let length = length.unwrap_or(0);
        self.body_limit.validate_size(length).map_err(|_| HttpError::PayloadTooLarge {
            actual: length,
            max: self.body_limit.max_size(),
        })?;
        Ok(BodyFraming::Length(length))
    }

    fn finish(&self, head: RequestHead, body: Bytes) -> IncomingRequest {
        IncomingRequest::new(
            head.method,
            head.version,
            head.target,
            head.headers,
            body,
            self.remote_addr,
            self.local_addr,
        )
    }
}

impl Decoder for HttpCodec {
    type Item = IncomingRequest;
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match std::mem::replace(&mut self.state, DecodeState::Head) {
                DecodeState::Head => match self.decode_head(src)? {
                    Some((head, framing)) => self.state = DecodeState::Body(head, framing),
                    None => return Ok(None),
                },
                DecodeState::Body(head, BodyFraming::Length(length)) => {
                    if src.len() < length {
                        src.reserve(length - src.len());
                        self.state = DecodeState::Body(head, BodyFraming::Length(length));
                        return Ok(None);
                    }
                    let body = src.split_to(length).freeze();
                    return Ok(Some(self.finish(head, body)));
                }
                DecodeState::Body(head, BodyFraming::Chunked(mut chunked)) => {
                    let line_limit = self.head_limit.max_size();
                    if chunked.advance(src, &self.body_limit, line_limit)? {
                        let body = chunked.take();
                        return Ok(Some(self.finish(head, body)));
                    }
                    self.state = DecodeState::Body(head, BodyFraming::Chunked(chunked));
                    return Ok(None);
                }
            }
        }
    }
}

/// Converts a lowercase header name to its conventional capitalisation
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}

impl Encoder<OutgoingResponse> for HttpCodec {
    type Error = HttpError;

    fn encode(
        &mut self,
        response: OutgoingResponse,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("Unknown Status");
        let body = response.body();

        dst.reserve(256 + body.len());
        dst.put_slice(format!("HTTP/1.1 {} {}\r\n", status.as_str(), reason).as_bytes());
        for (name, value) in response.headers() {
            dst.put_slice(title_case(name.as_str()).as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        if let Some(server) = &self.server_name {
            dst.put_slice(format!("Server: {server}\r\n").as_bytes());
        }
        if !response.forbids_content_length() {
            dst.put_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(body);
        Ok(())
    }
}
