use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const APPLICATION_XML: &str = "application/xml";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A synthesized response, owned by the runtime until it has been written
///
/// Every constructor sets `Content-Type` to match the body encoding. Framing
/// headers (`Content-Length`, `Connection`) are added by the codec at write
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl OutgoingResponse {
    fn with_content_type(status: StatusCode, content_type: &'static str, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Serializes `value` as a UTF-8 JSON body
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::with_content_type(status, APPLICATION_JSON, Bytes::from(body)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON response");
                Self::with_content_type(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    APPLICATION_JSON,
                    Bytes::from_static(br#"{"error":"internal error"}"#),
                )
            }
        }
    }

    pub fn html(body: &'static str) -> Self {
        Self::with_content_type(StatusCode::OK, TEXT_HTML, Bytes::from_static(body.as_bytes()))
    }

    pub fn xml(body: &'static str) -> Self {
        Self::with_content_type(
            StatusCode::OK,
            APPLICATION_XML,
            Bytes::from_static(body.as_bytes()),
        )
    }

    pub fn text(body: impl Into<Bytes>) -> Self {
        Self::with_content_type(StatusCode::OK, TEXT_PLAIN, body.into())
    }

    pub fn binary(body: impl Into<Bytes>) -> Self {
        Self::with_content_type(StatusCode::OK, OCTET_STREAM, body.into())
    }

    /// Drops the body while keeping status and headers
    pub fn without_body(mut self) -> Self {
        self.body = Bytes::new();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether HTTP forbids a `Content-Length` header for this status
    pub fn forbids_content_length(&self) -> bool {
        self.status.is_informational() || self.status == StatusCode::NO_CONTENT
    }
}
