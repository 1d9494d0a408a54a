use super::config::HttpConfig;
use super::error::HttpError;
use super::request::IncomingRequest;
use super::response::OutgoingResponse;
use super::router::Router;
use super::synth::Entropy;
use futures_util::FutureExt;
use http::header::{ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Runs a request through the router and the selected synthesizer
///
/// Every outcome becomes a response: routing and parameter errors, panics
/// and requests that outlive `request_timeout` are all rendered as JSON
/// error bodies.
#[derive(Debug)]
pub struct Dispatcher {
    router: Router,
    entropy: Entropy,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            router: Router::new(config.max_delay),
            entropy: Entropy::from_os(),
            request_timeout: config.request_timeout,
        }
    }

    /// Replaces the random source, e.g. with [`Entropy::seeded`]
    pub fn with_entropy(mut self, entropy: Entropy) -> Self {
        self.entropy = entropy;
        self
    }

    pub async fn dispatch(&self, req: &IncomingRequest) -> OutgoingResponse {
        let started = Instant::now();

        let mut response = match self.synthesize(req).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    HttpError::Internal(detail) => {
                        error!(
                            method = %req.method(),
                            path = req.path(),
                            detail = %detail,
                            "Request failed"
                        );
                    }
                    HttpError::Timeout(limit) => {
                        warn!(
                            method = %req.method(),
                            path = req.path(),
                            limit_ms = limit.as_millis(),
                            "Request timed out"
                        );
                    }
                    other => {
                        warn!(
                            method = %req.method(),
                            path = req.path(),
                            error = %other,
                            "Request rejected"
                        );
                    }
                }
                e.into_response()
            }
        };
        apply_cors(req, &mut response);

        info!(
            method = %req.method(),
            path = req.path(),
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "Handled request"
        );
        response
    }

    async fn synthesize(&self, req: &IncomingRequest) -> Result<OutgoingResponse, HttpError> {
        let route = self.router.route(req.method(), req.path())?;
        let handler =
            AssertUnwindSafe(route.synthesizer.respond(req, &self.entropy)).catch_unwind();

        match timeout(self.request_timeout, handler).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(HttpError::Internal(panic_message(panic.as_ref()))),
            Err(_) => Err(HttpError::Timeout(self.request_timeout)),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

/// Lets browsers read responses for cross-origin requests, credentials included
fn apply_cors(req: &IncomingRequest, response: &mut OutgoingResponse) {
    let Some(origin) = req.header("origin") else {
        return;
    };
    let Ok(origin) = HeaderValue::from_str(origin) else {
        return;
    };
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Headers;
    use bytes::Bytes;
    use http::{Method, StatusCode, Version};

    fn request(method: Method, target: &str, headers: &[(&str, &str)]) -> IncomingRequest {
        let mut map = Headers::new();
        for (name, value) in headers {
            map.push(*name, *value);
        }
        IncomingRequest::new(
            method,
            Version::HTTP_11,
            target,
            map,
            Bytes::new(),
            "127.0.0.1:40000".parse().unwrap(),
            "127.0.0.1:8080".parse().unwrap(),
        )
    }

    fn dispatcher(config: HttpConfig) -> Dispatcher {
        Dispatcher::new(&config).with_entropy(Entropy::seeded(3))
    }

    fn body_json(response: &OutgoingResponse) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_errors_become_json_responses() {
        let dispatcher = dispatcher(HttpConfig::default());

        let missing = dispatcher.dispatch(&request(Method::GET, "/missing", &[])).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(&missing), serde_json::json!({ "error": "not found" }));

        let invalid = dispatcher.dispatch(&request(Method::GET, "/base64/%%%", &[])).await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let body = body_json(&invalid);
        assert_eq!(body["error"], "invalid parameter");
        assert!(body["detail"].is_string());
        assert_eq!(
            invalid.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_request_timeout_yields_internal_error() {
        let dispatcher = dispatcher(HttpConfig {
            max_delay: Duration::from_secs(5),
            request_timeout: Duration::from_millis(50),
            ..HttpConfig::default()
        });

        let started = Instant::now();
        let response = dispatcher.dispatch(&request(Method::GET, "/delay/5", &[])).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(&response), serde_json::json!({ "error": "internal error" }));

        // Timeouts are reported apart from handler faults.
        let outcome = dispatcher.synthesize(&request(Method::GET, "/delay/5", &[])).await;
        assert!(matches!(
            outcome,
            Err(HttpError::Timeout(limit)) if limit == Duration::from_millis(50)
        ));
    }

    #[tokio::test]
    async fn test_cors_headers_follow_origin() {
        let dispatcher = dispatcher(HttpConfig::default());

        let response = dispatcher
            .dispatch(&request(Method::GET, "/get", &[("Origin", "https://app.example")]))
            .await;
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example"
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );

        let response = dispatcher.dispatch(&request(Method::GET, "/get", &[])).await;
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "handler panicked: boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "handler panicked: bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "handler panicked");
    }
}
