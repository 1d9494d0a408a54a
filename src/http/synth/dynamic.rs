use super::Entropy;
use super::echo::request_summary;
use crate::http::error::HttpError;
use crate::http::request::IncomingRequest;
use crate::http::response::OutgoingResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

pub(super) async fn delayed_echo(
    req: &IncomingRequest,
    requested: f64,
    delay: Duration,
) -> OutgoingResponse {
    tokio::time::sleep(delay).await;

    let mut summary = request_summary(req);
    summary.insert("delay".to_string(), json!(delay.as_secs_f64()));
    summary.insert("requested".to_string(), json!(requested));
    OutgoingResponse::json(StatusCode::OK, &Value::Object(summary))
}

pub(super) fn uuid(entropy: &Entropy) -> OutgoingResponse {
    let uuid = entropy.uuid_v4();
    OutgoingResponse::json(StatusCode::OK, &json!({ "uuid": uuid.to_string() }))
}

pub(super) fn base64_decode(payload: &str) -> Result<OutgoingResponse, HttpError> {
    let decoded = STANDARD
        .decode(payload)
        .map_err(|e| HttpError::InvalidParameter(format!("invalid base64 payload: {e}")))?;
    Ok(OutgoingResponse::text(decoded))
}

#[derive(Debug, Deserialize)]
struct EncodeRequest {
    #[serde(default)]
    text: String,
}

pub(super) fn base64_encode(req: &IncomingRequest) -> Result<OutgoingResponse, HttpError> {
    let request: EncodeRequest = serde_json::from_slice(req.body()).map_err(|e| {
        HttpError::InvalidParameter(format!("body must be a JSON object with a 'text' field: {e}"))
    })?;
    if request.text.is_empty() {
        return Err(HttpError::InvalidParameter("'text' field is required".to_string()));
    }

    let encoded = STANDARD.encode(request.text.as_bytes());
    Ok(OutgoingResponse::json(
        StatusCode::OK,
        &json!({ "encoded": encoded, "original": request.text }),
    ))
}

pub(super) fn random_bytes(n: usize, entropy: &Entropy) -> OutgoingResponse {
    let mut bytes = vec![0u8; n];
    entropy.fill(&mut bytes);
    OutgoingResponse::binary(bytes)
}
