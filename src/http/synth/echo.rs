use crate::http::request::{IncomingRequest, QueryParams};
use crate::http::response::OutgoingResponse;
use http::StatusCode;
use serde_json::{Map, Value, json};

/// Fields shared by every echo body
pub(super) fn request_summary(req: &IncomingRequest) -> Map<String, Value> {
    let mut summary = Map::new();
    summary.insert("args".to_string(), req.query().to_json());
    summary.insert("headers".to_string(), req.headers().to_json());
    summary.insert("method".to_string(), Value::String(req.method().to_string()));
    summary.insert("origin".to_string(), Value::String(req.origin()));
    summary.insert("url".to_string(), Value::String(req.url()));
    summary
}

pub(super) fn echo_get(req: &IncomingRequest) -> OutgoingResponse {
    OutgoingResponse::json(StatusCode::OK, &request_summary(req))
}

pub(super) fn echo_body(req: &IncomingRequest) -> OutgoingResponse {
    let mut summary = request_summary(req);
    let body = req.body();

    let data = String::from_utf8_lossy(body).into_owned();
    let parsed = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
    let form = match req.header("content-type") {
        Some(ct) if ct.to_ascii_lowercase().starts_with("application/x-www-form-urlencoded") => {
            QueryParams::parse(body).to_json()
        }
        _ => Value::Object(Map::new()),
    };

    summary.insert("data".to_string(), Value::String(data));
    summary.insert("form".to_string(), form);
    summary.insert("json".to_string(), parsed);
    OutgoingResponse::json(StatusCode::OK, &summary)
}

pub(super) fn headers(req: &IncomingRequest) -> OutgoingResponse {
    OutgoingResponse::json(StatusCode::OK, &json!({ "headers": req.headers().to_json() }))
}

pub(super) fn ip(req: &IncomingRequest) -> OutgoingResponse {
    let origin = req
        .header("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| req.origin());
    OutgoingResponse::json(StatusCode::OK, &json!({ "origin": origin }))
}

pub(super) fn user_agent(req: &IncomingRequest) -> OutgoingResponse {
    let agent = req.header("user-agent").unwrap_or_default();
    OutgoingResponse::json(StatusCode::OK, &json!({ "user-agent": agent }))
}
