use crate::http::response::OutgoingResponse;
use http::StatusCode;
use serde_json::json;

/// Answers with the requested status, which is never treated as a failure
///
/// 1xx, 204 and 304 responses cannot carry a body, so only their headers
/// are sent.
pub(super) fn status_code(code: StatusCode) -> OutgoingResponse {
    let message = code.canonical_reason().unwrap_or("Unknown Status");
    let response =
        OutgoingResponse::json(code, &json!({ "code": code.as_u16(), "message": message }));

    if code.is_informational()
        || code == StatusCode::NO_CONTENT
        || code == StatusCode::NOT_MODIFIED
    {
        response.without_body()
    } else {
        response
    }
}
