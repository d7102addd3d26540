//! HTTP response building helpers
//!
//! Every body follows one envelope: `{"success": true, "data": ...}` on
//! success, `{"success": false, "message": "..."}` on failure.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::SanghaError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(body).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize response body");
        br#"{"success":false,"message":"Internal server error"}"#.to_vec()
    });

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// 200 OK with `data`
pub fn ok<T: Serialize>(data: &T) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "data": data }),
    )
}

/// 201 Created with `data`
pub fn created<T: Serialize>(data: &T) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::CREATED,
        &serde_json::json!({ "success": true, "data": data }),
    )
}

/// 200 OK carrying only a confirmation message
pub fn message(text: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": text }),
    )
}

/// Failure envelope with an explicit status
pub fn failure(status: StatusCode, text: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &serde_json::json!({ "success": false, "message": text }),
    )
}

/// Convert a SanghaError to an appropriate HTTP response.
///
/// Internal failures are logged in full and reported generically.
pub fn error_response(err: SanghaError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if err.is_internal() {
        error!(error = %err, "Request failed");
    } else {
        warn!(status = status.as_u16(), error = %err, "Request rejected");
    }
    failure(status, &err.public_message())
}
