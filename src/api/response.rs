use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::GatewayError;

/// Last-resort body when the envelope itself cannot be serialized.
const FALLBACK_BODY: &str =
    r#"{"status_code":500,"status_txt":"COULD_NOT_FORMAT_RESULT","data":null}"#;

/// Uniform response envelope for every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status_code: u16,
    pub status_txt: String,
    pub data: Option<T>,
}

/// Renders an envelope, wrapped `callback(json)` when a JSONP callback was
/// requested.
pub fn reply<T: Serialize>(
    status: StatusCode,
    status_txt: &str,
    data: Option<T>,
    jsonp: Option<&str>,
) -> Response {
    let envelope = Envelope {
        status_code: status.as_u16(),
        status_txt: status_txt.to_string(),
        data,
    };
    let json = serde_json::to_string(&envelope).unwrap_or_else(|e| {
        tracing::error!("Could not format response: {}", e);
        FALLBACK_BODY.to_string()
    });

    match jsonp {
        Some(callback) => (
            status,
            [(header::CONTENT_TYPE, "application/javascript")],
            format!("{}({})\n", callback, json),
        )
            .into_response(),
        None => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            format!("{}\n", json),
        )
            .into_response(),
    }
}

pub fn failure(error: &GatewayError, jsonp: Option<&str>) -> Response {
    let (status, status_txt) = http_outcome(error);
    reply::<serde_json::Value>(status, &status_txt, None, jsonp)
}

/// The one client-visible outcome of each failure class.
pub fn http_outcome(error: &GatewayError) -> (StatusCode, String) {
    match error {
        GatewayError::MissingArgument(name) => (
            StatusCode::BAD_REQUEST,
            format!("MISSING_ARG_{}", name.to_uppercase()),
        ),
        GatewayError::BadArgument(name) => (
            StatusCode::BAD_REQUEST,
            format!("BAD_ARG_{}", name.to_uppercase()),
        ),
        GatewayError::ShardUnavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SHARD_UNAVAILABLE".to_string(),
        ),
        GatewayError::NotFound => (StatusCode::NOT_FOUND, "DISTRIBUTION_NOT_FOUND".to_string()),
        GatewayError::Backend(detail) => (StatusCode::BAD_GATEWAY, detail.clone()),
        GatewayError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT".to_string()),
        GatewayError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR".to_string(),
        ),
    }
}
