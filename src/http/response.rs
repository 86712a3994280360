//! Fixed responses of the health surface.
//!
//! # Responsibilities
//! - Build the healthy JSON body and the plain-text failure bodies
//! - Keep status codes and content types in one place

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Body of a successful health check: `{"status":"ok","redis":"running"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub redis: &'static str,
}

impl HealthBody {
    pub const fn healthy() -> Self {
        Self {
            status: "ok",
            redis: "running",
        }
    }
}

pub const UNHEALTHY_BODY: &str = "Redis is not healthy";
pub const NOT_FOUND_BODY: &str = "Not found";

/// 200 with the JSON health body.
pub fn healthy() -> Response {
    (StatusCode::OK, Json(HealthBody::healthy())).into_response()
}

/// 500 with a plain-text explanation.
pub fn unhealthy() -> Response {
    plain(StatusCode::INTERNAL_SERVER_ERROR, UNHEALTHY_BODY)
}

/// 404 for every path outside the health surface.
pub fn not_found() -> Response {
    plain(StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}

fn plain(status: StatusCode, body: &'static str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_body_serializes_exactly() {
        let json = serde_json::to_string(&HealthBody::healthy()).unwrap();
        assert_eq!(json, r#"{"status":"ok","redis":"running"}"#);
    }

    #[test]
    fn failure_responses_are_plain_text() {
        for (response, status) in [
            (unhealthy(), StatusCode::INTERNAL_SERVER_ERROR),
            (not_found(), StatusCode::NOT_FOUND),
        ] {
            assert_eq!(response.status(), status);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "text/plain; charset=utf-8"
            );
        }
    }
}
