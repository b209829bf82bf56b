//! Shared response envelope and Result -> HttpResponse conversion.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;

use crate::errors::LinkpulseError;

/// Uniform JSON envelope: `code` 0 on success, the HTTP status otherwise.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: i32,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code,
            message: message.into(),
            data,
        })
}

pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, 0, "OK", Some(data))
}

/// Map a [`LinkpulseError`] to its HTTP form. Rate limit rejections carry a
/// `Retry-After` header so well-behaved clients can back off precisely.
pub fn error_response(err: &LinkpulseError) -> HttpResponse {
    let status = err.http_status();
    let mut builder = HttpResponse::build(status);
    builder.append_header(("Content-Type", "application/json; charset=utf-8"));

    if let LinkpulseError::RateLimited {
        retry_after_secs, ..
    } = err
    {
        builder.append_header(("Retry-After", retry_after_secs.to_string()));
    }

    builder.json(ApiResponse::<()> {
        code: status.as_u16() as i32,
        message: err.message().to_string(),
        data: None,
    })
}

pub fn api_result<T: Serialize>(result: crate::errors::Result<T>) -> HttpResponse {
    match result {
        Ok(data) => success_response(data),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response_is_200() {
        let response = success_response("data");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err = LinkpulseError::rate_limited("slow down", 42);
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok()),
            Some("42")
        );
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = LinkpulseError::not_found("missing link");
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
