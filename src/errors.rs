use std::fmt;

use actix_web::http::StatusCode;

/// Crate-wide error type.
///
/// `EnrichmentDegraded` intentionally has no variant here: enrichment
/// failures are converted to default values inside the enrichment pipeline
/// and logged, they never propagate to callers.
#[derive(Debug, Clone)]
pub enum LinkpulseError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    NotFound(String),
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },
    Validation(String),
    Serialization(String),
}

impl LinkpulseError {
    pub fn code(&self) -> &'static str {
        match self {
            LinkpulseError::DatabaseConfig(_) => "E001",
            LinkpulseError::DatabaseConnection(_) => "E002",
            LinkpulseError::DatabaseOperation(_) => "E003",
            LinkpulseError::NotFound(_) => "E004",
            LinkpulseError::RateLimited { .. } => "E005",
            LinkpulseError::Validation(_) => "E006",
            LinkpulseError::Serialization(_) => "E007",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            LinkpulseError::DatabaseConfig(_) => "Database Configuration Error",
            LinkpulseError::DatabaseConnection(_) => "Database Connection Error",
            LinkpulseError::DatabaseOperation(_) => "Database Operation Error",
            LinkpulseError::NotFound(_) => "Resource Not Found",
            LinkpulseError::RateLimited { .. } => "Rate Limited",
            LinkpulseError::Validation(_) => "Validation Error",
            LinkpulseError::Serialization(_) => "Serialization Error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LinkpulseError::DatabaseConfig(msg) => msg,
            LinkpulseError::DatabaseConnection(msg) => msg,
            LinkpulseError::DatabaseOperation(msg) => msg,
            LinkpulseError::NotFound(msg) => msg,
            LinkpulseError::RateLimited { message, .. } => message,
            LinkpulseError::Validation(msg) => msg,
            LinkpulseError::Serialization(msg) => msg,
        }
    }

    /// HTTP status the API layer maps this error to.
    ///
    /// Persistence failures are the only class surfaced as 500; callers of
    /// the ingestion API treat tracking as fire-and-forget and complete the
    /// user-visible redirect regardless.
    pub fn http_status(&self) -> StatusCode {
        match self {
            LinkpulseError::NotFound(_) => StatusCode::NOT_FOUND,
            LinkpulseError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            LinkpulseError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for LinkpulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for LinkpulseError {}

impl LinkpulseError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DatabaseOperation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::NotFound(msg.into())
    }

    pub fn rate_limited<T: Into<String>>(msg: T, retry_after_secs: u64) -> Self {
        LinkpulseError::RateLimited {
            message: msg.into(),
            retry_after_secs,
        }
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::Validation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::Serialization(msg.into())
    }
}

impl From<sea_orm::DbErr> for LinkpulseError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkpulseError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for LinkpulseError {
    fn from(err: std::io::Error) -> Self {
        LinkpulseError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for LinkpulseError {
    fn from(err: serde_json::Error) -> Self {
        LinkpulseError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkpulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(LinkpulseError::not_found("x").code(), "E004");
        assert_eq!(LinkpulseError::rate_limited("x", 30).code(), "E005");
        assert_eq!(LinkpulseError::validation("x").code(), "E006");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            LinkpulseError::not_found("missing").http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LinkpulseError::rate_limited("slow down", 12).http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            LinkpulseError::database_operation("boom").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_contains_type_and_message() {
        let err = LinkpulseError::not_found("link does not exist: abc");
        let s = err.to_string();
        assert!(s.contains("Resource Not Found"));
        assert!(s.contains("abc"));
    }
}
