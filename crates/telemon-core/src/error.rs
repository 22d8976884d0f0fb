//! Shared error type across telemon crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Metric id/kind not present in the store.
    NotFound,
    /// Kind outside {counter, gauge}.
    BadType,
    /// Required delta/value missing for the kind.
    NullAttr,
    /// Value failed to parse.
    BadAttrValue,
    /// Signature mismatch.
    AuthFailed,
    /// Untrusted origin.
    AccessDenied,
    /// Unreadable request.
    BadRequest,
    /// Backend health probe failed.
    Unavailable,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::BadType => "BAD_TYPE",
            ClientCode::NullAttr => "NULL_ATTR",
            ClientCode::BadAttrValue => "BAD_ATTR_VALUE",
            ClientCode::AuthFailed => "AUTH_FAILED",
            ClientCode::AccessDenied => "ACCESS_DENIED",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status code this error class maps to.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::NotFound => 404,
            ClientCode::BadType => 501,
            ClientCode::NullAttr
            | ClientCode::BadAttrValue
            | ClientCode::AuthFailed
            | ClientCode::BadRequest => 400,
            ClientCode::AccessDenied => 403,
            ClientCode::Unavailable | ClientCode::Internal => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core, store, server and agent.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric not found: {0}")]
    NotFound(String),
    #[error("metric has unsupported type: {0}")]
    BadType(String),
    #[error("metric has not set attribute: {0}")]
    NullAttr(String),
    #[error("bad attribute value: {0}")]
    BadAttrValue(String),
    #[error("auth failed: {0}")]
    AuthFailed(String),
    #[error("{0}")]
    AccessDenied(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MetricsError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            MetricsError::NotFound(_) => ClientCode::NotFound,
            MetricsError::BadType(_) => ClientCode::BadType,
            MetricsError::NullAttr(_) => ClientCode::NullAttr,
            MetricsError::BadAttrValue(_) => ClientCode::BadAttrValue,
            MetricsError::AuthFailed(_) => ClientCode::AuthFailed,
            MetricsError::AccessDenied(_) => ClientCode::AccessDenied,
            MetricsError::BadRequest(_) => ClientCode::BadRequest,
            MetricsError::Unavailable(_) => ClientCode::Unavailable,
            MetricsError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Whether the caller (not the server) is at fault.
    pub fn is_client_error(&self) -> bool {
        let status = self.client_code().http_status();
        (400..500).contains(&status) || status == 501
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(MetricsError::NotFound("x".into()).client_code().http_status(), 404);
        assert_eq!(MetricsError::BadType("x".into()).client_code().http_status(), 501);
        assert_eq!(MetricsError::NullAttr("x".into()).client_code().http_status(), 400);
        assert_eq!(MetricsError::AccessDenied("x".into()).client_code().http_status(), 403);
        assert_eq!(MetricsError::Unavailable("x".into()).client_code().http_status(), 500);
        assert!(MetricsError::AuthFailed("x".into()).is_client_error());
        assert!(!MetricsError::Internal("x".into()).is_client_error());
    }

    #[test]
    fn access_denied_renders_bare_message() {
        let e = MetricsError::AccessDenied("Access denied".into());
        assert_eq!(e.to_string(), "Access denied");
    }
}
