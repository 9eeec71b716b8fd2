use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::validation::ValidationErrors;

/// Failures of the CRM client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrmError {
    /// No webhook URL configured.
    NotConfigured,
    /// Network failure, non-2xx response, unreadable body, or circuit open.
    RequestError(String),
    /// The endpoint answered with an application-level error payload.
    RemoteError(String),
}

impl fmt::Display for CrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrmError::NotConfigured => write!(f, "Bitrix integration not configured"),
            CrmError::RequestError(msg) => write!(f, "Bitrix request failed: {}", msg),
            CrmError::RemoteError(msg) => write!(f, "Bitrix error: {}", msg),
        }
    }
}

impl std::error::Error for CrmError {}

impl From<reqwest::Error> for CrmError {
    fn from(err: reqwest::Error) -> Self {
        CrmError::RequestError(err.to_string())
    }
}

/// Failures of the store and audit clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No database connection configured.
    NotInitialized,
    /// Constraint violated (e.g. NOT NULL on a required column).
    ConstraintViolation(String),
    /// Row-level security or grant refused the write.
    PermissionDenied(String),
    /// The store did not answer in time.
    Timeout,
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotInitialized => write!(f, "Store client not initialized"),
            StoreError::ConstraintViolation(msg) => write!(f, "Constraint violation: {}", msg),
            StoreError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            StoreError::Timeout => write!(f, "Store request timeout"),
            StoreError::Other(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    /// Maps Postgres SQLSTATE classes onto the store taxonomy.
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(code) if code.starts_with("23") => {
                    StoreError::ConstraintViolation(db_err.message().to_string())
                }
                Some("42501") => StoreError::PermissionDenied(db_err.message().to_string()),
                _ => StoreError::Other(err.to_string()),
            },
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            _ => StoreError::Other(err.to_string()),
        }
    }
}

/// User-visible failures of one submission. CRM and audit failures never
/// appear here; they are downgraded to logs and the audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Validation(ValidationErrors),
    StoreNotConfigured,
    StoreTimeout,
    StoreRejected(StoreError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Validation(errors) => write!(f, "Validation failed: {}", errors),
            SubmitError::StoreNotConfigured => write!(f, "Lead store not configured"),
            SubmitError::StoreTimeout => write!(f, "Lead store timed out"),
            SubmitError::StoreRejected(cause) => write!(f, "Lead store rejected write: {}", cause),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<StoreError> for SubmitError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotInitialized => SubmitError::StoreNotConfigured,
            StoreError::Timeout => SubmitError::StoreTimeout,
            other => SubmitError::StoreRejected(other),
        }
    }
}

/// Application-specific error types for the HTTP layer.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Internal server error.
    InternalError(String),
    /// Unauthorized access error.
    Unauthorized(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (**source).clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context`, turning I/O failures into an `AppError`.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::InternalError(e.to_string())),
            context: context.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FormField;

    #[test]
    fn test_store_error_maps_to_submit_category() {
        assert_eq!(
            SubmitError::from(StoreError::NotInitialized),
            SubmitError::StoreNotConfigured
        );
        assert_eq!(
            SubmitError::from(StoreError::Timeout),
            SubmitError::StoreTimeout
        );
        assert_eq!(
            SubmitError::from(StoreError::ConstraintViolation("contact_name".into())),
            SubmitError::StoreRejected(StoreError::ConstraintViolation("contact_name".into()))
        );
    }

    #[test]
    fn test_pool_timeout_is_store_timeout() {
        assert_eq!(StoreError::from(sqlx::Error::PoolTimedOut), StoreError::Timeout);
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Other(_)
        ));
    }

    #[test]
    fn test_display_messages() {
        let err = SubmitError::Validation(ValidationErrors {
            fields: vec![FormField::Email, FormField::Phone],
        });
        assert_eq!(
            err.to_string(),
            "Validation failed: Invalid fields: email, phone"
        );
        assert_eq!(
            CrmError::RemoteError("INVALID_CREDENTIALS".into()).to_string(),
            "Bitrix error: INVALID_CREDENTIALS"
        );
    }

    #[test]
    fn test_context_wraps_source() {
        let io_err = std::io::Error::other("disk full");
        let result: Result<(), AppError> = Err(io_err).context("Saving settings");
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Saving settings: Internal error: disk full"
        );
    }
}
