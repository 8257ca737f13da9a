use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use quill::auth::{AuthError, Rejection, TokenError};
use serde::Serialize;
use tracing::{error, warn};

/// Every failure a handler can return, as the client sees it.
///
/// Credential problems collapse into `Unauthorized` whatever the cause, and
/// store or internal details are logged here and never sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation(String),
    StoreUnavailable,
    Internal,
}

/// Seconds a client should wait before retrying a 503.
const RETRY_AFTER_SECS: &str = "5";

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound => "not_found",
            ApiError::Validation(_) => "validation_failed",
            ApiError::StoreUnavailable => "store_unavailable",
            ApiError::Internal => "internal",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Authentication required".to_string(),
            ApiError::Forbidden => "Insufficient permissions".to_string(),
            ApiError::NotFound => "Resource not found".to_string(),
            ApiError::Validation(reason) => reason.clone(),
            ApiError::StoreUnavailable => "Storage is temporarily unavailable".to_string(),
            ApiError::Internal => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.code(),
            message: self.message(),
        });

        match self {
            ApiError::Unauthorized => (
                self.status(),
                [(header::WWW_AUTHENTICATE, "Bearer realm=\"quill\"")],
                body,
            )
                .into_response(),
            ApiError::StoreUnavailable => (
                self.status(),
                [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
                body,
            )
                .into_response(),
            _ => (self.status(), body).into_response(),
        }
    }
}

impl From<shared::Error> for ApiError {
    fn from(err: shared::Error) -> Self {
        match err {
            shared::Error::NotFound => ApiError::NotFound,
            shared::Error::Validation(reason) => ApiError::Validation(reason),
            shared::Error::StoreUnavailable(reason) => {
                warn!("Store unavailable: {}", reason);
                ApiError::StoreUnavailable
            }
            shared::Error::Internal(reason) => {
                error!("Internal error: {}", reason);
                ApiError::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized,
            AuthError::PermissionDenied => ApiError::Forbidden,
            AuthError::UserAlreadyExists => {
                ApiError::Validation("username is already taken".to_string())
            }
            AuthError::WeakPassword => ApiError::Validation(
                "password needs at least 8 characters with a letter and a digit".to_string(),
            ),
            AuthError::StorageError(reason) => {
                warn!("User store unavailable: {}", reason);
                ApiError::StoreUnavailable
            }
            other => {
                error!("Auth failure: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<Rejection> for ApiError {
    fn from(_: Rejection) -> Self {
        ApiError::Unauthorized
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidToken | TokenError::ExpiredToken => ApiError::Unauthorized,
            TokenError::Signing(reason) => {
                error!("Failed to sign token: {}", reason);
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_indistinguishable() {
        let no_credential = ApiError::from(Rejection::NoCredential);
        let invalid = ApiError::from(Rejection::InvalidCredential);
        let expired = ApiError::from(TokenError::ExpiredToken);

        assert_eq!(no_credential, invalid);
        assert_eq!(invalid, expired);
        assert_eq!(no_credential.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_store_errors_map_to_stable_codes() {
        let unavailable = ApiError::from(shared::Error::StoreUnavailable("disk".into()));
        let internal = ApiError::from(shared::Error::Internal("boom".into()));

        assert_eq!(unavailable.code(), "store_unavailable");
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(internal.code(), "internal");
        assert_eq!(internal.message(), "Internal server error");
    }

    #[test]
    fn test_unavailable_store_asks_client_to_retry() {
        let response = ApiError::from(shared::Error::StoreUnavailable("disk".into())).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER_SECS);

        let not_found = ApiError::NotFound.into_response();
        assert!(not_found.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(ApiError::from(AuthError::PermissionDenied), ApiError::Forbidden);
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials),
            ApiError::Unauthorized
        );
        assert!(matches!(
            ApiError::from(AuthError::WeakPassword),
            ApiError::Validation(_)
        ));
    }
}
