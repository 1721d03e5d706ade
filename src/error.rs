use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    domain::{
        checkout::CheckoutError, handshake::HandshakeError, order_status::TransitionError,
        review_flow::ReviewError, submission::SubmissionError,
    },
    media::MediaError,
    response::{ApiResponse, Meta},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict {0}")]
    Conflict(String),

    #[error("Payment session expired, please return to checkout")]
    SessionExpired,

    #[error("Integrity error {0}")]
    Integrity(String),

    #[error("Media host error")]
    Media(#[from] MediaError),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::SessionExpired => StatusCode::GONE,
            AppError::Integrity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Media(_) => StatusCode::BAD_GATEWAY,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<HandshakeError> for AppError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Expired => AppError::SessionExpired,
            HandshakeError::ReferenceMismatch { .. } => AppError::Integrity(err.to_string()),
            HandshakeError::MalformedRedirect(_) => AppError::BadRequest(err.to_string()),
            HandshakeError::NotPending(_) => AppError::Conflict(err.to_string()),
            HandshakeError::UnknownState(_) => AppError::Internal(anyhow::anyhow!(err)),
        }
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::AlreadyCompleted | ReviewError::OutOfOrder { .. } => {
                AppError::Conflict(err.to_string())
            }
            ReviewError::UnresolvableProduct { .. } => AppError::Integrity(err.to_string()),
            ReviewError::NotDelivered(_) | ReviewError::InvalidRating(_) => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotPermitted { .. } => AppError::Forbidden,
            TransitionError::Unknown(_) | TransitionError::Illegal { .. } => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_errors_map_to_distinct_statuses() {
        assert_eq!(
            AppError::from(HandshakeError::Expired).status(),
            StatusCode::GONE
        );
        assert_eq!(
            AppError::from(HandshakeError::ReferenceMismatch {
                expected: "A".into(),
                received: "B".into()
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        assert_eq!(
            AppError::from(CheckoutError::MissingField("shipping_address")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ReviewError::InvalidRating(9)).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
