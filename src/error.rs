use crate::model::response::ErrorResponse;
use crate::repository::gateway::GatewayError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("betting deadline for round {round_id} has passed")]
    DeadlinePassed { round_id: i32 },
    #[error("{0}")]
    NotFound(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<GatewayError> for PoolError {
    fn from(err: GatewayError) -> Self {
        PoolError::Persistence(err.to_string())
    }
}

impl ResponseError for PoolError {
    fn status_code(&self) -> StatusCode {
        match self {
            PoolError::Validation(_) => StatusCode::BAD_REQUEST,
            PoolError::Authentication(_) => StatusCode::UNAUTHORIZED,
            PoolError::Forbidden(_) | PoolError::DeadlinePassed { .. } => StatusCode::FORBIDDEN,
            PoolError::NotFound(_) => StatusCode::NOT_FOUND,
            PoolError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // The underlying driver message stays in the logs.
            PoolError::Persistence(detail) => {
                error!("request failed with persistence error: {detail}");
                "An error occurred".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse::failed(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        assert_eq!(
            PoolError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PoolError::Authentication("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            PoolError::DeadlinePassed { round_id: 3 }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            PoolError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PoolError::Persistence("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn gateway_failures_keep_their_message() {
        let err: PoolError = GatewayError::Unavailable("connection reset".into()).into();
        assert_eq!(
            err,
            PoolError::Persistence("backend unavailable: connection reset".into())
        );
    }
}
