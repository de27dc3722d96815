use log::error;
use rouille::Response;
use serde::Serialize;

use crate::storage::error::StoreError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    PayloadTooLarge(String),
    Unavailable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    message: &'a str,
    status: u16,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => ApiError::BadRequest(e.to_string()),

            StoreError::NotFound { .. } => ApiError::NotFound("Track not found".into()),

            StoreError::StorageUnavailable(e) => ApiError::Unavailable(e.to_string()),

            e @ (StoreError::CorruptStore { .. }
            | StoreError::RenderFailure(_)
            | StoreError::Fs(_)
            | StoreError::Serialization(_)
            | StoreError::Internal(_)) => {
                error!("request failed: {e}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::Unavailable(_) => 503,
            ApiError::Internal(_) => 500,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    /// `{"error": {"message": ..., "status": ...}}` with the matching status code
    pub fn into_response(self) -> Response {
        let status = self.status_code();
        Response::json(&ErrorBody {
            error: ErrorDetail {
                message: self.message(),
                status,
            },
        })
        .with_status_code(status)
    }
}
