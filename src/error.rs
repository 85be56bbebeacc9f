use axum::{
    Json,
    response::{IntoResponse, Response},
};
use hyper::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{statement_parsing::ParseError, storage::StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        return match self {
            ApiError::Storage(_) | ApiError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("{:#?}", self);

        let status_code = self.status_code();
        let error_message = match self {
            ApiError::Storage(err) => err.public_message().to_string(),
            ApiError::Parse(_) => "Failed to parse CSV".to_string(),
            ApiError::NotFound(msg) => msg,
            ApiError::BadRequest(msg) => msg,
        };

        return (status_code, Json(ErrorBody { error: error_message })).into_response();
    }
}
