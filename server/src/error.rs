use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use joblib::error::Error as JobError;
use thiserror::Error;

/// Everything a request can be rejected with. None of these leave a job behind.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing '{0}' parameter")]
    MissingParam(&'static str),
    #[error("Token wrong")]
    BadToken,
    #[error("job id format is wrong: {0:?}")]
    MalformedId(String),
    #[error(transparent)]
    Job(#[from] JobError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParam(_) | ApiError::MalformedId(_) => StatusCode::BAD_REQUEST,
            ApiError::BadToken => StatusCode::UNAUTHORIZED,
            ApiError::Job(err) => match err {
                JobError::InvalidName(_) => StatusCode::BAD_REQUEST,
                JobError::ArtifactNotFound(_) | JobError::NotFound(_) => StatusCode::NOT_FOUND,
                JobError::AlreadyKilled(_) => StatusCode::CONFLICT,
                JobError::AlreadyRegistered(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
