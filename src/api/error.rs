use axum::{
    http::{StatusCode, header},
    response::IntoResponse,
};
use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Error: key '{0}' does not exist")]
    MissingParameter(&'static str),
    #[error("Wrong query")]
    WrongQuery,
    #[error("payload too large: limit is {0} bytes")]
    PayloadTooLarge(usize),
    #[error("invalid filename: {0}")]
    InvalidFilename(String),
    #[error("source fetch failed for {url}: {source}")]
    SourceFetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_) | ApiError::WrongQuery | ApiError::InvalidFilename(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::SourceFetch { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Plain-text body; the platform does not understand structured errors
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = match &self {
            // Do not echo upstream error details back to the caller
            ApiError::SourceFetch { .. } => "Source fetch failed".to_string(),
            other => other.to_string(),
        };

        (
            status,
            [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())],
            body,
        )
            .into_response()
    }
}
