//! API utility functions

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::api::error::ApiError;

/// Reads the whole request body, failing once it grows past `max_size`
pub async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Bytes, ApiError> {
    match Limited::new(body, max_size).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::PayloadTooLarge(max_size))
        }
        Err(err) => Err(ApiError::Internal(err.to_string())),
    }
}
