pub mod file_commands;
pub mod organize_commands;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Runs filesystem work off the async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Io(std::io::Error::other(e.to_string())))?
}

/// Parses a JSON request body; an empty body reads as `{}`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_str("{}")?);
    }
    Ok(serde_json::from_slice(body)?)
}
