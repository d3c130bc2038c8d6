//! User-facing operations, shared by the CLI and any other front end.
//!
//! Every command takes the config by reference and a [`Progress`] handle; the
//! caller decides whether progress is displayed.
//!
//! [`Progress`]: crate::events::Progress

pub mod advanced;
pub mod futures;
pub mod spot;

use crate::error::{AppError, Result};
use crate::events::Progress;

/// Report a failed command on the progress channel and pass the error on
pub(crate) fn fail<T>(progress: &Progress, err: AppError) -> Result<T> {
    log::error!("{}", err);
    progress.error(&err.to_string());
    Err(err)
}

/// Run blocking work (PDF extraction, file parsing) off the async runtime
pub(crate) async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::Parse(format!("Background task failed: {}", e)))
}
