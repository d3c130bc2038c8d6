//! Futures PDF handling: upload into the user directory and standalone parsing.

use super::blocking;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::futures_pdf::{extract_futures_tokens, validate_pdf, FuturesTokenRecord};
use crate::scanner::{sanitize_user_id, user_dir};
use std::path::{Path, PathBuf};

/// Copy a screener PDF into the user directory as `{user}_futures.pdf`
pub fn upload_futures(config: &AppConfig, user: &str, source: &Path) -> Result<PathBuf> {
    let bytes = std::fs::read(source)
        .map_err(|e| AppError::Io(format!("Failed to read {}: {}", source.display(), e)))?;
    validate_pdf(&bytes).map_err(AppError::InvalidInput)?;

    let dir = user_dir(&config.data_dir, user)?;
    let target = dir.join(format!("{}_futures.pdf", sanitize_user_id(user)));
    std::fs::write(&target, &bytes)
        .map_err(|e| AppError::Io(format!("Failed to save {}: {}", target.display(), e)))?;

    log::info!(
        "Futures upload: stored {} ({} KB)",
        target.display(),
        bytes.len() / 1024
    );
    Ok(target)
}

/// Reconstruct the futures table of one PDF
pub async fn parse_futures(path: &Path) -> Result<Vec<FuturesTokenRecord>> {
    if !path.is_file() {
        return Err(AppError::InvalidInput(format!(
            "{} is not a file",
            path.display()
        )));
    }
    let path = path.to_path_buf();
    blocking(move || extract_futures_tokens(&path)).await
}
