//! Per-user working directories and input discovery.

use crate::error::{AppError, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Inputs found for an advanced analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputFiles {
    pub spot: Option<PathBuf>,
    pub futures: Option<PathBuf>,
}

impl InputFiles {
    /// Both files, or the "required files not found" error naming what is missing
    pub fn require_both(self) -> Result<(PathBuf, PathBuf)> {
        match (self.spot, self.futures) {
            (Some(spot), Some(futures)) => Ok((spot, futures)),
            (spot, futures) => {
                let mut missing = Vec::new();
                if spot.is_none() {
                    missing.push("spot report (.csv/.html with 'spot' in the name)");
                }
                if futures.is_none() {
                    missing.push("futures PDF (.pdf with 'futures' in the name)");
                }
                Err(AppError::MissingInput(format!(
                    "{} from today",
                    missing.join(" and ")
                )))
            }
        }
    }
}

/// Keep only characters that are safe in a directory name
pub fn sanitize_user_id(user: &str) -> String {
    let sanitized: String = user
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect();

    // No hidden directories and no `..`
    let sanitized = sanitized.trim_start_matches('.').to_string();
    if sanitized.is_empty() {
        "default".to_string()
    } else {
        sanitized
    }
}

/// `data_dir/<sanitized user>`, created on demand
pub fn user_dir(data_dir: &Path, user: &str) -> Result<PathBuf> {
    let dir = data_dir.join(sanitize_user_id(user));
    std::fs::create_dir_all(&dir)
        .map_err(|e| AppError::Io(format!("Failed to create {}: {}", dir.display(), e)))?;
    Ok(dir)
}

fn local_date(time: SystemTime) -> NaiveDate {
    DateTime::<Local>::from(time).date_naive()
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn lower_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn lower_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Files in `dir` modified on `today`, newest first
fn files_modified_on(dir: &Path, today: NaiveDate) -> Result<Vec<PathBuf>> {
    let mut files: Vec<(SystemTime, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| modified(&path).map(|time| (time, path)))
        .filter(|(time, _)| local_date(*time) == today)
        .collect();

    files.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Find today's spot table and futures PDF in `dir`, relative to `today`
pub fn find_input_files_on(dir: &Path, today: NaiveDate) -> Result<InputFiles> {
    if !dir.is_dir() {
        return Ok(InputFiles::default());
    }

    let files = files_modified_on(dir, today)?;

    let futures = files
        .iter()
        .find(|p| lower_extension(p) == "pdf" && lower_name(p).contains("futures"))
        .cloned();
    let spot = files
        .iter()
        .find(|p| {
            matches!(lower_extension(p).as_str(), "csv" | "html" | "htm")
                && lower_name(p).contains("spot")
        })
        .cloned();

    log::debug!(
        "Scanner: {} files from today in {}, spot={:?}, futures={:?}",
        files.len(),
        dir.display(),
        spot,
        futures
    );
    Ok(InputFiles { spot, futures })
}

pub fn find_input_files(dir: &Path) -> Result<InputFiles> {
    find_input_files_on(dir, Local::now().date_naive())
}

/// Delete consumed inputs that were modified today. Failures are logged only.
pub fn cleanup_inputs(paths: &[&Path]) -> usize {
    let today = Local::now().date_naive();
    let mut removed = 0;

    for path in paths {
        let is_today = modified(path).map(local_date) == Some(today);
        if !is_today {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => {
                log::info!("Cleanup: removed {}", path.display());
                removed += 1;
            }
            Err(e) => log::warn!("Cleanup: could not remove {}: {}", path.display(), e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_sanitize_user_id() {
        assert_eq!(sanitize_user_id("alice"), "alice");
        assert_eq!(sanitize_user_id("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_user_id(".hidden"), "hidden");
        assert_eq!(sanitize_user_id("  "), "default");
        assert_eq!(sanitize_user_id("bob smith"), "bobsmith");
    }

    #[test]
    fn test_user_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let user = user_dir(dir.path(), "alice").unwrap();
        assert!(user.is_dir());
        assert_eq!(user, dir.path().join("alice"));
    }

    #[test]
    fn test_finds_todays_inputs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "spot_old.csv");
        sleep(Duration::from_millis(20));
        let spot = touch(dir.path(), "alice_Volumed_Spot_Tokens_Jan-02-26.html");
        let futures = touch(dir.path(), "alice_futures.pdf");
        touch(dir.path(), "futures.csv");

        let found = find_input_files(dir.path()).unwrap();
        assert_eq!(found.spot, Some(spot));
        assert_eq!(found.futures, Some(futures));
    }

    #[test]
    fn test_yesterdays_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "alice_spot.csv");
        touch(dir.path(), "alice_futures.pdf");

        let tomorrow = Local::now().date_naive().succ_opt().unwrap();
        let found = find_input_files_on(dir.path(), tomorrow).unwrap();
        assert_eq!(found, InputFiles::default());
    }

    #[test]
    fn test_missing_inputs_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "alice_spot.csv");

        let found = find_input_files(dir.path()).unwrap();
        let err = found.require_both().unwrap_err();
        assert!(matches!(err, AppError::MissingInput(_)));
        assert!(err.to_string().contains("futures PDF"));
        assert!(!err.to_string().contains("spot report"));
    }

    #[test]
    fn test_missing_directory_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let found = find_input_files(&dir.path().join("nobody")).unwrap();
        assert_eq!(found, InputFiles::default());
    }

    #[test]
    fn test_cleanup_removes_todays_files() {
        let dir = tempfile::tempdir().unwrap();
        let spot = touch(dir.path(), "alice_spot.csv");
        let missing = dir.path().join("gone.pdf");

        assert_eq!(cleanup_inputs(&[spot.as_path(), missing.as_path()]), 1);
        assert!(!spot.exists());
    }
}
