//! File-backed persistence: persona, weekday themes, post history, last post.
//!
//! Every file is plain UTF-8 text. Missing inputs are not errors: they
//! degrade to empty/default values with a warning so a post can still go out.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Weekday};
use tracing::{debug, warn};

use crate::config::PathsConfig;

/// Separator line written after every history entry.
pub const HISTORY_DELIMITER_WIDTH: usize = 40;

/// I/O failure on a store file.
#[derive(Debug, thiserror::Error)]
#[error("{action} {}: {source}", .path.display())]
pub struct StoreError {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

impl StoreError {
    fn new(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The file the failed operation touched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Generic text helpers
// ---------------------------------------------------------------------------

/// Read a file, returning `None` when it does not exist.
///
/// # Errors
///
/// Returns [`StoreError`] for any failure other than not-found.
pub fn read_text(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::new("failed to read", path, e)),
    }
}

/// Read a file, falling back to an empty string (with a warning) when it
/// is missing or unreadable.
pub fn read_text_or_default(path: &Path, what: &str) -> String {
    match read_text(path) {
        Ok(Some(text)) => text,
        Ok(None) => {
            warn!(path = %path.display(), "{what} file not found");
            String::new()
        }
        Err(e) => {
            warn!(error = %e, "{what} file unreadable");
            String::new()
        }
    }
}

/// Append to a file, creating it and its parent directory as needed.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be opened or written.
pub fn append_text(path: &Path, text: &str) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::new("failed to open", path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| StoreError::new("failed to append to", path, e))
}

/// Replace a file's contents, creating its parent directory as needed.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be written.
pub fn write_text(path: &Path, text: &str) -> Result<(), StoreError> {
    ensure_parent(path)?;
    std::fs::write(path, text).map_err(|e| StoreError::new("failed to write", path, e))
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::new("failed to create directory for", path, e)),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Post store
// ---------------------------------------------------------------------------

/// The four files behind a posting persona.
#[derive(Debug, Clone)]
pub struct PostStore {
    paths: PathsConfig,
}

impl PostStore {
    /// Create a store over the configured paths. Touches nothing on disk.
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    /// Configured file locations.
    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    /// Persona text for the system prompt; empty when the file is missing.
    pub fn load_identity(&self) -> String {
        read_text_or_default(&self.paths.identity, "identity")
    }

    /// Theme scheduled for `weekday`, if any.
    ///
    /// The first line starting with `"<weekday>:"` (case-insensitive, full
    /// English day name) wins. A missing schedule file yields `None` with a
    /// warning.
    pub fn scheduled_theme(&self, weekday: Weekday) -> Option<String> {
        let path = &self.paths.theme_schedule;
        let schedule = match read_text(path) {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!(path = %path.display(), "theme schedule file not found");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "theme schedule file unreadable");
                return None;
            }
        };
        let theme = theme_for_day(&schedule, weekday);
        debug!(weekday = %weekday, theme = ?theme, "scheduled theme lookup");
        theme
    }

    /// Whether `post` has not been sent before.
    ///
    /// A post is a duplicate when its trimmed text occurs anywhere in the
    /// history file. No history file means everything is unique.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the history exists but cannot be read.
    pub fn is_unique(&self, post: &str) -> Result<bool, StoreError> {
        let needle = post.trim();
        match read_text(&self.paths.post_history)? {
            Some(history) => Ok(!history.contains(needle)),
            None => Ok(true),
        }
    }

    /// Record a sent post: append a history entry and overwrite the
    /// last-post snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if either file cannot be written.
    pub fn record(&self, post: &str, at: DateTime<Local>) -> Result<(), StoreError> {
        append_text(&self.paths.post_history, &history_entry(post, at))?;
        write_text(&self.paths.last_post, post)?;
        debug!(path = %self.paths.post_history.display(), "post recorded in history");
        Ok(())
    }

    /// The most recently recorded post, if any.
    pub fn last_post(&self) -> Option<String> {
        read_text(&self.paths.last_post).ok().flatten()
    }
}

/// Format one history entry: timestamp line, post, delimiter line.
pub fn history_entry(post: &str, at: DateTime<Local>) -> String {
    format!(
        "{}\n{post}\n{}\n",
        at.format("%Y-%m-%dT%H:%M:%S%.6f"),
        "=".repeat(HISTORY_DELIMITER_WIDTH)
    )
}

/// Look up the theme for `weekday` in schedule text.
pub fn theme_for_day(schedule: &str, weekday: Weekday) -> Option<String> {
    let prefix = format!("{}:", weekday_name(weekday));
    schedule
        .lines()
        .map(str::trim_start)
        .find(|line| {
            line.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
        })
        .and_then(|line| line.split_once(':'))
        .map(|(_, theme)| theme.trim().to_owned())
        .filter(|theme| !theme.is_empty())
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
