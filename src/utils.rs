//! Utility functions for dates, string truncation, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Issue-date parsing and the `yy.mm.dd` date labels used in titles
//! - Character-safe truncation for logging and length-limited channels
//! - JSON error detection for handling truncated LLM responses
//! - File system validation for output directories

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static ISSUE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2})-(\d{2})-(\d{2})").expect("valid issue date regex"));

/// Today's date as `yy.mm.dd`, the label format used in titles.
pub fn today_label() -> String {
    Local::now().format("%y.%m.%d").to_string()
}

/// Format a calendar date as `yy.mm.dd`.
pub fn date_label(date: NaiveDate) -> String {
    date.format("%y.%m.%d").to_string()
}

/// Extract the `yy.mm.dd` label from an issue URL such as
/// `https://news.smol.ai/issues/25-09-01-not-much`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(date_from_issue_url("https://news.smol.ai/issues/25-09-01-x"), Some("25.09.01".into()));
/// ```
pub fn date_from_issue_url(url: &str) -> Option<String> {
    ISSUE_DATE_RE
        .captures(url)
        .map(|c| format!("{}.{}.{}", &c[1], &c[2], &c[3]))
}

/// Number of characters (not bytes) in `s`.
///
/// Message limits on every channel are counted in characters, and the
/// summaries are Korean, so byte lengths would be wildly off.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`-th character of `s` (or `s.len()` past the end).
pub fn char_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let cut = char_offset(s, max);
    if cut >= s.len() {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

/// Cut `s` down to at most `max` characters, ending in `...` when cut.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if char_len(s) <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    format!("{}...", &s[..char_offset(s, keep)])
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
