//! Section-level helpers for the markdown summaries.
//!
//! A section runs from its header to the next header of the same or a
//! shallower level, or to the end of the document.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::error::RecapResult;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s*(.+?)\s*$").expect("valid header regex"));

/// Minimum trimmed length of a summary worth publishing.
const MIN_CONTENT_CHARS: usize = 100;

/// One markdown header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Zero-based line index.
    pub line: usize,
    pub level: usize,
    pub title: String,
}

pub fn find_headers(markdown: &str) -> Vec<Header> {
    markdown
        .lines()
        .enumerate()
        .filter_map(|(line, text)| {
            HEADER_RE.captures(text).map(|c| Header {
                line,
                level: c[1].len(),
                title: c[2].trim().to_string(),
            })
        })
        .collect()
}

/// Text of the first section whose header satisfies `matches`, header line
/// included. Empty when nothing matches.
fn section_where(markdown: &str, matches: impl Fn(&str) -> bool) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let headers = find_headers(markdown);

    let Some(idx) = headers.iter().position(|h| matches(&h.title)) else {
        return String::new();
    };
    let start = &headers[idx];
    let end = headers[idx + 1..]
        .iter()
        .find(|h| h.level <= start.level)
        .map(|h| h.line)
        .unwrap_or(lines.len());

    lines[start.line..end].join("\n").trim().to_string()
}

/// Section whose title contains `title`, compared case-insensitively.
pub fn extract_section(markdown: &str, title: &str) -> String {
    let needle = title.to_lowercase();
    section_where(markdown, |t| t.to_lowercase().contains(&needle))
}

/// The "오늘의 요약" section: any header mentioning both 오늘 and 요약.
pub fn extract_today_summary(markdown: &str) -> String {
    let section = section_where(markdown, |t| t.contains("오늘") && t.contains("요약"));
    if section.is_empty() {
        debug!("No today's-summary section found");
    }
    section
}

/// Body of every section keyed by its title, in document order.
///
/// Unlike [`extract_section`], a section here stops at the very next header
/// of any level, and the header line itself is not included. Sections with
/// an empty body are skipped.
pub fn split_by_sections(markdown: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = markdown.lines().collect();
    let headers = find_headers(markdown);

    headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let end = headers.get(i + 1).map(|n| n.line).unwrap_or(lines.len());
            let body = lines[h.line + 1..end].join("\n").trim().to_string();
            (!body.is_empty()).then(|| (h.title.clone(), body))
        })
        .collect()
}

/// Whether `content` has at least one header and more than a hundred
/// characters of text.
pub fn validate_markdown(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return false;
    }
    let has_header = content.lines().any(|l| HEADER_RE.is_match(l));
    has_header && trimmed.chars().count() > MIN_CONTENT_CHARS
}

/// Append a `## 오늘의 요약` section unless one already exists.
pub fn add_today_summary(markdown: &str, summary: &str) -> String {
    if summary.trim().is_empty() {
        return markdown.to_string();
    }
    if !extract_today_summary(markdown).is_empty() {
        warn!("Today's-summary section already present; leaving document unchanged");
        return markdown.to_string();
    }
    format!("{}\n\n## 오늘의 요약\n\n{}", markdown.trim_end(), summary.trim())
}

/// Write `content` with exactly one trailing newline, creating parent
/// directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn save_markdown(path: &Path, content: &str) -> RecapResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut text = content.trim_end().to_string();
    text.push('\n');
    if let Err(e) = fs::write(path, text).await {
        error!(error = %e, "Failed to write markdown");
        return Err(e.into());
    }
    info!("Saved markdown");
    Ok(())
}

#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn read_markdown(path: &Path) -> RecapResult<String> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            debug!(chars = content.chars().count(), "Read markdown");
            Ok(content)
        }
        Err(e) => {
            error!(error = %e, "Failed to read markdown");
            Err(e.into())
        }
    }
}
