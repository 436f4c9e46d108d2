//! Markdown to KakaoTalk plain text.
//!
//! KakaoTalk renders no markdown, so summaries are flattened by a fixed
//! sequence of rewrite passes, each a plain `&str -> String` function:
//!
//! 1. [`normalize_headers`]: `### x` → `- x`, `## x` → `[x]`, `# x` → `x`
//! 2. [`flatten_links`]: `[a](url)` → `a (url)`, with short links substituted
//! 3. [`strip_emphasis`]: bold, italics, inline code and strikethrough markers
//! 4. [`normalize_bullets`]: `-`, `*`, `•` list markers → `ㆍ`
//! 5. [`convert_dividers`]: `---` → `─────────`
//! 6. [`collapse_whitespace`]
//!
//! Header passes emit `- ` items, so bullets must be normalized after them.
//! URL shortening is network-bound and runs first, in
//! [`resolve_short_links`]; the passes themselves are synchronous.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures::future::join_all;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, info, instrument, warn};

use crate::error::{RecapError, RecapResult};
use crate::links::{BARE_URL_RE, MARKDOWN_LINK_RE};
use crate::utils::{char_len, truncate_for_log};

/// URLs at or under this many characters are not worth shortening.
pub const SHORTEN_THRESHOLD: usize = 30;

pub const BULLET_GLYPH: &str = "ㆍ";
pub const DIVIDER_GLYPH: &str = "─────────";

pub const TINYURL_API: &str = "http://tinyurl.com/api-create.php";

/// Original URL → short URL.
pub type ShortLinks = HashMap<String, String>;

static BOLD_ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*\*(\S(?:[^\n]*?\S)?)\*\*\*").expect("valid bold italic regex"));
static BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(\S(?:[^\n]*?\S)?)\*\*").expect("valid bold regex"));
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*([^*\s](?:[^*\n]*?[^*\s])?)\*").expect("valid italic regex")
});
static UNDERSCORE_ITALIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w])_([^_\s](?:[^_\n]*?[^_\s])?)_($|[^\w])")
        .expect("valid underscore italic regex")
});
static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("valid inline code regex"));
static STRIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~~([^~\n]+)~~").expect("valid strikethrough regex"));
static URL_SENTINEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").expect("valid sentinel regex"));
static DIVIDER_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*---\s*$").expect("valid divider regex"));
static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank run regex"));

/// Discussion-board links are shown in full.
pub fn is_board_url(url: &str) -> bool {
    url.contains("github.com") && url.contains("/discussions")
}

fn map_lines(text: &str, f: impl Fn(&str) -> String) -> String {
    text.split('\n').map(f).join("\n")
}

/// Header level and the text after the marker, when `line` opens with one.
fn header_level(line: &str) -> Option<(usize, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    let rest = line[hashes..].strip_prefix(' ')?;
    (1..=6).contains(&hashes).then_some((hashes, rest))
}

/// Drop stacked markers such as `# # x`, so a bare title never starts with one.
fn strip_header_markers(mut text: &str) -> &str {
    while let Some((_, rest)) = header_level(text) {
        text = rest.trim_start();
    }
    text
}

/// `### x` → `- x`, `## x` → `[x]`, `# x` → `x`.
///
/// Levels four to six are treated like level three. Stacked markers after a
/// level-one marker are dropped with it.
pub fn normalize_headers(text: &str) -> String {
    map_lines(text, |line| {
        let Some((level, rest)) = header_level(line) else {
            return line.to_string();
        };
        let rest = rest.trim();
        match level {
            1 => strip_header_markers(rest).to_string(),
            2 => format!("[{rest}]"),
            3..=6 => format!("- {rest}"),
            _ => line.to_string(),
        }
    })
}

/// `[anchor](url)` → `anchor (url)`.
///
/// Board URLs stay verbatim; anything else is replaced by its entry in
/// `short_links` when there is one.
pub fn flatten_links(text: &str, short_links: &ShortLinks) -> String {
    MARKDOWN_LINK_RE
        .replace_all(text, |caps: &Captures| {
            let anchor = &caps[1];
            let url = caps[2].trim();
            let shown = if is_board_url(url) {
                url
            } else {
                short_links.get(url).map(String::as_str).unwrap_or(url)
            };
            format!("{anchor} ({shown})")
        })
        .into_owned()
}

fn strip_emphasis_once(text: &str) -> String {
    let text = BOLD_ITALIC_RE.replace_all(text, "$1");
    let text = BOLD_RE.replace_all(&text, "$1");
    let text = ITALIC_RE.replace_all(&text, "$1");
    let text = UNDERSCORE_ITALIC_RE.replace_all(&text, "$1$2$3");
    let text = CODE_RE.replace_all(&text, "$1");
    STRIKE_RE.replace_all(&text, "$1").into_owned()
}

/// Remove `***x***`, `**x**`, `*x*`, `_x_`, `` `x` `` and `~~x~~` markers.
///
/// Emphasis must hug its content, so a `* item` bullet is left alone, and
/// underscores inside words (`snake_case`) are not italics. URLs are shielded
/// while the markers are removed.
pub fn strip_emphasis(text: &str) -> String {
    let mut urls: Vec<String> = Vec::new();
    let shielded = BARE_URL_RE
        .replace_all(text, |caps: &Captures| {
            urls.push(caps[0].to_string());
            format!("\u{E000}{}\u{E001}", urls.len() - 1)
        })
        .into_owned();

    // Removing one marker can expose another (`**_x_**`). Every round that
    // changes the text makes it shorter.
    let mut stripped = strip_emphasis_once(&shielded);
    loop {
        let next = strip_emphasis_once(&stripped);
        if next == stripped {
            break;
        }
        stripped = next;
    }

    URL_SENTINEL_RE
        .replace_all(&stripped, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| urls.get(i).cloned())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Line-start `- `, `* ` and `• ` become `ㆍ `, keeping indentation.
pub fn normalize_bullets(text: &str) -> String {
    map_lines(text, |line| {
        let body = line.trim_start_matches([' ', '\t']);
        let indent = &line[..line.len() - body.len()];
        for marker in ["- ", "* ", "• "] {
            if let Some(rest) = body.strip_prefix(marker) {
                return format!("{indent}{BULLET_GLYPH} {rest}");
            }
        }
        line.to_string()
    })
}

/// A line of exactly `---` becomes [`DIVIDER_GLYPH`].
pub fn convert_dividers(text: &str) -> String {
    map_lines(text, |line| {
        if DIVIDER_LINE_RE.is_match(line) {
            DIVIDER_GLYPH.to_string()
        } else {
            line.to_string()
        }
    })
}

/// Strip trailing whitespace per line, squeeze blank runs to one blank line,
/// drop leading and trailing blank lines.
///
/// The first line keeps its indentation.
pub fn collapse_whitespace(text: &str) -> String {
    let trimmed = map_lines(text, |line| line.trim_end().to_string());
    BLANK_RUN_RE
        .replace_all(&trimmed, "\n\n")
        .trim_start_matches('\n')
        .trim_end()
        .to_string()
}

fn run_passes(markdown: &str, short_links: &ShortLinks) -> String {
    let text = normalize_headers(markdown);
    let text = flatten_links(&text, short_links);
    let text = strip_emphasis(&text);
    let text = normalize_bullets(&text);
    let text = convert_dividers(&text);
    collapse_whitespace(&text)
}

/// Convert markdown to KakaoTalk plain text.
///
/// The passes run once each, in order, and each is idempotent on its own
/// output. If any pass panics the original markdown is returned unchanged.
///
/// # Arguments
///
/// * `markdown` - The summary to convert
/// * `short_links` - Long URL to short URL, usually from [`resolve_short_links`]
///
/// # Returns
///
/// The plain-text message, or `markdown` itself when conversion failed.
pub fn to_plain_dialect(markdown: &str, short_links: &ShortLinks) -> String {
    let result = panic::catch_unwind(AssertUnwindSafe(|| run_passes(markdown, short_links)));
    match result {
        Ok(text) => text,
        Err(_) => {
            warn!("Plain-text conversion failed; returning original markdown");
            markdown.to_string()
        }
    }
}

/// Shortens URLs. Implementations fail open: any error yields the input URL.
pub trait UrlShortener {
    async fn shorten(&self, url: &str) -> String;
}

/// Leaves every URL as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepUrls;

impl UrlShortener for KeepUrls {
    async fn shorten(&self, url: &str) -> String {
        url.to_string()
    }
}

/// TinyURL's `api-create.php` endpoint.
#[derive(Debug, Clone)]
pub struct TinyUrlShortener {
    http: reqwest::Client,
    endpoint: String,
}

impl TinyUrlShortener {
    pub fn new() -> RecapResult<Self> {
        Self::with_endpoint(TINYURL_API)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> RecapResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    async fn request(&self, url: &str) -> RecapResult<String> {
        let request_url = format!("{}?url={}", self.endpoint, urlencoding::encode(url));
        let response = self.http.get(&request_url).send().await?;
        if !response.status().is_success() {
            return Err(RecapError::from_response("TinyURL", response).await);
        }
        let body = response.text().await?;
        let short = body.trim();
        if short.starts_with("http") {
            Ok(short.to_string())
        } else {
            Err(RecapError::EmptyResponse("TinyURL"))
        }
    }
}

impl UrlShortener for TinyUrlShortener {
    async fn shorten(&self, url: &str) -> String {
        if char_len(url) <= SHORTEN_THRESHOLD {
            return url.to_string();
        }
        match self.request(url).await {
            Ok(short) => {
                debug!(url = %truncate_for_log(url, 80), short = %short, "Shortened URL");
                short
            }
            Err(e) => {
                warn!(url = %truncate_for_log(url, 80), error = %e, "URL shortening failed; keeping original");
                url.to_string()
            }
        }
    }
}

/// Shorten every non-board link target in `markdown`, concurrently.
///
/// Only URLs that actually changed are returned.
#[instrument(level = "info", skip_all)]
pub async fn resolve_short_links<S: UrlShortener>(markdown: &str, shortener: &S) -> ShortLinks {
    let urls: Vec<String> = MARKDOWN_LINK_RE
        .captures_iter(markdown)
        .map(|c| c[2].trim().to_string())
        .filter(|u| !is_board_url(u))
        .unique()
        .collect();

    let shortened = join_all(urls.iter().map(|u| shortener.shorten(u))).await;
    let links: ShortLinks = urls
        .into_iter()
        .zip(shortened)
        .filter(|(original, short)| original != short)
        .collect();
    info!(shortened = links.len(), "Resolved short links");
    links
}

/// [`resolve_short_links`] followed by [`to_plain_dialect`].
pub async fn to_plain_dialect_shortened<S: UrlShortener>(markdown: &str, shortener: &S) -> String {
    let links = resolve_short_links(markdown, shortener).await;
    to_plain_dialect(markdown, &links)
}
