//! Link preservation across LLM rewriting.
//!
//! Models regularly mangle URLs they are asked to echo back (the numeric
//! status IDs in `x.com` links are the usual victims). Before a document is
//! handed to the model every link is swapped for an opaque placeholder such as
//! `[LINK_0001]`; after the model answers, the placeholders are swapped back.
//!
//! # Placeholder syntax
//!
//! - Formatted links keep their anchor: `[anchor](url)` → `[anchor]([LINK_0001])`
//! - Bare URLs are replaced wholesale: `https://…` → `[LINK_0002]`
//!
//! IDs are zero-padded sequence numbers assigned in scan order (formatted links
//! first, then bare URLs). When the input already contains `LINK_`, the prefix
//! becomes `LINK1`, `LINK2`, … so a placeholder never collides with body text.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::utils::truncate_for_log;

/// `[anchor](target)`
pub static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid markdown link regex"));

/// Bare `http(s)://` URL, stopping at whitespace, closing brackets, and quotes.
pub static BARE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s)\]<>"]+"#).expect("valid url regex"));

static PLACEHOLDER_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[?LINK\d*_\d{4,}\]?$").expect("valid placeholder regex"));

static STATUS_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:x\.com|twitter\.com)/[^/\s]+/status/(\d+)").expect("valid status regex")
});

const BASE_PREFIX: &str = "LINK";

/// Length of a well-formed `x.com` status ID.
const STATUS_ID_DIGITS: usize = 19;

/// One placeholder and the URL it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub placeholder_id: String,
    pub original_url: String,
}

/// Placeholder → URL mapping for a single preserve/restore pair.
///
/// A map is built by [`preserve`] for one document and consumed by
/// [`restore`] on that document's rewritten counterpart. It is a plain value:
/// nothing about it is global, so concurrent documents cannot leak into each
/// other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMap {
    prefix: String,
    urls: BTreeMap<u32, String>,
}

impl LinkMap {
    fn with_prefix(prefix: String) -> Self {
        Self {
            prefix,
            urls: BTreeMap::new(),
        }
    }

    /// The placeholder prefix chosen for this document (`LINK` unless that
    /// text already appeared in the input).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    fn placeholder_id(&self, seq: u32) -> String {
        format!("{}_{:04}", self.prefix, seq)
    }

    fn register(&mut self, url: &str) -> String {
        let seq = self.urls.len() as u32 + 1;
        self.urls.insert(seq, url.to_string());
        self.placeholder_id(seq)
    }

    /// Look up the URL behind a placeholder ID such as `LINK_0001`.
    pub fn get(&self, placeholder_id: &str) -> Option<&str> {
        let digits = placeholder_id
            .trim_matches(|c| c == '[' || c == ']')
            .strip_prefix(&self.prefix)?
            .strip_prefix('_')?;
        self.lookup_digits(digits)
    }

    /// Only the canonical zero-padded spelling resolves: `LINK_00012` is an
    /// invented token, not `LINK_0012`.
    fn lookup_digits(&self, digits: &str) -> Option<&str> {
        let seq: u32 = digits.parse().ok()?;
        if format!("{:04}", seq) != digits {
            return None;
        }
        self.urls.get(&seq).map(String::as_str)
    }

    /// Entries in assignment order.
    pub fn entries(&self) -> impl Iterator<Item = LinkEntry> + '_ {
        self.urls.iter().map(|(seq, url)| LinkEntry {
            placeholder_id: self.placeholder_id(*seq),
            original_url: url.clone(),
        })
    }

    /// Placeholder tokens of this map's prefix still present in `text`.
    ///
    /// Run on a restored document, the result is what the model invented or
    /// garbled.
    pub fn placeholders_in(&self, text: &str) -> Vec<String> {
        self.token_regex()
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Matches a placeholder with optional surrounding brackets.
    fn token_regex(&self) -> Regex {
        Regex::new(&format!(r"(\[)?{}_(\d{{4,}})(\])?", regex::escape(&self.prefix)))
            .expect("valid placeholder token regex")
    }

    /// Matches a formatted link whose target is already a placeholder.
    fn protected_link_regex(&self) -> Regex {
        Regex::new(&format!(
            r"\[[^\]]+\]\(\[{}_\d{{4,}}\]\)",
            regex::escape(&self.prefix)
        ))
        .expect("valid protected link regex")
    }
}

fn choose_prefix(text: &str) -> String {
    let mut prefix = BASE_PREFIX.to_string();
    let mut n = 0;
    while text.contains(&format!("{prefix}_")) {
        n += 1;
        prefix = format!("{BASE_PREFIX}{n}");
    }
    prefix
}

/// Replace every link in `text` with a placeholder.
///
/// Formatted links are protected first. During the bare-URL pass the already
/// protected `[anchor]([LINK_nnnn])` spans are skipped, so a URL that sits in a
/// formatted link (including one used as its anchor text) is never wrapped
/// twice.
///
/// # Arguments
///
/// * `text` - Markdown with formatted links and bare URLs
///
/// # Returns
///
/// The protected text and the [`LinkMap`] that [`restore`] needs to undo it.
pub fn preserve(text: &str) -> (String, LinkMap) {
    let mut map = LinkMap::with_prefix(choose_prefix(text));

    let formatted = MARKDOWN_LINK_RE
        .replace_all(text, |caps: &Captures| {
            let id = map.register(&caps[2]);
            format!("[{}]([{}])", &caps[1], id)
        })
        .into_owned();

    let shield = map.protected_link_regex();
    let mut protected = String::with_capacity(formatted.len());
    let mut cursor = 0;
    let spans: Vec<(usize, usize)> = shield
        .find_iter(&formatted)
        .map(|m| (m.start(), m.end()))
        .collect();
    for (start, end) in spans
        .into_iter()
        .chain(std::iter::once((formatted.len(), formatted.len())))
    {
        let gap = &formatted[cursor..start];
        let wrapped = BARE_URL_RE.replace_all(gap, |caps: &Captures| {
            format!("[{}]", map.register(&caps[0]))
        });
        protected.push_str(&wrapped);
        protected.push_str(&formatted[start..end]);
        cursor = end;
    }

    info!(links = map.len(), prefix = %map.prefix(), "Preserved links as placeholders");
    for entry in map.entries().take(3) {
        debug!(placeholder = %entry.placeholder_id, url = %truncate_for_log(&entry.original_url, 50), "Link placeholder");
    }

    (protected, map)
}

/// Swap placeholders in `protected` back to their URLs.
///
/// Both `[LINK_0001]` and bare `LINK_0001` are restored. Placeholders that are
/// not in `map` (the model invented or garbled them) are logged and left in
/// place as literal text; the partially restored document is still returned.
pub fn restore(protected: &str, map: &LinkMap) -> String {
    if map.is_empty() {
        debug!("Link map is empty; nothing to restore");
    }

    let token = map.token_regex();
    let mut restored_count = 0usize;
    let mut unresolved: Vec<String> = Vec::new();

    let restored = token
        .replace_all(protected, |caps: &Captures| match map.lookup_digits(&caps[2]) {
            Some(url) => {
                restored_count += 1;
                match (caps.get(1).is_some(), caps.get(3).is_some()) {
                    (true, false) => format!("[{url}"),
                    (false, true) => format!("{url}]"),
                    _ => url.to_string(),
                }
            }
            None => {
                unresolved.push(caps[0].to_string());
                caps[0].to_string()
            }
        })
        .into_owned();

    info!(restored = restored_count, registered = map.len(), "Restored link placeholders");
    if !unresolved.is_empty() {
        warn!(
            count = unresolved.len(),
            samples = ?unresolved.iter().take(5).collect::<Vec<_>>(),
            "Unresolved link placeholders left in text"
        );
    }

    restored
}

fn is_placeholder(target: &str) -> bool {
    PLACEHOLDER_SHAPE_RE.is_match(target)
}

/// Every URL in `text`, in first-seen order, without duplicates.
///
/// Formatted-link targets come first, then bare URLs. Targets that are still
/// placeholders are skipped.
pub fn extract_links(text: &str) -> Vec<String> {
    let formatted = MARKDOWN_LINK_RE
        .captures_iter(text)
        .map(|c| c[2].to_string())
        .filter(|target| !is_placeholder(target));
    let bare = BARE_URL_RE.find_iter(text).map(|m| m.as_str().to_string());
    formatted.chain(bare).unique().collect()
}

/// Link-set diff between a document and its transformed counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub total_before: usize,
    pub total_after: usize,
    pub preserved: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub added: BTreeSet<String>,
    /// Percentage of original URLs that survived; 100 when there were none.
    pub preservation_rate: f64,
}

impl ValidationResult {
    pub fn is_lossless(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Compare the links of `original` and `transformed`.
///
/// Purely observational: the result is logged and returned, never enforced.
pub fn validate(original: &str, transformed: &str) -> ValidationResult {
    let before: BTreeSet<String> = extract_links(original).into_iter().collect();
    let after: BTreeSet<String> = extract_links(transformed).into_iter().collect();

    let preserved: BTreeSet<String> = before.intersection(&after).cloned().collect();
    let missing: BTreeSet<String> = before.difference(&after).cloned().collect();
    let added: BTreeSet<String> = after.difference(&before).cloned().collect();

    let preservation_rate = if before.is_empty() {
        100.0
    } else {
        preserved.len() as f64 / before.len() as f64 * 100.0
    };

    if !missing.is_empty() {
        warn!(
            count = missing.len(),
            samples = ?missing.iter().take(5).map(|l| truncate_for_log(l, 80)).collect::<Vec<_>>(),
            "Links missing after transformation"
        );
    }
    if !added.is_empty() {
        info!(
            count = added.len(),
            samples = ?added.iter().take(5).map(|l| truncate_for_log(l, 80)).collect::<Vec<_>>(),
            "Links added by transformation"
        );
    }
    info!(rate = %format!("{preservation_rate:.1}%"), "Link preservation rate");

    ValidationResult {
        total_before: before.len(),
        total_after: after.len(),
        preserved,
        missing,
        added,
        preservation_rate,
    }
}

/// Warn about `x.com`/`twitter.com` status IDs that are not 19 digits long.
///
/// Returns the suspicious IDs.
pub fn audit_status_ids(text: &str) -> Vec<String> {
    let ids: Vec<&str> = STATUS_ID_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if ids.is_empty() {
        return Vec::new();
    }
    info!(count = ids.len(), "Found x.com/twitter.com status links");

    let suspicious: Vec<String> = ids
        .into_iter()
        .filter(|id| id.len() != STATUS_ID_DIGITS)
        .map(str::to_string)
        .collect();
    for id in suspicious.iter().take(5) {
        warn!(status_id = %id, digits = id.len(), "Unusual status ID length");
    }
    suspicious
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(text: &str) -> String {
        let (protected, map) = preserve(text);
        restore(&protected, &map)
    }

    #[test]
    fn test_round_trip_without_links() {
        let text = "## 오늘의 요약\n\n링크가 없는 문단입니다.";
        let (protected, map) = preserve(text);
        assert!(map.is_empty());
        assert_eq!(protected, text);
        assert_eq!(restore(&protected, &map), text);
    }

    #[test]
    fn test_round_trip_mixed_links() {
        let text = "- [OpenAI](https://openai.com/index/gpt) 발표 (https://x.com/a/status/1961129789944627207)\n\
                    - 참고: https://news.smol.ai/issues/25-09-01 와 [같은 링크](https://openai.com/index/gpt)\n\
                    - 괄호 URL [wiki](https://en.wikipedia.org/wiki/Foo_(bar))";
        assert_eq!(round_trip(text), text);
    }

    #[test]
    fn test_preserve_formats() {
        let (protected, map) = preserve("see [docs](https://a.com/x) and https://b.com/y");
        assert_eq!(protected, "see [docs]([LINK_0001]) and [LINK_0002]");
        assert_eq!(map.get("LINK_0001"), Some("https://a.com/x"));
        assert_eq!(map.get("[LINK_0002]"), Some("https://b.com/y"));
    }

    #[test]
    fn test_url_anchor_not_double_wrapped() {
        let text = "[https://a.com/x](https://a.com/x)";
        let (protected, map) = preserve(text);
        assert_eq!(protected, "[https://a.com/x]([LINK_0001])");
        assert_eq!(map.len(), 1);
        assert_eq!(restore(&protected, &map), text);
    }

    #[test]
    fn test_placeholders_are_unique() {
        let text = "https://a.com https://a.com [x](https://b.com) [y](https://b.com)";
        let (_, map) = preserve(text);
        let ids: Vec<String> = map.entries().map(|e| e.placeholder_id).collect();
        let unique: BTreeSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_prefix_avoids_existing_tokens() {
        let text = "literal LINK_0001 stays, https://a.com moves";
        let (protected, map) = preserve(text);
        assert_eq!(map.prefix(), "LINK1");
        assert!(protected.contains("literal LINK_0001 stays"));
        assert!(protected.contains("[LINK1_0001]"));
        assert_eq!(restore(&protected, &map), text);
    }

    #[test]
    fn test_restore_accepts_bare_placeholders() {
        let (_, map) = preserve("[a](https://a.com) https://b.com");
        let rewritten = "요약: [에이](LINK_0001), 출처 LINK_0002";
        assert_eq!(
            restore(rewritten, &map),
            "요약: [에이](https://a.com), 출처 https://b.com"
        );
    }

    #[test]
    fn test_restore_leaves_unknown_placeholders() {
        let (_, map) = preserve("[a](https://a.com)");
        let rewritten = "[a]([LINK_0001]) [b]([LINK_0042]) LINK_00001";
        assert_eq!(
            restore(rewritten, &map),
            "[a](https://a.com) [b]([LINK_0042]) LINK_00001"
        );
    }

    #[test]
    fn test_placeholders_in_restored_text() {
        let (_, map) = preserve("[a](https://a.com)");
        let restored = restore("[a]([LINK_0001]) [b]([LINK_0099])", &map);
        assert_eq!(map.placeholders_in(&restored), vec!["[LINK_0099]".to_string()]);
        assert!(map.placeholders_in("[a](https://a.com)").is_empty());
    }

    #[test]
    fn test_extract_links_order_and_dedup() {
        let text = "[a](https://a.com) https://b.com [c](https://a.com) [d]([LINK_0001])";
        assert_eq!(extract_links(text), vec!["https://a.com", "https://b.com"]);
    }

    #[test]
    fn test_validate_same_text_is_lossless() {
        let text = "[a](https://a.com) https://b.com/status/1";
        let result = validate(text, text);
        assert_eq!(result.preservation_rate, 100.0);
        assert!(result.missing.is_empty());
        assert!(result.added.is_empty());
        assert_eq!(result.preserved.len(), 2);
    }

    #[test]
    fn test_validate_reports_missing_and_added() {
        let result = validate(
            "[a](https://a.com) [b](https://b.com)",
            "[a](https://a.com) [c](https://c.com)",
        );
        assert_eq!(result.total_before, 2);
        assert_eq!(result.total_after, 2);
        assert!(result.missing.contains("https://b.com"));
        assert!(result.added.contains("https://c.com"));
        assert_eq!(result.preservation_rate, 50.0);
        assert!(!result.is_lossless());
    }

    #[test]
    fn test_validate_empty_original() {
        let result = validate("", "https://x.com");
        assert_eq!(result.preservation_rate, 100.0);
        assert_eq!(result.added.len(), 1);
    }

    #[test]
    fn test_audit_status_ids() {
        let text = "https://x.com/a/status/1961129789944627207 https://twitter.com/b/status/19611297899";
        assert_eq!(audit_status_ids(text), vec!["19611297899".to_string()]);
    }
}
