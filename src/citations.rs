//! Citation cleanup for model-written summaries.
//!
//! Summaries tend to cite the same tweet three times in one bullet, tack
//! `(news.smol.ai)` onto every item and repeat the "출처:" footer. This module
//! holds the rule-based cleanup ([`deduplicate`]), the headline/thumbnail
//! meta-line extraction, and [`CitationCleaner`], which asks the model for a
//! cleanup and only trusts the answer if it keeps the link contract.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::api::{AskAsync, PromptBundle};
use crate::links::{self, BARE_URL_RE};
use crate::utils::{char_len, char_offset, looks_truncated, truncate_for_log};

/// Headlines longer than this are cut and end in `…`.
pub const HEADLINE_MAX_CHARS: usize = 30;

/// Link or bare URL, links first so a URL inside a link is not matched twice.
static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\]]+)\]\(([^)\s]+)\)|https?://[^\s)\]<>"]+"#).expect("valid citation regex")
});

static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+").expect("valid bullet regex"));

static DIVIDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").expect("valid divider regex"));

static SOURCE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s+)?(?:\p{So}\x{FE0F}?\s*)?(?:\*\*)?\s*(?:출처|[Ss]ources?)\s*(?:\*\*)?\s*[:：]")
        .expect("valid source line regex")
});

/// `(news.smol.ai)` or `[news.smol.ai]` at the very end of a line.
static TRAILING_ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*[(\[]((?i:[a-z0-9-]+(?:\.[a-z0-9-]+)+))[)\]]\s*$")
        .expect("valid annotation regex")
});

static HEADLINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\*\*\s*(?:헤드라인|[Hh]eadline)\s*[:：]\s*(.*?)\s*$").expect("valid headline regex")
});

static THUMBNAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\*\*\s*(?:썸네일|[Tt]humbnail)\s*[:：]\s*(.*?)\s*$").expect("valid thumbnail regex")
});

static JSON_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*?)\n?```\s*$").expect("valid fence regex")
});

/// Markers that allow a line to carry links the input did not have.
const EXTRA_REFERENCE_MARKERS: [&str; 2] = ["[추가 참고]", "[Additional reference]"];

const CLEANUP_SYSTEM_PROMPT: &str = "역할: 마크다운 문서 정리 전문가

목표: 입력된 마크다운 텍스트에서 중복된 출처 표기를 제거하고 가독성을 개선

규칙:
1. 각 문단/불릿에서 동일한 출처가 반복되면 한 번만 남기기
2. 연속된 문장에서 같은 링크가 반복되면 첫 번째만 남기기
3. 마지막 \"출처:\" 부분은 반드시 유지
4. 내용은 변경하지 말고 중복 링크만 제거
5. 원문의 구조와 의미를 100% 보존";

const CLEANUP_DEVELOPER_PROMPT: &str = "작업:
1. 동일한 URL이 한 문단/불릿 내에서 2번 이상 나타나면 첫 번째만 남기고 제거
2. \"(news.smol.ai)\" 같은 괄호 출처가 각 불릿 끝마다 반복되면 제거
3. 마지막 \"출처:\" 줄은 그대로 유지
4. 링크 텍스트와 URL의 매칭 관계는 유지
5. {prefix}_0001 형태의 placeholder는 절대 변경하지 말 것
6. 문서 전체를 대표하는 15자 이내의 한국어 헤드라인을 작성

출력 형식 (JSON 한 개만 출력):
{\"markdown\": \"정리된 마크다운\", \"headline\": \"헤드라인\"}";

/// Result of stripping `**헤드라인: …**` / `**썸네일: …**` meta lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineParts {
    pub body: String,
    pub headline: Option<String>,
    pub thumbnail: Option<String>,
}

/// A structured cleanup answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StructuredCleanup {
    pub markdown: String,
    #[serde(default)]
    pub headline: Option<String>,
}

/// Ways a cleaned document can break the link contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// Links that were not in the input and are not flagged as extra references.
    InventedLinks(Vec<String>),
    /// The input had a source line and the output has none.
    SourceLineDropped,
    /// Placeholders that did not map back to a URL.
    UnresolvedPlaceholders(Vec<String>),
}

/// A cleaned summary and the headline found along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedDocument {
    pub markdown: String,
    pub headline: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Header,
    Divider,
    Fence,
    Source,
    Bullet,
    Continuation,
    Prose,
}

fn classify(line: &str, in_fence: bool) -> LineKind {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        return LineKind::Fence;
    }
    if in_fence {
        return LineKind::Fence;
    }
    if trimmed.is_empty() {
        LineKind::Blank
    } else if trimmed.starts_with('#') {
        LineKind::Header
    } else if DIVIDER_RE.is_match(line) {
        LineKind::Divider
    } else if SOURCE_LINE_RE.is_match(line) {
        LineKind::Source
    } else if BULLET_RE.is_match(line) {
        LineKind::Bullet
    } else if line.starts_with([' ', '\t']) {
        LineKind::Continuation
    } else {
        LineKind::Prose
    }
}

/// Group lines into citation units: a bullet with its indented continuation
/// lines, or a run of prose lines. Lines outside any unit get `None`.
fn assign_units(lines: &[&str]) -> (Vec<LineKind>, Vec<Option<usize>>) {
    let mut kinds = Vec::with_capacity(lines.len());
    let mut units = Vec::with_capacity(lines.len());
    let mut in_fence = false;
    let mut next_unit = 0usize;
    let mut current: Option<(usize, LineKind)> = None;

    for line in lines {
        let kind = classify(line, in_fence);
        if kind == LineKind::Fence && line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }

        let unit = match kind {
            LineKind::Bullet => {
                next_unit += 1;
                current = Some((next_unit, LineKind::Bullet));
                Some(next_unit)
            }
            LineKind::Continuation | LineKind::Prose => match current {
                Some((id, LineKind::Bullet)) if kind == LineKind::Continuation => Some(id),
                Some((id, LineKind::Prose)) => Some(id),
                _ => {
                    next_unit += 1;
                    current = Some((next_unit, LineKind::Prose));
                    Some(next_unit)
                }
            },
            _ => {
                current = None;
                None
            }
        };
        kinds.push(kind);
        units.push(unit);
    }
    (kinds, units)
}

/// Remove repeated citations inside one line, given what the unit has seen.
fn dedupe_line(line: &str, seen: &mut HashMap<String, Option<String>>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0usize;

    for caps in CITATION_RE.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        let start = whole.start();
        let mut end = whole.end();

        let (url, anchor) = match (caps.get(1), caps.get(2)) {
            (Some(anchor), Some(target)) => (target.as_str(), Some(anchor.as_str())),
            _ => {
                // Sentence punctuation is not part of a bare URL.
                let trimmed = whole.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
                end = start + trimmed.len();
                (trimmed, None)
            }
        };

        match seen.get(url) {
            None => {
                seen.insert(url.to_string(), anchor.map(str::to_string));
                out.push_str(&line[last..end]);
            }
            Some(first_anchor) => {
                let keep_anchor = anchor.filter(|a| first_anchor.as_deref() != Some(*a));
                if let Some(text) = keep_anchor {
                    out.push_str(&line[last..start]);
                    out.push_str(text);
                } else {
                    let (mut s, mut e) = (start, end);
                    if s > last && line[..s].ends_with('(') && line[e..].starts_with(')') {
                        s -= 1;
                        e += 1;
                    }
                    out.push_str(line[last..s].trim_end_matches([' ', '\t']));
                    end = e;
                }
            }
        }
        last = end;
    }
    out.push_str(&line[last..]);
    out
}

/// Trailing domain annotation of a line, if any, lowercased.
fn trailing_annotation(line: &str) -> Option<(usize, String)> {
    let caps = TRAILING_ANNOTATION_RE.captures(line)?;
    let whole = caps.get(0)?;
    // `[text](news.smol.ai)` is a link, not an annotation.
    if line[..whole.start()].ends_with(']') {
        return None;
    }
    Some((whole.start(), caps[1].to_lowercase()))
}

/// Rule-based citation cleanup.
///
/// - Within a paragraph or bullet item, the first citation of a URL wins.
///   Later formatted links to it are dropped when their anchor matches the
///   first one and reduced to their anchor text otherwise; later bare copies
///   are dropped together with wrapping parentheses.
/// - A domain annotation such as `(news.smol.ai)` that trails two or more
///   bullets is removed from all of them.
/// - Only the last `출처:` / `Source:` line is kept.
///
/// Never adds a link, so the output's link set is a subset of the input's.
pub fn deduplicate(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let (kinds, units) = assign_units(&lines);

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut seen: HashMap<String, Option<String>> = HashMap::new();
    let mut seen_unit: Option<usize> = None;
    for (line, unit) in lines.iter().zip(&units) {
        match unit {
            Some(id) => {
                if seen_unit != Some(*id) {
                    seen.clear();
                    seen_unit = Some(*id);
                }
                out.push(dedupe_line(line, &mut seen));
            }
            None => out.push((*line).to_string()),
        }
    }

    // Repeated trailing annotations on bullets: the last line of each bullet unit.
    let mut bullet_tails: Vec<usize> = Vec::new();
    for i in 0..out.len() {
        let Some(id) = units[i] else { continue };
        let is_bullet_unit = (0..=i)
            .rev()
            .take_while(|&j| units[j] == Some(id))
            .any(|j| kinds[j] == LineKind::Bullet);
        let unit_ends = units.get(i + 1).copied().flatten() != Some(id);
        if is_bullet_unit && unit_ends {
            bullet_tails.push(i);
        }
    }
    let mut annotation_counts: HashMap<String, usize> = HashMap::new();
    for &i in &bullet_tails {
        if let Some((_, domain)) = trailing_annotation(&out[i]) {
            *annotation_counts.entry(domain).or_default() += 1;
        }
    }
    for &i in &bullet_tails {
        if let Some((cut, domain)) = trailing_annotation(&out[i]) {
            if annotation_counts.get(&domain).copied().unwrap_or(0) >= 2 {
                out[i].truncate(cut);
            }
        }
    }

    // Keep only the final source line.
    let source_lines: Vec<usize> = (0..kinds.len())
        .filter(|&i| kinds[i] == LineKind::Source)
        .collect();
    let mut drop = vec![false; out.len()];
    if let Some((_, earlier)) = source_lines.split_last() {
        for &i in earlier {
            drop[i] = true;
            // Avoid leaving a double blank line behind.
            let blank_before = i == 0 || out[i - 1].trim().is_empty();
            if blank_before && out.get(i + 1).is_some_and(|l| l.trim().is_empty()) {
                drop[i + 1] = true;
            }
        }
    }
    if !source_lines.is_empty() && source_lines.len() > 1 {
        info!(removed = source_lines.len() - 1, "Removed repeated source lines");
    }

    out.into_iter()
        .zip(drop)
        .filter_map(|(line, dropped)| (!dropped).then_some(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// True when any line of `markdown` is a `출처:` / `Source:` line.
pub fn has_source_line(markdown: &str) -> bool {
    markdown.lines().any(|l| SOURCE_LINE_RE.is_match(l))
}

/// Cut a headline to [`HEADLINE_MAX_CHARS`], ending in `…` when cut.
pub fn clamp_headline(headline: &str) -> String {
    let headline = headline.trim();
    if char_len(headline) <= HEADLINE_MAX_CHARS {
        headline.to_string()
    } else {
        format!("{}…", &headline[..char_offset(headline, HEADLINE_MAX_CHARS)])
    }
}

fn meta_value(raw: &str) -> String {
    let value = raw.replace("**", "");
    let value = value.trim();
    // `[제목]` template brackets, but not a markdown link.
    match value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        Some(inner) if !inner.contains("](") => inner.trim().to_string(),
        _ => value.to_string(),
    }
}

/// Strip `**헤드라인: …**` and `**썸네일: …**` lines, returning their values.
///
/// The first headline and thumbnail win; every meta line is removed from the
/// body. Leading blank lines left behind are dropped.
pub fn extract_headline(markdown: &str) -> HeadlineParts {
    let mut headline = None;
    let mut thumbnail = None;
    let mut body_lines = Vec::new();

    for line in markdown.lines() {
        if let Some(caps) = HEADLINE_RE.captures(line) {
            let value = meta_value(&caps[1]);
            if headline.is_none() && !value.is_empty() {
                headline = Some(clamp_headline(&value));
            }
            continue;
        }
        if let Some(caps) = THUMBNAIL_RE.captures(line) {
            if thumbnail.is_none() {
                let value = meta_value(&caps[1]);
                thumbnail = BARE_URL_RE.find(&value).map(|m| m.as_str().to_string());
            }
            continue;
        }
        body_lines.push(line);
    }

    let body = body_lines.join("\n");
    HeadlineParts {
        body: body.trim_start_matches('\n').to_string(),
        headline,
        thumbnail,
    }
}

/// Parse a `{"markdown": …, "headline": …}` answer, optionally fenced.
///
/// Errors are serde errors so callers can tell truncation apart.
pub fn parse_structured(raw: &str) -> Result<StructuredCleanup, serde_json::Error> {
    let raw = raw.trim();
    let json = match JSON_FENCE_RE.captures(raw) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
        None => raw.to_string(),
    };
    let mut parsed: StructuredCleanup = serde_json::from_str(&json)?;
    parsed.headline = parsed
        .headline
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(clamp_headline);
    Ok(parsed)
}

fn looks_like_json(raw: &str) -> bool {
    let raw = raw.trim_start();
    raw.starts_with('{') || raw.starts_with("```json") || raw.starts_with("```JSON")
}

/// Check a cleaned document against the input it came from.
pub fn check_contract(input: &str, output: &str) -> Result<(), ContractViolation> {
    let allowed: BTreeSet<String> = links::extract_links(input).into_iter().collect();
    let checked: String = output
        .lines()
        .filter(|l| !EXTRA_REFERENCE_MARKERS.iter().any(|m| l.contains(m)))
        .collect::<Vec<_>>()
        .join("\n");
    let invented: Vec<String> = links::extract_links(&checked)
        .into_iter()
        .filter(|l| !allowed.contains(l))
        .collect();
    if !invented.is_empty() {
        return Err(ContractViolation::InventedLinks(invented));
    }
    if has_source_line(input) && !has_source_line(output) {
        return Err(ContractViolation::SourceLineDropped);
    }
    Ok(())
}

/// Model-assisted citation cleanup with a rule-based safety net.
///
/// Links are swapped for placeholders before the call and restored after it.
/// The answer is only used when it keeps the link contract; otherwise the
/// rule-based [`deduplicate`] runs on the original. A failed or empty call
/// returns the original unchanged.
#[derive(Debug)]
pub struct CitationCleaner<C> {
    client: C,
}

impl<C: AskAsync> CitationCleaner<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    fn prompt(protected: &str, prefix: &str) -> PromptBundle {
        PromptBundle::new(
            CLEANUP_SYSTEM_PROMPT,
            format!("다음 마크다운에서 중복된 출처 표기를 제거해주세요:\n\n{protected}"),
        )
        .with_developer(CLEANUP_DEVELOPER_PROMPT.replace("{prefix}", prefix))
    }

    fn unchanged(markdown: &str) -> CleanedDocument {
        CleanedDocument {
            markdown: markdown.to_string(),
            headline: extract_headline(markdown).headline,
        }
    }

    async fn ask_structured(&self, prompt: &PromptBundle) -> Option<StructuredCleanup> {
        let mut retried = false;
        loop {
            let raw = match self.client.ask(prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "Citation cleanup call failed; keeping original");
                    return None;
                }
            };
            if !looks_like_json(&raw) {
                // Plain markdown answer: take meta lines out of it.
                let parts = extract_headline(&raw);
                return Some(StructuredCleanup {
                    markdown: parts.body,
                    headline: parts.headline,
                });
            }
            match parse_structured(&raw) {
                Ok(parsed) => return Some(parsed),
                Err(e) if looks_truncated(&e) && !retried => {
                    warn!(error = %e, "EOF while parsing cleanup; re-asking once");
                    retried = true;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        response_preview = %truncate_for_log(&raw, 300),
                        "Cleanup returned non-conforming JSON; keeping original"
                    );
                    return None;
                }
            }
        }
    }

    /// Clean `markdown`. Never fails.
    #[instrument(level = "info", skip_all, fields(chars = char_len(markdown)))]
    pub async fn clean(&self, markdown: &str) -> CleanedDocument {
        if markdown.trim().is_empty() {
            return Self::unchanged(markdown);
        }

        let (protected, map) = links::preserve(markdown);
        let prompt = Self::prompt(&protected, map.prefix());
        let Some(answer) = self.ask_structured(&prompt).await else {
            return Self::unchanged(markdown);
        };

        let restored = links::restore(&answer.markdown, &map);
        if restored.trim().is_empty() {
            warn!("Citation cleanup returned empty markdown; keeping original");
            return Self::unchanged(markdown);
        }

        let headline = answer
            .headline
            .or_else(|| extract_headline(markdown).headline);

        let leftover = map.placeholders_in(&restored);
        let verdict = if leftover.is_empty() {
            check_contract(markdown, &restored)
        } else {
            Err(ContractViolation::UnresolvedPlaceholders(leftover))
        };

        match verdict {
            Ok(()) => {
                let cleaned = deduplicate(restored.trim());
                let report = links::validate(markdown, &cleaned);
                info!(
                    before = char_len(markdown),
                    after = char_len(&cleaned),
                    missing = report.missing.len(),
                    "Citation cleanup accepted"
                );
                CleanedDocument {
                    markdown: cleaned,
                    headline,
                }
            }
            Err(violation) => {
                warn!(?violation, "Citation cleanup broke the link contract; using rule-based cleanup");
                CleanedDocument {
                    markdown: deduplicate(markdown),
                    headline,
                }
            }
        }
    }
}
