//! Smol AI News summarizer.
//!
//! The recap sections go to the model with every link swapped for a
//! placeholder, so tweet status IDs survive the rewrite. The answer is
//! restored, audited and passed through the citation cleaner, which also
//! supplies the headline.

use tracing::{info, instrument, warn};

use crate::api::{AskAsync, PromptBundle};
use crate::citations::{CitationCleaner, extract_headline, has_source_line};
use crate::error::RecapResult;
use crate::links;
use crate::models::{FetchedIssue, SummaryDocument};
use crate::sources::{NewsSource, narrow_to_sections};
use crate::utils::{date_from_issue_url, today_label};

use super::prompts::{SMOL_DEVELOPER, SMOL_SYSTEM, smol_user};

const TEMPERATURE: f32 = 0.5;

#[instrument(level = "info", skip_all, fields(url = %issue.url))]
pub async fn summarize<C: AskAsync>(
    client: &C,
    issue: &FetchedIssue,
    timeframe: Option<&str>,
) -> RecapResult<SummaryDocument> {
    let source = NewsSource::SmolAiNews;
    let content = narrow_to_sections(&issue.markdown, source.sections());
    let (protected, map) = links::preserve(&content);
    info!(links = map.len(), prefix = map.prefix(), "Protected source links");

    let prompt = PromptBundle::new(SMOL_SYSTEM, smol_user(&issue.url, timeframe, &protected))
        .with_developer(SMOL_DEVELOPER)
        .with_temperature(TEMPERATURE);
    let answer = client.ask(&prompt).await?;

    let restored = links::restore(&answer, &map);
    let report = links::validate(&content, &restored);
    info!(
        preserved = report.preserved.len(),
        missing = report.missing.len(),
        added = report.added.len(),
        "Link check after summarization"
    );
    links::audit_status_ids(&restored);

    let cleaned = CitationCleaner::new(client).clean(&restored).await;
    let parts = extract_headline(&cleaned.markdown);
    let mut markdown = parts.body.trim().to_string();
    if !has_source_line(&markdown) {
        warn!("Summary has no source line; appending one");
        markdown.push_str(&format!("\n\n출처: [원문]({})", issue.url));
    }

    Ok(SummaryDocument {
        source,
        source_url: issue.url.clone(),
        date: date_from_issue_url(&issue.url).unwrap_or_else(today_label),
        markdown,
        headline: cleaned.headline.or(parts.headline),
        thumbnail: None,
        issue_number: None,
    })
}
