//! Data models for fetched issues, generated summaries and run records.
//!
//! - [`FetchedIssue`]: Newsletter page converted to markdown
//! - [`SummaryDocument`]: Korean summary produced by a summarizer
//! - [`DeliveryOutcome`] / [`ChannelReport`]: What happened on each channel
//! - [`RunRecord`]: Everything one `run` produced, persisted as JSON

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::publishers::Channel;
use crate::sources::NewsSource;

/// A newsletter issue as fetched from its source.
#[derive(Debug, Clone)]
pub struct FetchedIssue {
    /// The issue URL.
    pub url: String,
    /// Main content converted to markdown, links absolute.
    pub markdown: String,
}

/// A summary ready to persist and publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub source: NewsSource,
    pub source_url: String,
    /// Issue date as `yy.mm.dd`.
    pub date: String,
    pub markdown: String,
    pub headline: Option<String>,
    pub thumbnail: Option<String>,
    /// Weekly Robotics issue number.
    pub issue_number: Option<String>,
}

impl SummaryDocument {
    /// The extracted headline, or the source's default.
    pub fn headline_or_default(&self) -> String {
        match self.headline.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => self.source.default_headline(self.issue_number.as_deref()),
        }
    }

    /// Discussion title: `explicit` when given, else `[<label>, <date>] <headline>`.
    pub fn title(&self, explicit: Option<&str>) -> String {
        match explicit.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!(
                "[{}, {}] {}",
                self.source.label(),
                self.date,
                self.headline_or_default()
            ),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered {
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

impl DeliveryOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl ToString) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: Channel,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

/// Everything one workflow run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRecord {
    /// RFC 3339 local timestamp of the start of the run.
    pub started_at: String,
    pub finished_at: Option<String>,
    pub source_url: String,
    pub source: Option<NewsSource>,
    pub title: Option<String>,
    pub headline: Option<String>,
    pub dry_run: bool,
    pub full_path: Option<PathBuf>,
    pub compact_path: Option<PathBuf>,
    pub kakao_path: Option<PathBuf>,
    pub discussion_url: Option<String>,
    pub deliveries: Vec<ChannelReport>,
}

impl RunRecord {
    pub fn record(&mut self, channel: Channel, outcome: DeliveryOutcome) {
        self.deliveries.push(ChannelReport { channel, outcome });
    }

    pub fn failures(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|r| r.outcome.is_failure())
            .count()
    }
}
