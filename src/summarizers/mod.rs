//! Newsletter summarizers.
//!
//! [`Summarizer`] is picked from the issue URL (or forced with `--source`)
//! and turns a [`FetchedIssue`] into a [`SummaryDocument`]. The [`compact`]
//! module re-summarizes a finished document for chat.

pub mod compact;
pub mod prompts;
pub mod smol_ai;
pub mod weekly_robotics;

use tracing::{info, instrument};

use crate::api::AskAsync;
use crate::error::{RecapError, RecapResult};
use crate::models::{FetchedIssue, SummaryDocument};
use crate::sources::NewsSource;
use crate::utils::char_len;

/// Per-run options passed to every summarizer.
#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    /// Free-form period hint such as `2025-09-01 ~ 2025-09-02`.
    pub timeframe: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Summarizer {
    SmolAi,
    WeeklyRobotics,
}

impl Summarizer {
    pub fn for_source(source: NewsSource) -> Self {
        match source {
            NewsSource::SmolAiNews => Summarizer::SmolAi,
            NewsSource::WeeklyRobotics => Summarizer::WeeklyRobotics,
        }
    }

    /// Summarizer for `url`, or for `forced` when given.
    pub fn for_url(url: &str, forced: Option<NewsSource>) -> RecapResult<Self> {
        NewsSource::resolve(url, forced).map(Self::for_source)
    }

    pub fn source(self) -> NewsSource {
        match self {
            Summarizer::SmolAi => NewsSource::SmolAiNews,
            Summarizer::WeeklyRobotics => NewsSource::WeeklyRobotics,
        }
    }

    #[instrument(level = "info", skip_all, fields(source = self.source().display_name(), url = %issue.url))]
    pub async fn summarize<C: AskAsync>(
        self,
        client: &C,
        issue: &FetchedIssue,
        options: &SummaryOptions,
    ) -> RecapResult<SummaryDocument> {
        let document = match self {
            Summarizer::SmolAi => {
                smol_ai::summarize(client, issue, options.timeframe.as_deref()).await?
            }
            Summarizer::WeeklyRobotics => weekly_robotics::summarize(client, issue).await?,
        };

        if document.markdown.trim().is_empty() {
            return Err(RecapError::EmptyResponse("summarizer"));
        }
        info!(
            chars = char_len(&document.markdown),
            headline = document.headline.as_deref().unwrap_or("-"),
            "Summary ready"
        );
        Ok(document)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use crate::api::{AskAsync, PromptBundle};
    use crate::error::{RecapError, RecapResult};

    /// Replays canned answers in order and records every prompt.
    pub struct Scripted {
        answers: Mutex<Vec<RecapResult<String>>>,
        pub prompts: Mutex<Vec<PromptBundle>>,
    }

    impl Scripted {
        pub fn new(answers: Vec<RecapResult<String>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn answering(answers: &[&str]) -> Self {
            Self::new(answers.iter().map(|a| Ok(a.to_string())).collect())
        }

        pub fn prompt(&self, i: usize) -> PromptBundle {
            self.prompts.lock().unwrap()[i].clone()
        }
    }

    impl AskAsync for Scripted {
        async fn ask(&self, prompt: &PromptBundle) -> RecapResult<String> {
            self.prompts.lock().unwrap().push(prompt.clone());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(RecapError::EmptyResponse("scripted")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_url() {
        assert_eq!(
            Summarizer::for_url("https://news.smol.ai/issues/25-09-01-x", None).unwrap(),
            Summarizer::SmolAi
        );
        assert_eq!(
            Summarizer::for_url("https://example.com/x", Some(NewsSource::WeeklyRobotics)).unwrap(),
            Summarizer::WeeklyRobotics
        );
        assert!(Summarizer::for_url("https://example.com/x", None).is_err());
    }

    #[test]
    fn test_source_round_trip() {
        for source in [NewsSource::SmolAiNews, NewsSource::WeeklyRobotics] {
            assert_eq!(Summarizer::for_source(source).source(), source);
        }
    }
}
