//! Command handlers.
//!
//! `run` is the two-stage pipeline: the full summary goes to GitHub
//! Discussions, then a compact re-summary that links back to the discussion
//! goes to Discord, and the today's-summary section goes to KakaoTalk. Every
//! artifact is saved under the output directory and the run ends with a JSON
//! record of what was delivered where.

use std::error::Error;
use std::path::Path;

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::api::AskAsync;
use crate::citations::{self, CitationCleaner};
use crate::cli::{CleanArgs, DiscussionsArgs, KakaoArgs, PublishArgs, RunArgs, sibling_path};
use crate::config::Config;
use crate::error::RecapResult;
use crate::markdown::{
    add_today_summary, extract_today_summary, read_markdown, save_markdown, split_by_sections,
    validate_markdown,
};
use crate::models::{ChannelReport, DeliveryOutcome, RunRecord};
use crate::outputs::json::write_run_record;
use crate::outputs::{OutputLayout, write_text};
use crate::publishers::kakao::prepare_text;
use crate::publishers::{self, Channel, Delivery, GitHubPublisher, Publisher};
use crate::sources::{NewsSource, fetch_issue};
use crate::summarizers::compact::CompactSummarizer;
use crate::summarizers::{Summarizer, SummaryOptions};
use crate::transcode::{KeepUrls, ShortLinks, TinyUrlShortener, to_plain_dialect_shortened};
use crate::utils::{char_len, date_label, ensure_writable_dir, today_label};

static FILE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})(\d{2})(\d{2})").expect("valid file date regex"));

/// The full `run` pipeline over a set of publishers.
pub struct Workflow<'a, C> {
    config: &'a Config,
    client: C,
    publishers: Vec<Publisher>,
}

impl<'a, C: AskAsync> Workflow<'a, C> {
    pub fn new(config: &'a Config, client: C, publishers: Vec<Publisher>) -> Self {
        Self {
            config,
            client,
            publishers,
        }
    }

    /// Deliver to `channel` unless it is switched off, the run is dry or the
    /// channel is not configured. Returns the created URL, if any.
    async fn dispatch(
        &self,
        channel: Channel,
        wanted: bool,
        dry_run: bool,
        delivery: &Delivery<'_>,
        record: &mut RunRecord,
    ) -> Option<String> {
        let outcome = if !wanted {
            DeliveryOutcome::skipped("disabled by flag")
        } else if dry_run {
            DeliveryOutcome::skipped("dry run")
        } else {
            match publishers::find(&self.publishers, channel) {
                Some(publisher) => publisher.deliver_logged(delivery).await,
                None => DeliveryOutcome::skipped("not configured"),
            }
        };

        if let DeliveryOutcome::Skipped { reason } = &outcome {
            info!(%channel, %reason, "Channel skipped");
        }
        let url = match &outcome {
            DeliveryOutcome::Delivered { url } => url.clone(),
            _ => None,
        };
        record.record(channel, outcome);
        url
    }

    #[instrument(level = "info", skip_all, fields(url = %args.url, dry_run = args.dry_run))]
    pub async fn run(&self, args: &RunArgs) -> RecapResult<RunRecord> {
        let layout = OutputLayout::now(&self.config.output_dir);
        let summarizer = Summarizer::for_url(&args.url, args.source)?;
        let mut record = RunRecord {
            started_at: Local::now().to_rfc3339(),
            source_url: args.url.clone(),
            source: Some(summarizer.source()),
            dry_run: args.dry_run,
            ..RunRecord::default()
        };
        info!(source = summarizer.source().display_name(), "Starting run");

        // Full summary
        let issue = fetch_issue(&args.url).await?;
        let options = SummaryOptions {
            timeframe: args.timeframe.clone(),
        };
        let document = summarizer.summarize(&self.client, &issue, &options).await?;
        let title = document.title(args.title.as_deref());
        info!(%title, "Summary generated");
        if !validate_markdown(&document.markdown) {
            warn!("Summary has no header or is very short");
        }
        record.title = Some(title.clone());
        record.headline = document.headline.clone();
        record.full_path = Some(layout.save_full(&document.markdown).await?);

        let full = Delivery {
            title: &title,
            full: &document.markdown,
            kakao_full: args.kakao_full,
            ..Delivery::default()
        };

        // GitHub first, so the compact version can link to the discussion.
        let discussion_url = self
            .dispatch(Channel::GitHub, !args.no_github, args.dry_run, &full, &mut record)
            .await;
        record.discussion_url = discussion_url.clone();

        let compact = CompactSummarizer::new(&self.client)
            .summarize(&document.markdown, discussion_url.as_deref())
            .await;
        record.compact_path = Some(layout.save_compact(&compact.markdown).await?);

        let chat = Delivery {
            compact: Some(&compact.markdown),
            ..full
        };
        self.dispatch(Channel::Discord, !args.no_discord, args.dry_run, &chat, &mut record)
            .await;

        // Without a today's-summary section the bot gets the compact version.
        let kakao_source = if extract_today_summary(&document.markdown).is_empty() && !compact.fallback {
            add_today_summary(&document.markdown, &compact.markdown)
        } else {
            document.markdown.clone()
        };
        let kakao = Delivery {
            full: &kakao_source,
            ..full
        };
        if !args.no_kakao {
            let preview = prepare_text(
                &kakao_source,
                args.kakao_full,
                self.config.kakao_max_length,
                &ShortLinks::new(),
            );
            if let Some(text) = preview {
                record.kakao_path = Some(layout.save_kakao(&text).await?);
            }
        }
        self.dispatch(Channel::Kakao, !args.no_kakao, args.dry_run, &kakao, &mut record)
            .await;

        record.finished_at = Some(Local::now().to_rfc3339());
        if let Err(e) = write_run_record(&record, &layout).await {
            error!(error = %e, "Failed to write run record");
        }

        for report in &record.deliveries {
            info!(channel = %report.channel, outcome = ?report.outcome, "Run result");
        }
        Ok(record)
    }
}

/// `[AI News, yy.mm.dd] AI 뉴스 요약`, dated from a `YYYYMMDD` in the file
/// name or today.
pub fn title_from_file(path: &Path) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let date = FILE_DATE_RE
        .captures(name)
        .and_then(|c| {
            NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
        })
        .map(date_label)
        .unwrap_or_else(today_label);
    let source = NewsSource::SmolAiNews;
    format!("[{}, {}] {}", source.label(), date, source.default_headline(None))
}

/// Entry point for `run`.
pub async fn run_command(config: &Config, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    config.validate()?;
    ensure_writable_dir(&config.output_dir).await?;

    let client = crate::api::client_with_backoff(config)?;
    let publishers = Publisher::enabled(config, true)?;
    let record = Workflow::new(config, client, publishers).run(args).await?;

    match record.failures() {
        0 => Ok(()),
        n => Err(format!("{n} deliveries failed").into()),
    }
}

/// Entry point for `publish`.
#[instrument(level = "info", skip_all, fields(file = %args.file.display()))]
pub async fn publish_command(config: &Config, args: &PublishArgs) -> Result<(), Box<dyn Error>> {
    let content = read_markdown(&args.file).await?;
    if !validate_markdown(&content) {
        warn!("File has no header or is very short; publishing anyway");
    }
    let title = match args.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            let t = title_from_file(&args.file);
            info!(title = %t, "Generated title from file name");
            t
        }
    };

    let channels: Vec<Channel> = if args.all_channels() {
        config.enabled_channels()
    } else {
        [
            (args.github, Channel::GitHub),
            (args.discord, Channel::Discord),
            (args.kakao, Channel::Kakao),
        ]
        .into_iter()
        .filter_map(|(on, channel)| on.then_some(channel))
        .collect()
    };
    if channels.is_empty() {
        warn!("No channel is configured; nothing to publish");
        return Ok(());
    }

    let delivery = Delivery {
        title: &title,
        full: &content,
        tag: args.tag.as_deref(),
        kakao_full: args.kakao_full,
        ..Delivery::default()
    };

    if args.dry_run {
        for (header, body) in split_by_sections(&content) {
            info!(section = %header, chars = char_len(&body), "Would publish section");
        }
    }

    let mut reports = Vec::with_capacity(channels.len());
    for channel in channels {
        let outcome = if args.dry_run {
            info!(%channel, %title, chars = char_len(&content), "Dry run; not publishing");
            DeliveryOutcome::skipped("dry run")
        } else {
            match Publisher::for_channel(channel, config, true) {
                Ok(publisher) => publisher.deliver_logged(&delivery).await,
                Err(e) => {
                    error!(%channel, error = %e, "Channel not configured");
                    DeliveryOutcome::failed(e)
                }
            }
        };
        reports.push(ChannelReport { channel, outcome });
    }

    let failed = reports.iter().filter(|r| r.outcome.is_failure()).count();
    for report in &reports {
        info!(channel = %report.channel, outcome = ?report.outcome, "Publish result");
    }
    match failed {
        0 => Ok(()),
        n => Err(format!("{n} deliveries failed").into()),
    }
}

/// Entry point for `clean`.
#[instrument(level = "info", skip_all, fields(input = %args.input.display(), offline = args.offline))]
pub async fn clean_command(config: &Config, args: &CleanArgs) -> Result<(), Box<dyn Error>> {
    let content = read_markdown(&args.input).await?;

    let (markdown, headline) = if args.offline {
        let parts = citations::extract_headline(&citations::deduplicate(&content));
        (parts.body, parts.headline)
    } else {
        config.validate()?;
        let client = crate::api::client_with_backoff(config)?;
        let cleaned = CitationCleaner::new(&client).clean(&content).await;
        (cleaned.markdown, cleaned.headline)
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| sibling_path(&args.input, "_cleaned.md"));
    save_markdown(&output, &markdown).await?;
    info!(
        output = %output.display(),
        before = char_len(&content),
        after = char_len(&markdown),
        headline = headline.as_deref().unwrap_or("-"),
        "Cleaned citations"
    );
    Ok(())
}

/// Entry point for `kakao`.
#[instrument(level = "info", skip_all, fields(input = %args.input.display()))]
pub async fn kakao_command(args: &KakaoArgs) -> Result<(), Box<dyn Error>> {
    let content = read_markdown(&args.input).await?;
    let text = if args.no_shorten {
        to_plain_dialect_shortened(&content, &KeepUrls).await
    } else {
        to_plain_dialect_shortened(&content, &TinyUrlShortener::new()?).await
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| sibling_path(&args.input, "_kakao.txt"));
    write_text(&output, &text).await?;
    info!(output = %output.display(), chars = char_len(&text), "Converted to Kakao text");
    Ok(())
}

/// Entry point for `discussions`.
pub async fn discussions_command(
    config: &Config,
    args: &DiscussionsArgs,
) -> Result<(), Box<dyn Error>> {
    let github = GitHubPublisher::from_config(config)?;
    let discussions = github.list_discussions(args.limit).await?;
    info!(target_repo = %github.target(), count = discussions.len(), "Listed discussions");

    for d in &discussions {
        let category = d.category.as_ref().map(|c| c.name.as_str()).unwrap_or("-");
        println!("{}  [{}] {}\n    {}", d.created_at, category, d.title, d.url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::EnvArgs;
    use crate::config::FileConfig;
    use crate::error::RecapError;
    use crate::publishers::{DiscordPublisher, KakaoPublisher};
    use crate::summarizers::testing::Scripted;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ISSUE_HTML: &str = r#"<html><body><article>
        <h1>not much happened today</h1>
        <h2>AI Twitter Recap</h2>
        <ul><li><a href="https://x.com/openai/status/1961129789944627207">gpt-realtime</a> launched</li></ul>
        </article></body></html>"#;

    fn config(output_dir: &Path) -> Config {
        let file = FileConfig {
            output_dir: Some(output_dir.to_path_buf()),
            ..FileConfig::default()
        };
        Config::resolve(&EnvArgs::default(), file, false)
    }

    fn run_args(url: String) -> RunArgs {
        RunArgs {
            url,
            source: Some(NewsSource::SmolAiNews),
            timeframe: None,
            title: None,
            no_github: true,
            no_discord: false,
            no_kakao: false,
            kakao_full: false,
            dry_run: false,
        }
    }

    async fn issue_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues/25-09-01-not-much"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ISSUE_HTML))
            .mount(&server)
            .await;
        server
    }

    fn answers(issue_url: &str) -> Scripted {
        let summary = format!(
            "**헤드라인: 음성 모델 출시**\n\n## AI Twitter Recap\n\n- [gpt-realtime]([LINK_0001]) 출시\n\n## 오늘의 요약\n\n- 첫째 소식\n\n출처: [원문]({issue_url})"
        );
        Scripted::new(vec![
            Ok(summary),
            Err(RecapError::EmptyResponse("cleanup")),
            Ok("# AI News 25.09.01\n\n• 음성 모델 출시".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_run_delivers_and_records() {
        let server = issue_server().await;
        Mock::given(method("POST"))
            .and(path("/discord"))
            .and(body_string_contains("음성 모델 출시"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/kakao"))
            .and(body_string_contains("첫째 소식"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let issue_url = format!("{}/issues/25-09-01-not-much", server.uri());
        let publishers = vec![
            Publisher::Discord(
                DiscordPublisher::new(format!("{}/discord", server.uri()), "News Bot", 1900).unwrap(),
            ),
            Publisher::Kakao(KakaoPublisher::new(format!("{}/kakao", server.uri()), 1000, None).unwrap()),
        ];
        let client = answers(&issue_url);

        let record = Workflow::new(&config, &client, publishers)
            .run(&run_args(issue_url.clone()))
            .await
            .unwrap();

        assert_eq!(record.title.as_deref(), Some("[AI News, 25.09.01] 음성 모델 출시"));
        assert_eq!(record.failures(), 0);
        let outcomes: Vec<_> = record
            .deliveries
            .iter()
            .map(|r| (r.channel, r.outcome.clone()))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                (Channel::GitHub, DeliveryOutcome::skipped("disabled by flag")),
                (Channel::Discord, DeliveryOutcome::Delivered { url: None }),
                (Channel::Kakao, DeliveryOutcome::Delivered { url: None }),
            ]
        );

        let full = std::fs::read_to_string(record.full_path.as_ref().unwrap()).unwrap();
        assert!(full.contains("(https://x.com/openai/status/1961129789944627207)"));
        let kakao = std::fs::read_to_string(record.kakao_path.as_ref().unwrap()).unwrap();
        assert!(kakao.starts_with("[오늘의 요약]"));
        assert!(record.compact_path.as_ref().unwrap().exists());
    }

    #[tokio::test]
    async fn test_dry_run_publishes_nothing() {
        let server = issue_server().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let issue_url = format!("{}/issues/25-09-01-not-much", server.uri());
        let publishers = vec![Publisher::Discord(
            DiscordPublisher::new(format!("{}/discord", server.uri()), "News Bot", 1900).unwrap(),
        )];
        let client = answers(&issue_url);

        let mut args = run_args(issue_url);
        args.dry_run = true;
        args.no_github = false;
        let record = Workflow::new(&config, &client, publishers).run(&args).await.unwrap();

        assert!(record.dry_run);
        assert!(record.discussion_url.is_none());
        assert!(
            record
                .deliveries
                .iter()
                .all(|r| r.outcome == DeliveryOutcome::skipped("dry run"))
        );
        assert!(record.full_path.as_ref().unwrap().exists());

        // No discussion was created, so the compact prompt has no link to use.
        assert!(client.prompt(2).user.contains("GitHub Discussion 링크"));
    }

    #[tokio::test]
    async fn test_unconfigured_channel_is_skipped() {
        let server = issue_server().await;
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let issue_url = format!("{}/issues/25-09-01-not-much", server.uri());
        let client = answers(&issue_url);

        let record = Workflow::new(&config, &client, Vec::new())
            .run(&run_args(issue_url))
            .await
            .unwrap();
        assert_eq!(
            record.deliveries[1].outcome,
            DeliveryOutcome::skipped("not configured")
        );
    }

    #[test]
    fn test_title_from_file() {
        assert_eq!(
            title_from_file(Path::new("outputs/smol_ai_news_20250901.md")),
            "[AI News, 25.09.01] AI 뉴스 요약"
        );
        assert_eq!(
            title_from_file(Path::new("outputs/2025/09/full/full_20250902_090000.md")),
            "[AI News, 25.09.02] AI 뉴스 요약"
        );
        assert!(title_from_file(Path::new("summary.md")).starts_with("[AI News, "));
    }

    #[tokio::test]
    async fn test_clean_offline_writes_sibling() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("summary.md");
        std::fs::write(
            &input,
            "## Recap\n\n- item [출처](https://a.io/1) [출처](https://a.io/1)\n",
        )
        .unwrap();

        let args = CleanArgs {
            input: input.clone(),
            output: None,
            offline: true,
        };
        clean_command(&config(tmp.path()), &args).await.unwrap();

        let cleaned = std::fs::read_to_string(tmp.path().join("summary_cleaned.md")).unwrap();
        assert_eq!(cleaned.matches("https://a.io/1").count(), 1);
    }

    #[tokio::test]
    async fn test_kakao_without_shortening() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("summary.md");
        std::fs::write(&input, "## 오늘의 요약\n\n- **첫째** [링크](https://a.io/x)\n").unwrap();

        let args = KakaoArgs {
            input,
            output: None,
            no_shorten: true,
        };
        kakao_command(&args).await.unwrap();

        let text = std::fs::read_to_string(tmp.path().join("summary_kakao.txt")).unwrap();
        assert_eq!(text, "[오늘의 요약]\n\nㆍ 첫째 링크 (https://a.io/x)");
    }
}
