//! Error alerts to a Discord webhook.
//!
//! [`ErrorWebhookLayer`] sits in the subscriber stack next to the console and
//! file layers. Every ERROR event becomes an [`ErrorReport`] and goes over an
//! unbounded channel to a background task, so logging never waits on HTTP.
//! Delivery failures are dropped silently.

use std::fmt;
use std::time::Duration;

use chrono::Local;
use serde_json::{Value, json};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::error::RecapResult;
use crate::utils::{truncate_for_log, truncate_with_ellipsis};

pub const REPORTER_NAME: &str = "News Bot Error Reporter";
const ERROR_COLOR: u32 = 0xFF0000;
const CONTEXT_MAX_CHARS: usize = 1000;
const TITLE_MAX_CHARS: usize = 250;
const TIMEOUT: Duration = Duration::from_secs(10);

/// Events from this module are never reported, or a failing webhook would
/// feed itself.
const OWN_TARGET: &str = module_path!();

/// One ERROR event, flattened for the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    pub target: String,
    pub module: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Structured fields other than the message, in recording order.
    pub fields: Vec<(String, String)>,
    pub timestamp: String,
}

impl ErrorReport {
    fn from_metadata(meta: &Metadata<'_>) -> Self {
        Self {
            message: String::new(),
            target: meta.target().to_string(),
            module: meta.module_path().map(str::to_string),
            file: meta.file().map(str::to_string),
            line: meta.line(),
            fields: Vec::new(),
            timestamp: Local::now().to_rfc3339(),
        }
    }

    /// `key = value` lines, with the source location first.
    pub fn context(&self) -> String {
        let mut lines = Vec::with_capacity(self.fields.len() + 1);
        if let Some(file) = &self.file {
            lines.push(format!("at {}:{}", file, self.line.unwrap_or(0)));
        }
        for (k, v) in &self.fields {
            lines.push(format!("{k} = {v}"));
        }
        lines.join("\n")
    }

    /// Discord webhook payload with one embed.
    pub fn to_embed_payload(&self) -> Value {
        let message = if self.message.is_empty() {
            "Unknown Error"
        } else {
            self.message.as_str()
        };
        let mut fields = vec![
            json!({
                "name": "📁 Module",
                "value": format!("`{}`", self.module.as_deref().unwrap_or("Unknown")),
                "inline": true,
            }),
            json!({
                "name": "📍 Line",
                "value": self.line.map_or_else(|| "Unknown".to_string(), |l| l.to_string()),
                "inline": true,
            }),
            json!({
                "name": "🎯 Target",
                "value": format!("`{}`", self.target),
                "inline": true,
            }),
        ];
        let context = self.context();
        if !context.is_empty() {
            fields.push(json!({
                "name": "📋 Context",
                "value": format!("```\n{}\n```", truncate_with_ellipsis(&context, CONTEXT_MAX_CHARS)),
                "inline": false,
            }));
        }

        json!({
            "username": REPORTER_NAME,
            "embeds": [{
                "title": truncate_with_ellipsis(&format!("🚨 ERROR: {message}"), TITLE_MAX_CHARS),
                "color": ERROR_COLOR,
                "timestamp": self.timestamp,
                "fields": fields,
            }],
        })
    }
}

struct ReportVisitor<'a>(&'a mut ErrorReport);

impl Visit for ReportVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.message = value.to_string();
        } else {
            self.0.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.0.message = value;
        } else {
            self.0.fields.push((field.name().to_string(), value));
        }
    }
}

/// Posts [`ErrorReport`]s to the webhook.
#[derive(Debug, Clone)]
pub struct ErrorNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl ErrorNotifier {
    pub fn new(webhook_url: impl Into<String>) -> RecapResult<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(TIMEOUT).build()?,
            webhook_url: webhook_url.into(),
        })
    }

    /// Returns whether the webhook accepted the report.
    pub async fn send(&self, report: &ErrorReport) -> bool {
        let result = self
            .http
            .post(&self.webhook_url)
            .json(&report.to_embed_payload())
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::debug!(status = resp.status().as_u16(), "Error webhook rejected report");
                false
            }
            Err(e) => {
                tracing::debug!(error = %truncate_for_log(&e.to_string(), 200), "Error webhook unreachable");
                false
            }
        }
    }

    async fn forward(self, mut rx: UnboundedReceiver<ErrorReport>) {
        while let Some(report) = rx.recv().await {
            self.send(&report).await;
        }
    }
}

/// Subscriber layer that forwards ERROR events to an [`ErrorNotifier`].
pub struct ErrorWebhookLayer {
    tx: UnboundedSender<ErrorReport>,
}

impl ErrorWebhookLayer {
    /// Layer plus the receiving end, for callers that drive delivery
    /// themselves.
    pub fn channel() -> (Self, UnboundedReceiver<ErrorReport>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawn the forwarding task on the current runtime.
    pub fn spawn(notifier: ErrorNotifier) -> Self {
        let (layer, rx) = Self::channel();
        tokio::spawn(notifier.forward(rx));
        layer
    }
}

impl<S: Subscriber> Layer<S> for ErrorWebhookLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() != Level::ERROR || meta.target() == OWN_TARGET {
            return;
        }
        let mut report = ErrorReport::from_metadata(meta);
        event.record(&mut ReportVisitor(&mut report));
        // The receiver is gone only during shutdown.
        let _ = self.tx.send(report);
    }
}
