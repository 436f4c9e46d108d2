//! Subscriber setup: console, daily log file and error webhook.

use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use crate::config::Config;
use crate::notifier::{ErrorNotifier, ErrorWebhookLayer};

/// `news_recap_YYYYMMDD.log` under `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("news_recap_{}.log", Local::now().format("%Y%m%d")))
}

/// `RUST_LOG` wins; otherwise the configured level.
fn filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Install the global subscriber. Fails when one is already installed.
///
/// Must run inside the tokio runtime when the error webhook is configured.
pub fn init(config: &Config) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&config.log_dir)?;
    let log_path = log_file_path(&config.log_dir);
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let stdout_layer = tfmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let file_layer = tfmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(Mutex::new(file));

    let webhook_layer = match &config.error_webhook_url {
        Some(url) => Some(ErrorWebhookLayer::spawn(ErrorNotifier::new(url.clone())?)),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter(config))
        .with(stdout_layer)
        .with(file_layer)
        .with(webhook_layer)
        .try_init()?;

    info!(
        log_file = %log_path.display(),
        error_alerts = config.error_notification_enabled(),
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::EnvArgs;
    use crate::config::FileConfig;

    #[test]
    fn test_log_file_name() {
        let path = log_file_path(Path::new("logs"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("news_recap_"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "news_recap_20250901.log".len());
    }

    #[test]
    fn test_init_twice_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let env = EnvArgs {
            log_dir: Some(tmp.path().join("logs")),
            ..EnvArgs::default()
        };
        let config = Config::resolve(&env, FileConfig::default(), false);

        init(&config).unwrap();
        assert!(log_file_path(&config.log_dir).exists());
        assert!(init(&config).is_err());
    }
}
