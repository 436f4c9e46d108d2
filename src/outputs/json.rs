//! JSON run records.
//!
//! One [`RunRecord`] per `run`, written next to the markdown it describes:
//! `{output_dir}/YYYY/MM/runs/run_YYYYMMDD_HHMMSS.json`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, instrument};

use super::{OutputKind, OutputLayout, write_text};
use crate::error::RecapResult;
use crate::models::RunRecord;

/// Write `record` pretty-printed and return its path.
#[instrument(level = "info", skip_all, fields(output_dir = %layout.root().display()))]
pub async fn write_run_record(record: &RunRecord, layout: &OutputLayout) -> RecapResult<PathBuf> {
    let json = serde_json::to_string_pretty(record)?;
    let path = layout.path(OutputKind::Run);
    write_text(&path, &json).await?;
    info!(
        path = %path.display(),
        deliveries = record.deliveries.len(),
        failures = record.failures(),
        "Wrote run record"
    );
    Ok(path)
}

pub async fn read_run_record(path: &Path) -> RecapResult<RunRecord> {
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryOutcome;
    use crate::publishers::Channel;
    use crate::sources::NewsSource;

    #[tokio::test]
    async fn test_run_record_written_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::now(tmp.path());

        let mut record = RunRecord {
            source_url: "https://news.smol.ai/issues/25-09-01-not-much".into(),
            source: Some(NewsSource::SmolAiNews),
            ..RunRecord::default()
        };
        record.record(
            Channel::GitHub,
            DeliveryOutcome::Delivered {
                url: Some("https://github.com/o/r/discussions/1".into()),
            },
        );
        record.record(Channel::Kakao, DeliveryOutcome::failed("Kakao returned 500: boom"));

        let path = write_run_record(&record, &layout).await.unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"channel\": \"github\""));
        assert!(raw.contains("\"status\": \"failed\""));

        let back = read_run_record(&path).await.unwrap();
        assert_eq!(back.failures(), 1);
        assert_eq!(back.deliveries, record.deliveries);
    }
}
