//! Date-partitioned persistence of everything a run produces.
//!
//! # Output Structure
//!
//! ```text
//! outputs/
//! └── 2025/
//!     └── 09/
//!         ├── full/full_20250901_090000.md
//!         ├── compact/compact_20250901_090000.md
//!         ├── kakao/kakao_20250901_090000.txt
//!         └── runs/run_20250901_090000.json
//! ```
//!
//! All files of one run share the timestamp taken when the [`OutputLayout`]
//! was created.

pub mod json;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::RecapResult;
use crate::markdown::save_markdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Full,
    Compact,
    Kakao,
    Run,
}

impl OutputKind {
    fn dir(self) -> &'static str {
        match self {
            OutputKind::Full => "full",
            OutputKind::Compact => "compact",
            OutputKind::Kakao => "kakao",
            OutputKind::Run => "runs",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            OutputKind::Run => "run",
            other => other.dir(),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OutputKind::Full | OutputKind::Compact => "md",
            OutputKind::Kakao => "txt",
            OutputKind::Run => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    stamp: DateTime<Local>,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, stamp: DateTime<Local>) -> Self {
        Self {
            root: root.into(),
            stamp,
        }
    }

    pub fn now(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Local::now())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root/YYYY/MM/<dir>/<kind>_YYYYMMDD_HHMMSS.<ext>`
    pub fn path(&self, kind: OutputKind) -> PathBuf {
        self.root
            .join(self.stamp.format("%Y").to_string())
            .join(self.stamp.format("%m").to_string())
            .join(kind.dir())
            .join(format!(
                "{}_{}.{}",
                kind.prefix(),
                self.stamp.format("%Y%m%d_%H%M%S"),
                kind.extension()
            ))
    }

    pub async fn save_full(&self, markdown: &str) -> RecapResult<PathBuf> {
        let path = self.path(OutputKind::Full);
        save_markdown(&path, markdown).await?;
        Ok(path)
    }

    pub async fn save_compact(&self, markdown: &str) -> RecapResult<PathBuf> {
        let path = self.path(OutputKind::Compact);
        save_markdown(&path, markdown).await?;
        Ok(path)
    }

    /// Plain text is written as-is.
    #[instrument(level = "info", skip_all)]
    pub async fn save_kakao(&self, text: &str) -> RecapResult<PathBuf> {
        let path = self.path(OutputKind::Kakao);
        write_text(&path, text).await?;
        Ok(path)
    }
}

/// Create the parent directory, then write.
pub(crate) async fn write_text(path: &Path, contents: &str) -> RecapResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }
    fs::write(path, contents).await?;
    info!(path = %path.display(), bytes = contents.len(), "Wrote output file");
    Ok(())
}
