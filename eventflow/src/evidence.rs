use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::FlowError;
use crate::ScreenshotResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn tag(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Writes screenshots as `<prefix>-<outcome>-<YYYYmmdd-HHMMSS>.png`
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    dir: PathBuf,
}

impl EvidenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free path for this prefix/outcome/time. An existing file gets a
    /// `-<n>` counter appended before the extension.
    pub fn path_for(&self, prefix: &str, outcome: Outcome, at: DateTime<Utc>) -> PathBuf {
        let stem = format!("{prefix}-{}-{}", outcome.tag(), at.format("%Y%m%d-%H%M%S"));
        let mut candidate = self.dir.join(format!("{stem}.png"));
        let mut counter = 1;
        while candidate.exists() {
            candidate = self.dir.join(format!("{stem}-{counter}.png"));
            counter += 1;
        }
        candidate
    }

    pub fn save(
        &self,
        prefix: &str,
        outcome: Outcome,
        screenshot: &ScreenshotResult,
    ) -> Result<PathBuf, FlowError> {
        self.save_at(prefix, outcome, screenshot, Utc::now())
    }

    pub fn save_at(
        &self,
        prefix: &str,
        outcome: Outcome,
        screenshot: &ScreenshotResult,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, FlowError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| FlowError::Evidence {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(prefix, outcome, at);
        std::fs::write(&path, &screenshot.png).map_err(|source| FlowError::Evidence {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), %outcome, bytes = screenshot.png.len(), "Saved evidence screenshot");
        Ok(path)
    }
}
