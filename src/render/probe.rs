// SYNOID Duration Probe
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// ffprobe wrapper. A probe never fails the pipeline: every failure is logged
// and reported as "unknown", which callers treat as "long enough".

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ProbeFailure {
    #[error("file does not exist")]
    Missing,
    #[error("ffprobe timed out after {0:?}")]
    TimedOut(Duration),
    #[error("could not launch ffprobe: {0}")]
    Launch(#[from] std::io::Error),
    #[error("no usable duration in ffprobe output: {0}")]
    Unparsable(String),
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeEntry>,
    #[serde(default)]
    format: Option<ProbeEntry>,
}

#[derive(Debug, Deserialize)]
struct ProbeEntry {
    #[serde(default)]
    duration: Option<String>,
}

/// Keep a path from being read as a flag by the child process.
pub fn safe_arg_path(path: &Path) -> PathBuf {
    if path.to_string_lossy().starts_with('-') {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

#[derive(Debug, Clone)]
pub struct DurationProber {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl Default for DurationProber {
    fn default() -> Self {
        Self::new("ffprobe", DEFAULT_PROBE_TIMEOUT)
    }
}

impl DurationProber {
    pub fn new(ffprobe: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { ffprobe: ffprobe.into(), timeout }
    }

    /// Duration in seconds, or `None` when it cannot be determined.
    pub async fn probe(&self, path: &Path) -> Option<f64> {
        match self.try_probe(path).await {
            Ok(seconds) => {
                debug!("[PROBE] {:?}: {:.3}s", path, seconds);
                Some(seconds)
            }
            Err(e) => {
                warn!("[PROBE] {:?}: {} (assuming long enough)", path, e);
                None
            }
        }
    }

    pub async fn try_probe(&self, path: &Path) -> Result<f64, ProbeFailure> {
        if !path.exists() {
            return Err(ProbeFailure::Missing);
        }

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.ffprobe)
                .kill_on_drop(true)
                .args([
                    "-v",
                    "error",
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=duration:format=duration",
                    "-of",
                    "json",
                ])
                .arg(safe_arg_path(path))
                .output(),
        )
        .await
        .map_err(|_| ProbeFailure::TimedOut(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeFailure::Unparsable(stderr.trim().to_string()));
        }
        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Probe many paths at once, at most `concurrency` in flight.
    /// Results line up with `paths`.
    pub async fn probe_many(&self, paths: &[PathBuf], concurrency: usize) -> Vec<Option<f64>> {
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut set = JoinSet::new();
        for (i, path) in paths.iter().cloned().enumerate() {
            let prober = self.clone();
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (i, prober.probe(&path).await)
            });
        }

        let mut results = vec![None; paths.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, duration)) => results[i] = duration,
                Err(e) => warn!("[PROBE] Probe task failed: {}", e),
            }
        }
        results
    }
}

/// Video stream duration first, container duration second.
fn parse_probe_output(stdout: &str) -> Result<f64, ProbeFailure> {
    let parsed: ProbeOutput =
        serde_json::from_str(stdout).map_err(|e| ProbeFailure::Unparsable(e.to_string()))?;

    let as_seconds = |entry: &ProbeEntry| {
        entry
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    };

    parsed
        .streams
        .iter()
        .find_map(as_seconds)
        .or_else(|| parsed.format.as_ref().and_then(as_seconds))
        .ok_or_else(|| ProbeFailure::Unparsable(stdout.trim().to_string()))
}
