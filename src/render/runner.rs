// SYNOID Render Runner
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Executes a RenderRequest: validate, probe sources, build the command, run
// ffmpeg. A failing hardware encode gets exactly one software retry. A failed
// or cancelled render never leaves its output file behind.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TimelineError};
use crate::render::command::{build_command, RenderCommand};
use crate::render::probe::DurationProber;
use crate::timeline::{EncoderSettings, RenderRequest, Resolution, SegmentSpec, SourceKind};

/// What an external process reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

/// Seam between command assembly and the OS.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &RenderCommand) -> Result<ProcessOutput>;
}

/// Runs commands with `tokio::process`. The child dies with the future.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner;

#[async_trait]
impl ProcessRunner for FfmpegRunner {
    async fn run(&self, command: &RenderCommand) -> Result<ProcessOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TimelineError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Encoder state for one render.
#[derive(Debug, Clone, PartialEq)]
enum EncodeAttempt {
    Primary(EncoderSettings),
    Fallback(EncoderSettings),
}

impl EncodeAttempt {
    fn encoder(&self) -> &EncoderSettings {
        match self {
            EncodeAttempt::Primary(e) | EncodeAttempt::Fallback(e) => e,
        }
    }

    /// Next state after a failure, if any.
    fn after_failure(&self, err: &TimelineError) -> Option<EncodeAttempt> {
        match self {
            EncodeAttempt::Primary(primary) if err.is_render_failure() && primary.is_hardware() => {
                primary.fallback_settings().map(EncodeAttempt::Fallback)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub output_path: PathBuf,
    /// Sum of segment durations, seconds.
    pub duration: f64,
    pub segment_count: usize,
    pub resolution: Resolution,
    pub codec: String,
    pub used_fallback: bool,
    pub has_audio: bool,
    pub fingerprint: String,
}

pub struct TimelineRenderer {
    ffmpeg: PathBuf,
    prober: DurationProber,
    runner: Arc<dyn ProcessRunner>,
    probe_concurrency: usize,
}

impl TimelineRenderer {
    pub fn new(ffmpeg: impl Into<PathBuf>, prober: DurationProber) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            prober,
            runner: Arc::new(FfmpegRunner),
            probe_concurrency: 4,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = concurrency.max(1);
        self
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    /// Command the primary encoder would run, without executing anything.
    pub async fn preview(&self, request: &RenderRequest) -> Result<RenderCommand> {
        request.validate()?;
        let probed = self.probe_sources(&request.ordered_segments()).await;
        Ok(build_command(&self.ffmpeg, request, &request.encoder, &probed))
    }

    pub async fn render(&self, request: &RenderRequest) -> Result<RenderOutcome> {
        self.render_with_cancel(request, std::future::pending::<()>()).await
    }

    /// Render, aborting the process as soon as `cancel` resolves.
    pub async fn render_with_cancel<F>(&self, request: &RenderRequest, cancel: F) -> Result<RenderOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        request.validate()?;
        let segments = request.ordered_segments();
        info!(
            "[RENDER] {} segments, {:.2}s at {} {}fps -> {:?}",
            segments.len(),
            request.total_duration(),
            request.resolution,
            request.fps,
            request.output_path
        );
        let probed = self.probe_sources(&segments).await;

        tokio::pin!(cancel);
        let mut attempt = EncodeAttempt::Primary(request.encoder.clone());
        loop {
            let command = build_command(&self.ffmpeg, request, attempt.encoder(), &probed);
            let fingerprint = command.fingerprint();
            info!("[RENDER] Encoding with {} ({})", attempt.encoder().codec, &fingerprint[..12]);
            debug!("[RENDER] {}", command);

            let result = tokio::select! {
                biased;
                _ = &mut cancel => Err(TimelineError::Cancelled),
                output = self.runner.run(&command) => output.and_then(|out| check_output(&command, out)),
            };

            match result {
                Ok(()) => {
                    info!("[RENDER] Done: {:?}", request.output_path);
                    return Ok(RenderOutcome {
                        output_path: request.output_path.clone(),
                        duration: request.total_duration(),
                        segment_count: segments.len(),
                        resolution: request.resolution,
                        codec: attempt.encoder().codec.clone(),
                        used_fallback: matches!(attempt, EncodeAttempt::Fallback(_)),
                        has_audio: command.has_audio(),
                        fingerprint,
                    });
                }
                Err(err) => {
                    remove_partial_output(&request.output_path).await;
                    match attempt.after_failure(&err) {
                        Some(next) => {
                            warn!(
                                "[RENDER] {} failed, retrying once with {}",
                                attempt.encoder().codec,
                                next.encoder().codec
                            );
                            attempt = next;
                        }
                        None => {
                            if matches!(err, TimelineError::Cancelled) {
                                warn!("[RENDER] Cancelled, output discarded");
                            } else {
                                error!("[RENDER] {}", err);
                            }
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    /// Probe every usable video source. Output lines up with `segments`.
    async fn probe_sources(&self, segments: &[&SegmentSpec]) -> Vec<Option<f64>> {
        let targets: Vec<(usize, PathBuf)> = segments
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s.usable_source() {
                Some((path, SourceKind::Video)) => Some((i, path.to_path_buf())),
                _ => None,
            })
            .collect();

        let mut durations = vec![None; segments.len()];
        if targets.is_empty() {
            return durations;
        }
        let paths: Vec<PathBuf> = targets.iter().map(|(_, p)| p.clone()).collect();
        let probed = self.prober.probe_many(&paths, self.probe_concurrency).await;
        for ((i, _), duration) in targets.iter().zip(probed) {
            durations[*i] = duration;
        }
        durations
    }
}

fn check_output(command: &RenderCommand, output: ProcessOutput) -> Result<()> {
    if output.success {
        return Ok(());
    }
    Err(TimelineError::Render {
        command: command.to_string(),
        code: output.code,
        stderr: output.stderr,
    })
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("[RENDER] Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("[RENDER] Could not remove partial output {:?}: {}", path, e),
    }
}
