// SYNOID Render Pipeline
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// RenderRequest -> one ffmpeg command -> one output file.

pub mod audio;
pub mod command;
pub mod filters;
pub mod inputs;
pub mod probe;
pub mod runner;

pub use command::{build_command, RenderCommand};
pub use probe::DurationProber;
pub use runner::{FfmpegRunner, ProcessOutput, ProcessRunner, RenderOutcome, TimelineRenderer};
