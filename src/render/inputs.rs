// SYNOID Segment Inputs
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::render::probe::safe_arg_path;
use crate::timeline::{Resolution, SegmentSpec, SourceKind};

/// A video source shorter than its target by more than this is looped.
pub const LOOP_TOLERANCE: f64 = 0.05;

/// One segment's `-i`, plus the flags that must precede it.
#[derive(Debug, Clone, PartialEq)]
pub enum InputDirective {
    /// Single frame repeated forever; trim bounds it later.
    Image { path: PathBuf, fps: u32 },
    Video { path: PathBuf, looped: bool },
    /// Synthetic black frame at the output size.
    Color { resolution: Resolution, fps: u32 },
}

impl InputDirective {
    pub fn to_args(&self) -> Vec<String> {
        match self {
            InputDirective::Image { path, fps } => vec![
                "-loop".into(),
                "1".into(),
                "-framerate".into(),
                fps.to_string(),
                "-i".into(),
                path_arg(path),
            ],
            InputDirective::Video { path, looped } => stream_args(path, *looped),
            InputDirective::Color { resolution, fps } => vec![
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!("color=size={}:rate={}:color=black", resolution, fps),
            ],
        }
    }

    /// What the filter chain will actually read from this input.
    pub fn kind(&self) -> SourceKind {
        match self {
            InputDirective::Image { .. } => SourceKind::Image,
            InputDirective::Video { .. } => SourceKind::Video,
            InputDirective::Color { .. } => SourceKind::Color,
        }
    }

    pub fn is_looped(&self) -> bool {
        match self {
            InputDirective::Image { .. } => true,
            InputDirective::Video { looped, .. } => *looped,
            InputDirective::Color { .. } => false,
        }
    }
}

/// Narration clip or background music, appended after every segment input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInput {
    pub path: PathBuf,
    pub looped: bool,
}

impl AudioInput {
    pub fn new(path: impl Into<PathBuf>, looped: bool) -> Self {
        Self { path: path.into(), looped }
    }

    pub fn to_args(&self) -> Vec<String> {
        stream_args(&self.path, self.looped)
    }
}

fn stream_args(path: &Path, looped: bool) -> Vec<String> {
    let mut args = Vec::with_capacity(4);
    if looped {
        args.extend(["-stream_loop".to_string(), "-1".to_string()]);
    }
    args.extend(["-i".to_string(), path_arg(path)]);
    args
}

fn path_arg(path: &Path) -> String {
    safe_arg_path(path).to_string_lossy().into_owned()
}

/// True when a source of `probed` seconds cannot cover `target` seconds.
/// Unknown length counts as long enough.
pub fn needs_loop(probed: Option<f64>, target: f64) -> bool {
    probed.map_or(false, |d| d < target - LOOP_TOLERANCE)
}

/// Input directive for one segment given its probed source length.
pub fn segment_input(segment: &SegmentSpec, probed: Option<f64>, resolution: Resolution, fps: u32) -> InputDirective {
    match segment.usable_source() {
        Some((path, SourceKind::Image)) => InputDirective::Image { path: path.to_path_buf(), fps },
        Some((path, SourceKind::Video)) => {
            let looped = needs_loop(probed, segment.duration);
            if looped {
                debug!(
                    "[RENDER] Segment #{} source {:.2}s < {:.2}s, looping",
                    segment.index,
                    probed.unwrap_or_default(),
                    segment.duration
                );
            }
            InputDirective::Video { path: path.to_path_buf(), looped }
        }
        Some((_, SourceKind::Color)) | None => InputDirective::Color { resolution, fps },
    }
}

/// Directives for `segments` in the given order; `probed` lines up with it.
pub fn segment_inputs(
    segments: &[&SegmentSpec],
    probed: &[Option<f64>],
    resolution: Resolution,
    fps: u32,
) -> Vec<InputDirective> {
    segments
        .iter()
        .enumerate()
        .map(|(i, seg)| segment_input(seg, probed.get(i).copied().flatten(), resolution, fps))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, b"x").unwrap();
        p
    }

    #[test]
    fn test_image_input_loops_at_fps() {
        let dir = tempfile::tempdir().unwrap();
        let img = touch(dir.path(), "a.png");
        let seg = SegmentSpec::new(0, SourceKind::Image, 4.0).with_source(&img);
        let input = segment_input(&seg, None, Resolution::new(1280, 720), 30);
        assert_eq!(
            input.to_args(),
            vec!["-loop", "1", "-framerate", "30", "-i", img.to_str().unwrap()]
        );
    }

    #[test]
    fn test_short_video_is_looped() {
        let dir = tempfile::tempdir().unwrap();
        let clip = touch(dir.path(), "clip.mp4");
        let seg = SegmentSpec::new(0, SourceKind::Video, 6.0).with_source(&clip);
        let res = Resolution::default();
        assert!(segment_input(&seg, Some(4.0), res, 24).is_looped());
        assert!(!segment_input(&seg, Some(5.96), res, 24).is_looped());
        assert!(!segment_input(&seg, Some(10.0), res, 24).is_looped());
        assert!(!segment_input(&seg, None, res, 24).is_looped());
        assert_eq!(segment_input(&seg, Some(1.0), res, 24).to_args()[..2], ["-stream_loop", "-1"]);
    }

    #[test]
    fn test_color_fallback() {
        let seg = SegmentSpec::new(0, SourceKind::Video, 3.0).with_source("/gone/clip.mp4");
        let args = segment_input(&seg, None, Resolution::new(1280, 720), 25).to_args();
        assert_eq!(args, vec!["-f", "lavfi", "-i", "color=size=1280x720:rate=25:color=black"]);
    }

    #[test]
    fn test_kind_follows_directive() {
        let res = Resolution::new(640, 360);
        let seg = SegmentSpec::new(0, SourceKind::Image, 2.0).with_source("/gone/still.png");
        assert_eq!(segment_input(&seg, None, res, 24).kind(), SourceKind::Color);
        let dir = tempfile::tempdir().unwrap();
        let clip = touch(dir.path(), "clip.mkv");
        let seg = SegmentSpec::new(0, SourceKind::Video, 2.0).with_source(&clip);
        assert_eq!(segment_input(&seg, None, res, 24).kind(), SourceKind::Video);
    }

    #[test]
    fn test_audio_input_args() {
        assert_eq!(AudioInput::new("bgm.mp3", true).to_args(), vec!["-stream_loop", "-1", "-i", "bgm.mp3"]);
        assert_eq!(AudioInput::new("s1.mp3", false).to_args(), vec!["-i", "s1.mp3"]);
    }

    #[test]
    fn test_needs_loop_boundary() {
        assert!(needs_loop(Some(2.9), 3.0));
        assert!(!needs_loop(Some(2.96), 3.0));
        assert!(!needs_loop(None, 3.0));
    }
}
