// SYNOID Timeline Model
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Request-scoped value objects handed to the renderer. Nothing here is
// persisted or shared; a RenderRequest is built, validated, rendered, dropped.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::agent::ken_burns::KenBurnsMotion;
use crate::agent::transition_engine::TransitionDecision;
use crate::error::{Result, TimelineError};

/// Where a segment's pixels come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Video,
    Image,
    /// Synthetic solid fill; also the fallback when no usable source exists.
    Color,
}

impl SourceKind {
    const VIDEO_EXTS: [&'static str; 5] = ["mp4", "mov", "mkv", "avi", "webm"];
    const IMAGE_EXTS: [&'static str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

    /// Classify a material file by extension. Unknown extensions get `Color`.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if Self::VIDEO_EXTS.contains(&ext.as_str()) {
            SourceKind::Video
        } else if Self::IMAGE_EXTS.contains(&ext.as_str()) {
            SourceKind::Image
        } else {
            SourceKind::Color
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Round each dimension down to an even number (minimum 2).
    pub fn even(self) -> Self {
        let fix = |v: u32| (v - v % 2).max(2);
        Self { width: fix(self.width), height: fix(self.height) }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Map { width: u32, height: u32 },
            Pair([u32; 2]),
        }
        Ok(match Shape::deserialize(deserializer)? {
            Shape::Map { width, height } => Resolution::new(width, height),
            Shape::Pair([width, height]) => Resolution::new(width, height),
        })
    }
}

/// Burned-in caption appearance for the per-segment drawtext stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionStyle {
    pub font_size: u32,
    pub font_color: String,
    pub box_color: String,
    pub box_border: u32,
    /// Distance of the caption block from the bottom edge.
    pub margin: u32,
    #[serde(default)]
    pub font_file: Option<PathBuf>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 40,
            font_color: "white".to_string(),
            box_color: "black@0.5".to_string(),
            box_border: 30,
            margin: 80,
            font_file: None,
        }
    }
}

/// One timeline unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    /// Order key. Concatenation follows this, not list position.
    pub index: usize,
    pub source_path: Option<PathBuf>,
    pub source_kind: SourceKind,
    /// Seconds, strictly positive.
    pub duration: f64,
    pub caption: Option<String>,
    pub section_name: String,
    pub caption_style: CaptionStyle,
    /// Camera movement, image segments only.
    #[serde(default)]
    pub motion: Option<KenBurnsMotion>,
    /// Entrance effect from the previous segment.
    #[serde(default)]
    pub transition: Option<TransitionDecision>,
}

impl SegmentSpec {
    pub fn new(index: usize, source_kind: SourceKind, duration: f64) -> Self {
        Self {
            index,
            source_path: None,
            source_kind,
            duration,
            caption: None,
            section_name: String::new(),
            caption_style: CaptionStyle::default(),
            motion: None,
            transition: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_section_name(mut self, name: impl Into<String>) -> Self {
        self.section_name = name.into();
        self
    }

    pub fn with_motion(mut self, motion: KenBurnsMotion) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn with_transition(mut self, transition: TransitionDecision) -> Self {
        self.transition = Some(transition);
        self
    }

    /// The source that will actually be read, or `None` for a color fill.
    ///
    /// A declared video/image whose file is gone degrades to color.
    pub fn usable_source(&self) -> Option<(&Path, SourceKind)> {
        if self.source_kind == SourceKind::Color {
            return None;
        }
        let path = self.source_path.as_deref()?;
        if !path.exists() {
            warn!(
                "[TIMELINE] Segment #{} source missing, using color fill: {:?}",
                self.index, path
            );
            return None;
        }
        Some((path, self.source_kind))
    }

    pub fn effective_kind(&self) -> SourceKind {
        self.usable_source().map(|(_, kind)| kind).unwrap_or(SourceKind::Color)
    }
}

/// Narration and background music for the whole render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPlan {
    pub use_tts: bool,
    pub tts_inputs: Vec<PathBuf>,
    /// Same length as `tts_inputs`.
    pub tts_durations: Vec<f64>,
    /// Timeline start of each clip in seconds, same length as `tts_inputs`.
    /// Empty means the clips play back to back from zero.
    #[serde(default)]
    pub tts_offsets: Vec<f64>,
    pub bgm_path: Option<PathBuf>,
    /// 0..=1
    pub bgm_volume: f64,
    /// Seconds the BGM is trimmed to.
    pub target_duration: f64,
    pub audio_codec: String,
}

impl Default for AudioPlan {
    fn default() -> Self {
        Self {
            use_tts: false,
            tts_inputs: Vec::new(),
            tts_durations: Vec::new(),
            tts_offsets: Vec::new(),
            bgm_path: None,
            bgm_volume: 0.2,
            target_duration: 0.0,
            audio_codec: "aac".to_string(),
        }
    }
}

impl AudioPlan {
    pub fn has_tts(&self) -> bool {
        self.use_tts && !self.tts_inputs.is_empty()
    }

    pub fn has_bgm(&self) -> bool {
        self.bgm_path.is_some()
    }

    pub fn tts_total(&self) -> f64 {
        self.tts_durations.iter().sum()
    }

    /// True when every clip starts where the previous one ends, so a plain
    /// concat places them correctly.
    pub fn narration_is_contiguous(&self) -> bool {
        let mut cursor = 0.0;
        for (offset, duration) in self.tts_offsets.iter().zip(&self.tts_durations) {
            if (offset - cursor).abs() > OFFSET_TOLERANCE {
                return false;
            }
            cursor += duration;
        }
        true
    }

    /// Where the last narration clip stops on the timeline.
    pub fn narration_end(&self) -> f64 {
        if self.tts_offsets.is_empty() {
            return self.tts_total();
        }
        self.tts_offsets
            .iter()
            .zip(&self.tts_durations)
            .map(|(offset, duration)| offset + duration)
            .fold(0.0, f64::max)
    }
}

/// Offsets this close to the running clip total count as back to back.
const OFFSET_TOLERANCE: f64 = 0.001;

/// Software encoder tried once if the primary one fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareFallback {
    pub codec: String,
    pub preset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub codec: String,
    pub preset: String,
    pub bitrate: Option<String>,
    pub threads: Option<u32>,
    /// Extra encoder arguments, passed through verbatim after `-threads`.
    pub hardware_params: Vec<String>,
    pub fallback: Option<SoftwareFallback>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "medium".to_string(),
            bitrate: None,
            threads: None,
            hardware_params: Vec::new(),
            fallback: None,
        }
    }
}

impl EncoderSettings {
    pub fn is_h264_family(&self) -> bool {
        self.codec.starts_with("h264") || self.codec.contains("x264")
    }

    pub fn is_hardware(&self) -> bool {
        ["nvenc", "qsv", "vaapi", "amf", "videotoolbox"]
            .iter()
            .any(|hw| self.codec.contains(hw))
    }

    /// NVENC takes rate control through its own params, not `-b:v`.
    pub fn rejects_bitrate(&self) -> bool {
        self.codec.contains("nvenc")
    }

    /// Settings for the single retry, if one is configured.
    pub fn fallback_settings(&self) -> Option<EncoderSettings> {
        let fallback = self.fallback.as_ref()?;
        Some(EncoderSettings {
            codec: fallback.codec.clone(),
            preset: fallback.preset.clone(),
            bitrate: self.bitrate.clone(),
            threads: self.threads,
            hardware_params: Vec::new(),
            fallback: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStyle {
    #[serde(default)]
    pub font: Option<String>,
    pub font_size: u32,
    pub font_color: String,
    pub bg_color: String,
    /// 0..=1; anything else maps to a half-transparent box.
    pub bg_opacity: f64,
    pub alignment: u32,
    pub margin_v: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 48,
            font_color: "white".to_string(),
            bg_color: "black".to_string(),
            bg_opacity: 0.5,
            alignment: 2,
            margin_v: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleOverlay {
    pub path: PathBuf,
    pub style: SubtitleStyle,
}

/// Everything the renderer needs for one output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub segments: Vec<SegmentSpec>,
    pub output_path: PathBuf,
    pub resolution: Resolution,
    pub fps: u32,
    pub encoder: EncoderSettings,
    pub audio: Option<AudioPlan>,
    /// When present, per-segment captions are suppressed.
    pub subtitles: Option<SubtitleOverlay>,
}

impl RenderRequest {
    pub fn new(segments: Vec<SegmentSpec>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            segments,
            output_path: output_path.into(),
            resolution: Resolution::default(),
            fps: 24,
            encoder: EncoderSettings::default(),
            audio: None,
            subtitles: None,
        }
    }

    /// Segments sorted by their `index`.
    pub fn ordered_segments(&self) -> Vec<&SegmentSpec> {
        let mut ordered: Vec<&SegmentSpec> = self.segments.iter().collect();
        ordered.sort_by_key(|s| s.index);
        ordered
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn captions_enabled(&self) -> bool {
        self.subtitles.is_none()
    }

    /// Reject anything that would make the renderer fail or lie.
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(TimelineError::InvalidRequest("no segments to render".into()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(TimelineError::InvalidRequest("output path is empty".into()));
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(TimelineError::InvalidRequest(format!(
                "resolution {} has a zero dimension",
                self.resolution
            )));
        }
        if self.fps == 0 {
            return Err(TimelineError::InvalidRequest("fps must be > 0".into()));
        }

        let mut seen = HashSet::new();
        for segment in &self.segments {
            if !segment.duration.is_finite() || segment.duration <= 0.0 {
                return Err(TimelineError::invalid_segment(
                    segment.index,
                    &segment.section_name,
                    format!("duration must be > 0, got {}", segment.duration),
                ));
            }
            if !seen.insert(segment.index) {
                return Err(TimelineError::InvalidRequest(format!(
                    "segment index {} appears more than once",
                    segment.index
                )));
            }
        }

        if let Some(audio) = &self.audio {
            if audio.tts_inputs.len() != audio.tts_durations.len() {
                return Err(TimelineError::InvalidRequest(format!(
                    "{} narration clips but {} durations",
                    audio.tts_inputs.len(),
                    audio.tts_durations.len()
                )));
            }
            if !audio.tts_offsets.is_empty() {
                if audio.tts_offsets.len() != audio.tts_inputs.len() {
                    return Err(TimelineError::InvalidRequest(format!(
                        "{} narration clips but {} offsets",
                        audio.tts_inputs.len(),
                        audio.tts_offsets.len()
                    )));
                }
                if let Some(bad) = audio.tts_offsets.iter().find(|o| !o.is_finite() || **o < 0.0) {
                    return Err(TimelineError::InvalidRequest(format!("narration offset {} is not a valid start time", bad)));
                }
            }
            if !audio.bgm_volume.is_finite() || !(0.0..=1.0).contains(&audio.bgm_volume) {
                return Err(TimelineError::InvalidRequest(format!(
                    "bgm volume {} outside 0..=1",
                    audio.bgm_volume
                )));
            }
            if audio.has_bgm() && !(audio.target_duration.is_finite() && audio.target_duration > 0.0) {
                return Err(TimelineError::InvalidRequest(
                    "background music needs a positive target duration".into(),
                ));
            }
        }

        if let Some(subtitles) = &self.subtitles {
            if !subtitles.path.exists() {
                return Err(TimelineError::InvalidRequest(format!(
                    "subtitle file not found: {}",
                    subtitles.path.display()
                )));
            }
        }
        Ok(())
    }
}
