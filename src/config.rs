// SYNOID Timeline Settings
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// settings.json loader. Every section and field has a default so partial
// files work; a missing file means "all defaults".

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, TimelineError};
use crate::timeline::{CaptionStyle, EncoderSettings, Resolution, SoftwareFallback, SubtitleStyle};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub video: VideoSettings,
    pub subtitle: SubtitleSettings,
    pub tts: TtsSettings,
    pub smart_effects: SmartEffectsSettings,
    pub binaries: BinarySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub resolution: Resolution,
    pub fps: u32,
    pub codec: String,
    pub preset: String,
    #[serde(deserialize_with = "text_or_number")]
    pub bitrate: Option<String>,
    pub threads: Option<u32>,
    pub gpu_acceleration: bool,
    pub gpu_preset: String,
    pub nvenc_cq: u32,
    /// Explicit NVENC arguments. Overrides the `-rc vbr -cq` default.
    pub nvenc_params: Option<Vec<serde_json::Value>>,
    pub audio_codec: String,
    pub default_bgm: Option<PathBuf>,
    pub default_image_duration: f64,
    pub show_narration_text: bool,
    pub use_tts_duration: bool,
    pub text_size: u32,
    pub estimated_bitrate_mb_per_min: f64,
    /// Upper bound for the analysis and resolution pool. Defaults to the
    /// CPU count, at most 8.
    pub workers: usize,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            fps: 24,
            codec: "libx264".to_string(),
            preset: "medium".to_string(),
            bitrate: None,
            threads: None,
            gpu_acceleration: false,
            gpu_preset: "p4".to_string(),
            nvenc_cq: 19,
            nvenc_params: None,
            audio_codec: "aac".to_string(),
            default_bgm: None,
            default_image_duration: 5.0,
            show_narration_text: true,
            use_tts_duration: true,
            text_size: 40,
            estimated_bitrate_mb_per_min: 5.0,
            workers: num_cpus::get().clamp(1, 8),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleSettings {
    pub font: Option<String>,
    pub font_size: u32,
    pub font_color: String,
    pub bg_color: String,
    /// Unparsable values become NaN and render as a half-transparent box.
    #[serde(deserialize_with = "lenient_f64")]
    pub bg_opacity: f64,
    pub alignment: u32,
    pub margin_v: u32,
}

impl Default for SubtitleSettings {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    pub enable_bgm_mixing: bool,
    pub bgm_volume: f64,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self { enable_bgm_mixing: true, bgm_volume: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartEffectsSettings {
    pub enable: bool,
    pub use_ai_analysis: bool,
    pub ken_burns_enabled: bool,
    pub render_transitions: bool,
}

impl Default for SmartEffectsSettings {
    fn default() -> Self {
        Self {
            enable: true,
            use_ai_analysis: false,
            ken_burns_enabled: true,
            render_transitions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarySettings {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub probe_timeout_secs: u64,
}

impl Default for BinarySettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            probe_timeout_secs: 10,
        }
    }
}

impl BinarySettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

impl Settings {
    /// Load `path`, falling back to defaults when it does not exist, then
    /// apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => {
                let parsed: Settings = serde_json::from_str(&content)
                    .map_err(|e| TimelineError::Config(format!("{}: {}", path.display(), e)))?;
                info!("[CONFIG] Loaded settings from {}", path.display());
                parsed
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[CONFIG] {} not found, using defaults", path.display());
                Settings::default()
            }
            Err(e) => return Err(TimelineError::Config(format!("{}: {}", path.display(), e))),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.normalize();
        Ok(settings)
    }

    /// Environment overrides, looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ffmpeg) = lookup("IMAGEIO_FFMPEG_EXE").filter(|v| !v.is_empty()) {
            info!("[CONFIG] ffmpeg from IMAGEIO_FFMPEG_EXE: {}", ffmpeg);
            self.binaries.ffmpeg = PathBuf::from(ffmpeg);
        }
        if let Some(ffprobe) = lookup("FFPROBE_BINARY").filter(|v| !v.is_empty()) {
            info!("[CONFIG] ffprobe from FFPROBE_BINARY: {}", ffprobe);
            self.binaries.ffprobe = PathBuf::from(ffprobe);
        }
    }

    /// Clamp values the renderer cannot use as-is.
    pub fn normalize(&mut self) {
        let even = self.video.resolution.even();
        if even != self.video.resolution {
            warn!("[CONFIG] Resolution {} rounded to {}", self.video.resolution, even);
            self.video.resolution = even;
        }
        if self.video.fps == 0 {
            warn!("[CONFIG] fps 0 is not renderable, using 24");
            self.video.fps = 24;
        }
        if !(self.tts.bgm_volume.is_finite() && (0.0..=1.0).contains(&self.tts.bgm_volume)) {
            let clamped = if self.tts.bgm_volume.is_finite() { self.tts.bgm_volume.clamp(0.0, 1.0) } else { 0.2 };
            warn!("[CONFIG] bgm_volume {} clamped to {}", self.tts.bgm_volume, clamped);
            self.tts.bgm_volume = clamped;
        }
        if !(self.video.default_image_duration.is_finite() && self.video.default_image_duration > 0.0) {
            self.video.default_image_duration = 5.0;
        }
        self.video.workers = self.video.workers.max(1);
    }

    /// GPU only when asked for and the codec is an NVENC one.
    pub fn use_gpu(&self) -> bool {
        self.video.gpu_acceleration && self.video.codec.contains("nvenc")
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        let video = &self.video;
        if !self.use_gpu() {
            return EncoderSettings {
                codec: video.codec.clone(),
                preset: video.preset.clone(),
                bitrate: video.bitrate.clone(),
                threads: video.threads,
                hardware_params: Vec::new(),
                fallback: None,
            };
        }

        let hardware_params = match video.nvenc_params.as_ref().filter(|p| !p.is_empty()) {
            Some(params) => params
                .iter()
                .map(|p| match p {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            None => vec!["-rc".into(), "vbr".into(), "-cq".into(), video.nvenc_cq.to_string()],
        };
        info!("[CONFIG] GPU encode: {} (preset {})", video.codec, video.gpu_preset);
        EncoderSettings {
            codec: video.codec.clone(),
            preset: video.gpu_preset.clone(),
            bitrate: video.bitrate.clone(),
            threads: video.threads,
            hardware_params,
            fallback: Some(SoftwareFallback {
                codec: "libx264".to_string(),
                preset: video.preset.clone(),
            }),
        }
    }

    /// Per-segment caption look, shared with the subtitle colours.
    pub fn caption_style(&self) -> CaptionStyle {
        let font_file = self
            .subtitle
            .font
            .as_ref()
            .map(PathBuf::from)
            .filter(|p| p.exists());
        let opacity = if self.subtitle.bg_opacity.is_finite() { self.subtitle.bg_opacity } else { 0.5 };
        CaptionStyle {
            font_size: self.video.text_size,
            font_color: self.subtitle.font_color.clone(),
            box_color: format!("{}@{}", self.subtitle.bg_color, opacity),
            box_border: 30,
            margin: 100,
            font_file,
        }
    }

    pub fn subtitle_style(&self) -> SubtitleStyle {
        SubtitleStyle {
            font: self.subtitle.font.clone(),
            font_size: self.subtitle.font_size,
            font_color: self.subtitle.font_color.clone(),
            bg_color: self.subtitle.bg_color.clone(),
            bg_opacity: self.subtitle.bg_opacity,
            alignment: self.subtitle.alignment,
            margin_v: self.subtitle.margin_v,
        }
    }
}

/// Accept `"8M"` or `8000000` for the same field.
fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load(Path::new("/no/such/settings.json")).unwrap();
        assert_eq!(settings.video.fps, 24);
        assert_eq!(settings.video.codec, "libx264");
        assert_eq!(settings.subtitle.font_size, 48);
        assert!(settings.tts.enable_bgm_mixing);
    }

    #[test]
    fn test_partial_file_and_normalize() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"video": {{"resolution": [1279, 721], "fps": 30, "bitrate": 8000000}},
                "subtitle": {{"bg_opacity": "half"}},
                "tts": {{"bgm_volume": 3.0}}}}"#
        )
        .unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.video.resolution, Resolution::new(1278, 720));
        assert_eq!(settings.video.fps, 30);
        assert_eq!(settings.video.bitrate.as_deref(), Some("8000000"));
        assert!(settings.subtitle.bg_opacity.is_nan());
        assert_eq!(settings.tts.bgm_volume, 1.0);
        assert_eq!(settings.video.preset, "medium");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(Settings::load(file.path()), Err(TimelineError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| match key {
            "IMAGEIO_FFMPEG_EXE" => Some("/opt/ffmpeg".to_string()),
            _ => None,
        });
        assert_eq!(settings.binaries.ffmpeg, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(settings.binaries.ffprobe, PathBuf::from("ffprobe"));
    }

    #[test]
    fn test_gpu_encoder_policy() {
        let mut settings = Settings::default();
        settings.video.codec = "h264_nvenc".into();
        assert!(!settings.use_gpu());
        assert_eq!(settings.encoder_settings().preset, "medium");

        settings.video.gpu_acceleration = true;
        let encoder = settings.encoder_settings();
        assert_eq!(encoder.preset, "p4");
        assert_eq!(encoder.hardware_params, vec!["-rc", "vbr", "-cq", "19"]);
        assert_eq!(encoder.fallback.as_ref().map(|f| f.codec.as_str()), Some("libx264"));

        settings.video.nvenc_params = Some(vec![serde_json::json!("-cq"), serde_json::json!(23)]);
        assert_eq!(settings.encoder_settings().hardware_params, vec!["-cq", "23"]);

        settings.video.codec = "libx264".into();
        assert!(settings.encoder_settings().fallback.is_none());
    }

    #[test]
    fn test_caption_style_from_subtitle_colours() {
        let mut settings = Settings::default();
        settings.subtitle.bg_color = "blue".into();
        settings.subtitle.bg_opacity = 0.7;
        let style = settings.caption_style();
        assert_eq!(style.box_color, "blue@0.7");
        assert_eq!(style.margin, 100);
        assert_eq!(style.font_size, 40);
        assert!(style.font_file.is_none());
    }
}
