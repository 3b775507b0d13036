// SYNOID Script Contracts
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Shapes produced by the script writer and the TTS stage, as they land on
// disk. Only the fields the timeline needs are modelled.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, TimelineError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<ScriptSection>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TimelineError::Script(format!("cannot read script {:?}: {}", path, e)))?;
        serde_json::from_str(&content)
            .map_err(|e| TimelineError::Script(format!("malformed script {:?}: {}", path, e)))
    }
}

/// One narrated section of a script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptSection {
    /// Explicit archetype tag ("hook", "summary", ...), when the writer set one.
    #[serde(default, rename = "section")]
    pub section_tag: Option<String>,
    #[serde(default)]
    pub section_name: String,
    #[serde(default)]
    pub narration: String,
    #[serde(default, alias = "visual_notes")]
    pub visual_hint: String,
    #[serde(default)]
    pub duration: Option<NominalDuration>,
    /// Material pinned by hand in the script.
    #[serde(default, alias = "material")]
    pub material_path: Option<PathBuf>,
}

impl ScriptSection {
    /// Nominal duration in seconds, or `default` when missing or unparsable.
    pub fn nominal_seconds(&self, default: f64) -> f64 {
        self.duration
            .as_ref()
            .and_then(NominalDuration::seconds)
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(default)
    }
}

/// Script writers emit durations as numbers or as text ("15s", "15秒").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NominalDuration {
    Seconds(f64),
    Text(String),
}

impl NominalDuration {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            NominalDuration::Seconds(s) => Some(*s),
            NominalDuration::Text(text) => parse_duration_text(text),
        }
    }
}

/// First decimal number found in `text`.
pub fn parse_duration_text(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let mut seen_dot = false;
    let number: String = text[start..]
        .chars()
        .take_while(|c| {
            if c.is_ascii_digit() {
                true
            } else if *c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                false
            }
        })
        .collect();
    number.trim_end_matches('.').parse().ok()
}

/// TTS stage output: one clip per narrated section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsMetadata {
    #[serde(default)]
    pub audio_files: Vec<TtsClip>,
    /// Overall length the TTS stage reports; cross-checked, never trusted.
    #[serde(default)]
    pub total_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsClip {
    /// 1-based index of the section this clip narrates.
    #[serde(default)]
    pub section_index: Option<usize>,
    #[serde(default)]
    pub section_name: Option<String>,
    pub file_path: PathBuf,
    #[serde(default)]
    pub duration: f64,
}

impl TtsMetadata {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TimelineError::Script(format!("cannot read TTS metadata {:?}: {}", path, e)))?;
        serde_json::from_str(&content)
            .map_err(|e| TimelineError::Script(format!("malformed TTS metadata {:?}: {}", path, e)))
    }

    /// How far the declared `total_duration` is from the sum of the clip
    /// durations, when that gap exceeds `tolerance`.
    pub fn total_mismatch(&self, tolerance: f64) -> Option<f64> {
        let declared = self.total_duration.filter(|t| t.is_finite())?;
        let summed: f64 = self.audio_files.iter().map(|c| c.duration).sum();
        let gap = declared - summed;
        (gap.abs() > tolerance).then_some(gap)
    }

    /// Clips whose audio file is actually on disk, in metadata order.
    pub fn available_clips(&self) -> Vec<&TtsClip> {
        self.audio_files
            .iter()
            .filter(|clip| {
                let exists = clip.file_path.exists();
                if !exists {
                    warn!("[TTS] Missing audio file, ignoring: {:?}", clip.file_path);
                }
                exists
            })
            .collect()
    }

    /// Map available clips onto `section_count` slots.
    ///
    /// A clip with `section_index` goes to that section; one without goes to
    /// its position among the available clips.
    pub fn align(&self, section_count: usize) -> Vec<Option<TtsClip>> {
        let mut slots: Vec<Option<TtsClip>> = vec![None; section_count];
        for (position, clip) in self.available_clips().into_iter().enumerate() {
            let slot = match clip.section_index {
                Some(one_based) => one_based.checked_sub(1),
                None => Some(position),
            };
            match slot {
                Some(i) if i < section_count => {
                    if slots[i].is_some() {
                        warn!("[TTS] Section {} has more than one clip, keeping the first", i + 1);
                        continue;
                    }
                    slots[i] = Some(clip.clone());
                }
                _ => debug!("[TTS] Clip {:?} does not map to any section", clip.file_path),
            }
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_total_cross_check() {
        let clip = |duration: f64| TtsClip {
            section_index: None,
            section_name: None,
            file_path: PathBuf::from("x.mp3"),
            duration,
        };
        let mut meta = TtsMetadata { audio_files: vec![clip(3.2), clip(4.0)], total_duration: Some(7.2) };
        assert_eq!(meta.total_mismatch(1.0), None);
        meta.total_duration = Some(10.0);
        let gap = meta.total_mismatch(1.0).unwrap();
        assert!((gap - 2.8).abs() < 1e-9);
        meta.total_duration = None;
        assert_eq!(meta.total_mismatch(1.0), None);
    }

    #[test]
    fn test_parse_duration_text_variants() {
        assert_eq!(parse_duration_text("15秒"), Some(15.0));
        assert_eq!(parse_duration_text("110秒"), Some(110.0));
        assert_eq!(parse_duration_text("15s"), Some(15.0));
        assert_eq!(parse_duration_text("about 7.5 seconds"), Some(7.5));
        assert_eq!(parse_duration_text("1.2.3"), Some(1.2));
        assert_eq!(parse_duration_text("5."), Some(5.0));
        assert_eq!(parse_duration_text("soon"), None);
    }

    #[test]
    fn test_nominal_seconds_defaults() {
        let mut section = ScriptSection::default();
        assert_eq!(section.nominal_seconds(5.0), 5.0);
        section.duration = Some(NominalDuration::Text("12秒".into()));
        assert_eq!(section.nominal_seconds(5.0), 12.0);
        section.duration = Some(NominalDuration::Seconds(0.0));
        assert_eq!(section.nominal_seconds(5.0), 5.0);
    }

    #[test]
    fn test_section_deserializes_production_shape() {
        let json = r#"{
            "section": "hook",
            "section_name": "开场钩子",
            "narration": "你知道吗？",
            "visual_notes": "macro shot",
            "duration": "15秒"
        }"#;
        let section: ScriptSection = serde_json::from_str(json).unwrap();
        assert_eq!(section.section_tag.as_deref(), Some("hook"));
        assert_eq!(section.visual_hint, "macro shot");
        assert_eq!(section.nominal_seconds(5.0), 15.0);
    }

    #[test]
    fn test_tts_align_by_section_index_and_position() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"x").unwrap();

        let indexed = TtsMetadata {
            audio_files: vec![
                TtsClip { section_index: Some(1), section_name: None, file_path: a.clone(), duration: 3.2 },
                TtsClip { section_index: Some(3), section_name: None, file_path: b.clone(), duration: 4.0 },
                TtsClip { section_index: Some(2), section_name: None, file_path: dir.path().join("gone.mp3"), duration: 9.0 },
            ],
            total_duration: None,
        };
        let slots = indexed.align(3);
        assert_eq!(slots[0].as_ref().map(|c| c.duration), Some(3.2));
        assert!(slots[1].is_none());
        assert_eq!(slots[2].as_ref().map(|c| c.duration), Some(4.0));

        let positional = TtsMetadata {
            audio_files: vec![
                TtsClip { section_index: None, section_name: None, file_path: a, duration: 1.0 },
                TtsClip { section_index: None, section_name: None, file_path: b, duration: 2.0 },
            ],
            total_duration: Some(3.0),
        };
        let slots = positional.align(3);
        assert_eq!(slots[1].as_ref().map(|c| c.duration), Some(2.0));
        assert!(slots[2].is_none());
    }
}
