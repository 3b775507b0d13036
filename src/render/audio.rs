// SYNOID Audio Graph
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Narration concat (or per-section placement), background music loop/trim,
// and the mix between them. Audio inputs always come after every video input.

use tracing::debug;

use crate::render::inputs::AudioInput;
use crate::timeline::AudioPlan;

pub const TTS_LABEL: &str = "[atts]";
pub const BGM_LABEL: &str = "[bgmtrim]";
pub const MIX_LABEL: &str = "[amix]";

/// Audio half of a render command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioGraph {
    pub inputs: Vec<AudioInput>,
    pub filters: Vec<String>,
    /// Final label to map, `None` for a silent render.
    pub label: Option<String>,
}

impl AudioGraph {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn is_silent(&self) -> bool {
        self.label.is_none()
    }
}

/// Build the audio graph. `first_input` is the number of video inputs.
pub fn build_audio_graph(plan: Option<&AudioPlan>, first_input: usize) -> AudioGraph {
    let plan = match plan {
        Some(plan) => plan,
        None => return AudioGraph::silent(),
    };

    let mut graph = AudioGraph::default();
    let mut current: Option<&'static str> = None;

    if plan.has_tts() {
        for path in &plan.tts_inputs {
            graph.inputs.push(AudioInput::new(path.clone(), false));
        }
        if plan.narration_is_contiguous() {
            graph.filters.push(concat_narration(plan.tts_inputs.len(), first_input));
        } else {
            graph.filters.extend(place_narration(&plan.tts_offsets, first_input));
        }
        current = Some(TTS_LABEL);
    }

    if let Some(bgm) = &plan.bgm_path {
        let bgm_index = first_input + graph.inputs.len();
        graph.inputs.push(AudioInput::new(bgm.clone(), true));
        graph.filters.push(format!(
            "[{}:a]aloop=loop=-1:size=0,asetpts=N/SR/TB,atrim=duration={:.6},asetpts=PTS-STARTPTS,volume={}{}",
            bgm_index, plan.target_duration, plan.bgm_volume, BGM_LABEL
        ));
        current = Some(match current {
            Some(tts) => {
                graph.filters.push(format!(
                    "{}{}amix=inputs=2:normalize=0:dropout_transition=0{}",
                    tts, BGM_LABEL, MIX_LABEL
                ));
                MIX_LABEL
            }
            None => BGM_LABEL,
        });
    }

    graph.label = current.map(String::from);
    debug!(
        "[AUDIO] {} inputs, {} filters, final label {:?}",
        graph.inputs.len(),
        graph.filters.len(),
        graph.label
    );
    graph
}

/// Clips back to back from zero, timestamps renumbered across the joins.
fn concat_narration(count: usize, first_input: usize) -> String {
    let labels: String = (0..count).map(|i| format!("[{}:a]", first_input + i)).collect();
    format!("{}concat=n={}:v=0:a=1,asetpts=N/SR/TB{}", labels, count, TTS_LABEL)
}

/// Each clip delayed to its own start, silence between, then mixed.
fn place_narration(offsets: &[f64], first_input: usize) -> Vec<String> {
    let delayed = |i: usize, label: &str| {
        let ms = (offsets[i] * 1000.0).round() as u64;
        format!("[{}:a]asetpts=PTS-STARTPTS,adelay=delays={}:all=1{}", first_input + i, ms, label)
    };
    if offsets.len() == 1 {
        return vec![delayed(0, TTS_LABEL)];
    }
    let labels: Vec<String> = (0..offsets.len()).map(|i| format!("[tts{}]", i)).collect();
    let mut filters: Vec<String> = labels.iter().enumerate().map(|(i, label)| delayed(i, label)).collect();
    filters.push(format!(
        "{}amix=inputs={}:normalize=0:dropout_transition=0{}",
        labels.concat(),
        offsets.len(),
        TTS_LABEL
    ));
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tts_plan() -> AudioPlan {
        AudioPlan {
            use_tts: true,
            tts_inputs: vec![PathBuf::from("s1.mp3"), PathBuf::from("s2.mp3")],
            tts_durations: vec![3.2, 4.1],
            target_duration: 7.3,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_plan_is_silent() {
        assert!(build_audio_graph(None, 3).is_silent());
        assert!(build_audio_graph(Some(&AudioPlan::default()), 3).is_silent());
    }

    #[test]
    fn test_tts_only() {
        let graph = build_audio_graph(Some(&tts_plan()), 3);
        assert_eq!(graph.inputs.len(), 2);
        assert_eq!(graph.filters, vec!["[3:a][4:a]concat=n=2:v=0:a=1,asetpts=N/SR/TB[atts]"]);
        assert_eq!(graph.label.as_deref(), Some(TTS_LABEL));
    }

    #[test]
    fn test_back_to_back_offsets_still_concat() {
        let plan = AudioPlan { tts_offsets: vec![0.0, 3.2], ..tts_plan() };
        let graph = build_audio_graph(Some(&plan), 3);
        assert_eq!(graph.filters, vec!["[3:a][4:a]concat=n=2:v=0:a=1,asetpts=N/SR/TB[atts]"]);
    }

    #[test]
    fn test_unnarrated_sections_leave_silence() {
        // clips for sections 1 and 3 of 5s + 5s + 4s
        let plan = AudioPlan { tts_offsets: vec![0.0, 10.0], ..tts_plan() };
        let graph = build_audio_graph(Some(&plan), 3);
        assert_eq!(
            graph.filters,
            vec![
                "[3:a]asetpts=PTS-STARTPTS,adelay=delays=0:all=1[tts0]",
                "[4:a]asetpts=PTS-STARTPTS,adelay=delays=10000:all=1[tts1]",
                "[tts0][tts1]amix=inputs=2:normalize=0:dropout_transition=0[atts]",
            ]
        );
        assert_eq!(graph.label.as_deref(), Some(TTS_LABEL));
    }

    #[test]
    fn test_single_late_clip_is_delayed() {
        let plan = AudioPlan {
            use_tts: true,
            tts_inputs: vec![PathBuf::from("s3.mp3")],
            tts_durations: vec![3.2],
            tts_offsets: vec![10.0],
            target_duration: 13.2,
            ..Default::default()
        };
        let graph = build_audio_graph(Some(&plan), 3);
        assert_eq!(graph.filters, vec!["[3:a]asetpts=PTS-STARTPTS,adelay=delays=10000:all=1[atts]"]);
    }

    #[test]
    fn test_tts_ignored_when_disabled() {
        let plan = AudioPlan { use_tts: false, ..tts_plan() };
        let graph = build_audio_graph(Some(&plan), 1);
        assert!(graph.inputs.is_empty());
        assert!(graph.is_silent());
    }

    #[test]
    fn test_bgm_only_trimmed_to_target() {
        let plan = AudioPlan {
            bgm_path: Some(PathBuf::from("bgm.mp3")),
            bgm_volume: 0.2,
            target_duration: 15.0,
            ..Default::default()
        };
        let graph = build_audio_graph(Some(&plan), 3);
        assert_eq!(graph.inputs, vec![AudioInput::new("bgm.mp3", true)]);
        assert_eq!(
            graph.filters[0],
            "[3:a]aloop=loop=-1:size=0,asetpts=N/SR/TB,atrim=duration=15.000000,asetpts=PTS-STARTPTS,volume=0.2[bgmtrim]"
        );
        assert_eq!(graph.label.as_deref(), Some(BGM_LABEL));
    }

    #[test]
    fn test_tts_and_bgm_mix_without_normalize() {
        let plan = AudioPlan { bgm_path: Some(PathBuf::from("bgm.mp3")), ..tts_plan() };
        let graph = build_audio_graph(Some(&plan), 3);
        assert_eq!(graph.inputs.len(), 3);
        assert!(graph.filters[1].starts_with("[5:a]aloop"));
        assert_eq!(graph.filters[2], "[atts][bgmtrim]amix=inputs=2:normalize=0:dropout_transition=0[amix]");
        assert_eq!(graph.label.as_deref(), Some(MIX_LABEL));
    }
}
