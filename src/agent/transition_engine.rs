// SYNOID Transition Engine
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Picks the cut between two adjacent sections from their semantic profiles.
// Pure and deterministic: identical profiles always give an identical
// decision.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::agent::semantic_analyzer::{Emotion, Pace, SectionType, SemanticProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    ZoomIn,
    ZoomOut,
    SlideLeft,
    SlideRight,
    HardCut,
    Crossfade,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::ZoomIn => "zoom_in",
            TransitionKind::ZoomOut => "zoom_out",
            TransitionKind::SlideLeft => "slide_left",
            TransitionKind::SlideRight => "slide_right",
            TransitionKind::HardCut => "hard_cut",
            TransitionKind::Crossfade => "crossfade",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TransitionKind::Fade => "smooth fade, suits narrative content",
            TransitionKind::ZoomIn => "zoom in, emphasises a key point",
            TransitionKind::ZoomOut => "zoom out, widens toward a conclusion",
            TransitionKind::SlideLeft => "slide left, moves the story forward",
            TransitionKind::SlideRight => "slide right, looks back or contrasts",
            TransitionKind::HardCut => "hard cut, fast high-impact change",
            TransitionKind::Crossfade => "crossfade, continues related content",
        }
    }

    /// Seconds before pace scaling.
    pub fn base_duration(&self) -> f64 {
        match self {
            TransitionKind::Fade => 1.0,
            TransitionKind::ZoomIn => 0.8,
            TransitionKind::ZoomOut => 1.2,
            TransitionKind::SlideLeft | TransitionKind::SlideRight => 0.6,
            TransitionKind::HardCut => 0.0,
            TransitionKind::Crossfade => 1.5,
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    EaseIn,
    EaseOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideSpeed {
    Fast,
    Normal,
}

/// Kind-specific tuning attached to a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "param", rename_all = "snake_case")]
pub enum TransitionParams {
    Zoom { zoom_ratio: f64, easing: Easing },
    Slide { speed: SlideSpeed },
    Fade { fade_curve: String },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDecision {
    pub kind: TransitionKind,
    /// Seconds, rounded to 2 decimals.
    pub duration: f64,
    pub params: TransitionParams,
    /// Diagnostic only. Never parsed.
    pub reason: String,
}

impl TransitionDecision {
    pub fn zoom_ratio(&self) -> Option<f64> {
        match self.params {
            TransitionParams::Zoom { zoom_ratio, .. } => Some(zoom_ratio),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmotionShift {
    Escalate,
    DeEscalate,
    Maintain,
}

impl EmotionShift {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionShift::Escalate => "escalate",
            EmotionShift::DeEscalate => "de-escalate",
            EmotionShift::Maintain => "maintain",
        }
    }
}

/// Tunable emotion ladder. Heuristic, reported in the reason string only.
#[derive(Debug, Clone, Copy)]
pub struct EmotionRanking;

impl EmotionRanking {
    pub fn rank(&self, emotion: Emotion) -> i32 {
        match emotion {
            Emotion::Excitement => 5,
            Emotion::Motivated | Emotion::Inspired => 4,
            Emotion::Curiosity | Emotion::Focus => 3,
            Emotion::Satisfied => 2,
            Emotion::Calm => 1,
        }
    }

    pub fn classify(&self, prev: Emotion, curr: Emotion) -> EmotionShift {
        let (p, c) = (self.rank(prev), self.rank(curr));
        if c > p + 1 {
            EmotionShift::Escalate
        } else if c < p - 1 {
            EmotionShift::DeEscalate
        } else {
            EmotionShift::Maintain
        }
    }
}

/// Fixed pairings between archetypes.
fn pair_rule(prev: SectionType, curr: SectionType) -> Option<(TransitionKind, &'static str)> {
    use SectionType::*;
    use TransitionKind::*;
    let rule = match (prev, curr) {
        (Hook, Introduction) => (ZoomOut, "hook into introduction eases down"),
        (Hook, Background) => (Fade, "high-energy hook settles into background"),
        (Introduction, Background) => (Fade, "introduction flows into background"),
        (Introduction, MainContent) => (SlideLeft, "introduction advances to the core"),
        (Background, MainContent) => (ZoomIn, "background focuses onto the core"),
        (Background, Application) => (SlideLeft, "background advances to application"),
        (MainContent, Application) => (SlideLeft, "theory advances to practice"),
        (MainContent, Summary) => (ZoomOut, "core widens into the summary"),
        (MainContent, MainContent) => (Crossfade, "core content continues"),
        (Application, Summary) => (Fade, "application winds down to the summary"),
        (Application, Cta) => (ZoomIn, "application re-energises into the call to action"),
        (Summary, Cta) => (ZoomIn, "summary re-energises into the call to action"),
        _ => return None,
    };
    Some(rule)
}

fn pace_multiplier(pace: Pace) -> f64 {
    match pace {
        Pace::VeryFast => 0.5,
        Pace::Fast => 0.75,
        Pace::Moderate | Pace::Varied => 1.0,
        Pace::Slow => 1.25,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionEngine {
    ranking: EmotionRanking,
}

impl Default for TransitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionEngine {
    pub fn new() -> Self {
        Self { ranking: EmotionRanking }
    }

    /// Decide the cut from `prev` into `curr`.
    ///
    /// `_next` is accepted for lookahead but does not affect the choice.
    pub fn decide(
        &self,
        prev: &SemanticProfile,
        curr: &SemanticProfile,
        _next: Option<&SemanticProfile>,
    ) -> TransitionDecision {
        let delta = curr.energy_level - prev.energy_level;
        let shift = self.ranking.classify(prev.emotion, curr.emotion);
        let (kind, why) = Self::select(prev.section_type, curr.section_type, delta, curr.energy_level);

        TransitionDecision {
            kind,
            duration: Self::duration(kind, curr.pace, delta),
            params: Self::params(kind, curr),
            reason: format!(
                "{} (energy {:+.1}, emotion {} {} -> {})",
                why,
                delta,
                shift.as_str(),
                prev.emotion,
                curr.emotion
            ),
        }
    }

    /// Entrance decision for every profile; the first section has none.
    pub fn decide_sequence(&self, profiles: &[SemanticProfile]) -> Vec<Option<TransitionDecision>> {
        let mut out = Vec::with_capacity(profiles.len());
        for i in 0..profiles.len() {
            if i == 0 {
                out.push(None);
                continue;
            }
            let decision = self.decide(&profiles[i - 1], &profiles[i], profiles.get(i + 1));
            info!(
                "[TRANSITION] #{} -> #{}: {} {:.2}s | {}",
                i,
                i + 1,
                decision.kind,
                decision.duration,
                decision.reason
            );
            out.push(Some(decision));
        }
        out
    }

    fn select(prev: SectionType, curr: SectionType, delta: f64, curr_energy: f64) -> (TransitionKind, String) {
        if let Some((kind, why)) = pair_rule(prev, curr) {
            return (kind, why.to_string());
        }
        if delta > 3.0 {
            return (TransitionKind::ZoomIn, format!("energy rises by {:.1}", delta));
        }
        if delta < -3.0 {
            return (TransitionKind::Fade, format!("energy drops by {:.1}", delta.abs()));
        }
        if delta.abs() < 1.0 {
            return (TransitionKind::Crossfade, "energy holds steady".to_string());
        }
        let (kind, why) = if curr_energy >= 8.0 {
            (TransitionKind::HardCut, "very high energy section")
        } else if curr_energy >= 7.5 {
            (TransitionKind::ZoomIn, "high energy section")
        } else if curr_energy >= 5.5 {
            (TransitionKind::SlideLeft, "medium energy section")
        } else {
            (TransitionKind::Fade, "low energy section")
        };
        (kind, why.to_string())
    }

    fn duration(kind: TransitionKind, pace: Pace, delta: f64) -> f64 {
        let mut duration = kind.base_duration() * pace_multiplier(pace);
        if delta.abs() > 4.0 {
            duration *= 0.8;
        }
        (duration * 100.0).round() / 100.0
    }

    fn params(kind: TransitionKind, curr: &SemanticProfile) -> TransitionParams {
        match kind {
            TransitionKind::ZoomIn | TransitionKind::ZoomOut => TransitionParams::Zoom {
                zoom_ratio: 1.0 + curr.energy_level / 20.0,
                easing: if kind == TransitionKind::ZoomIn { Easing::EaseIn } else { Easing::EaseOut },
            },
            TransitionKind::SlideLeft | TransitionKind::SlideRight => TransitionParams::Slide {
                speed: if curr.pace.is_fast() { SlideSpeed::Fast } else { SlideSpeed::Normal },
            },
            TransitionKind::Fade => TransitionParams::Fade { fade_curve: "linear".to_string() },
            TransitionKind::HardCut | TransitionKind::Crossfade => TransitionParams::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(section_type: SectionType, energy: f64) -> SemanticProfile {
        let mut p = SemanticProfile::archetype(section_type);
        p.energy_level = energy;
        p
    }

    #[test]
    fn test_pair_table_wins_over_energy() {
        let engine = TransitionEngine::new();
        let d = engine.decide(&profile(SectionType::Background, 1.0), &profile(SectionType::MainContent, 9.0), None);
        assert_eq!(d.kind, TransitionKind::ZoomIn);
        // 0.8 × varied 1.0 × 0.8 for |Δ| > 4
        assert_eq!(d.duration, 0.64);
        assert!((d.zoom_ratio().unwrap() - 1.45).abs() < 1e-9);
    }

    #[test]
    fn test_hook_to_introduction_zooms_out() {
        let engine = TransitionEngine::new();
        let d = engine.decide(&profile(SectionType::Hook, 9.0), &profile(SectionType::Introduction, 6.5), None);
        assert_eq!(d.kind, TransitionKind::ZoomOut);
        assert_eq!(d.duration, 1.2);
        match d.params {
            TransitionParams::Zoom { zoom_ratio, easing } => {
                assert!((zoom_ratio - 1.325).abs() < 1e-9);
                assert_eq!(easing, Easing::EaseOut);
            }
            other => panic!("expected zoom params, got {:?}", other),
        }
    }

    #[test]
    fn test_energy_rules_without_pair() {
        let engine = TransitionEngine::new();
        // cta -> hook has no pair rule
        let rise = engine.decide(&profile(SectionType::Summary, 2.0), &profile(SectionType::Hook, 9.0), None);
        assert_eq!(rise.kind, TransitionKind::ZoomIn);
        let drop = engine.decide(&profile(SectionType::Cta, 9.0), &profile(SectionType::Background, 4.0), None);
        assert_eq!(drop.kind, TransitionKind::Fade);
        assert_eq!(drop.duration, 1.0); // 1.0 × slow 1.25 × 0.8
        let flat = engine.decide(&profile(SectionType::Cta, 6.0), &profile(SectionType::Introduction, 6.5), None);
        assert_eq!(flat.kind, TransitionKind::Crossfade);
        assert_eq!(flat.params, TransitionParams::None);
    }

    #[test]
    fn test_current_energy_fallback_bands() {
        let engine = TransitionEngine::new();
        let prev = profile(SectionType::Cta, 6.0);
        let kind_at = |e: f64| engine.decide(&prev, &profile(SectionType::Hook, e), None).kind;
        assert_eq!(kind_at(8.5), TransitionKind::HardCut);
        assert_eq!(kind_at(7.6), TransitionKind::ZoomIn);
        assert_eq!(kind_at(4.0), TransitionKind::Fade);
        let slide = engine.decide(&profile(SectionType::Cta, 8.0), &profile(SectionType::Application, 6.5), None);
        assert_eq!(slide.kind, TransitionKind::SlideLeft);
        assert_eq!(slide.params, TransitionParams::Slide { speed: SlideSpeed::Normal });
        assert_eq!(kind_at(8.5).base_duration(), 0.0);
    }

    #[test]
    fn test_decision_is_deterministic_and_ignores_next() {
        let engine = TransitionEngine::new();
        let a = profile(SectionType::Hook, 9.0);
        let b = profile(SectionType::MainContent, 7.0);
        let c = profile(SectionType::Summary, 5.0);
        let first = engine.decide(&a, &b, None);
        let second = engine.decide(&a, &b, None);
        assert_eq!(first, second);
        assert_eq!(first.duration.to_bits(), second.duration.to_bits());
        assert_eq!(engine.decide(&a, &b, Some(&c)), first);
    }

    #[test]
    fn test_emotion_shift_in_reason_only() {
        let ranking = EmotionRanking;
        assert_eq!(ranking.classify(Emotion::Calm, Emotion::Excitement), EmotionShift::Escalate);
        assert_eq!(ranking.classify(Emotion::Excitement, Emotion::Focus), EmotionShift::DeEscalate);
        assert_eq!(ranking.classify(Emotion::Focus, Emotion::Inspired), EmotionShift::Maintain);

        let d = TransitionEngine::new().decide(&profile(SectionType::Background, 4.0), &profile(SectionType::Cta, 8.5), None);
        assert!(d.reason.contains("escalate"));
    }

    #[test]
    fn test_sequence_has_no_entrance_for_first() {
        let engine = TransitionEngine::new();
        let profiles = vec![
            profile(SectionType::Hook, 9.0),
            profile(SectionType::MainContent, 7.0),
            profile(SectionType::Summary, 5.0),
        ];
        let seq = engine.decide_sequence(&profiles);
        assert_eq!(seq.len(), 3);
        assert!(seq[0].is_none());
        // hook -> main_content: no pair, Δ = -2, energy 7.0 -> slide_left
        assert_eq!(seq[1].as_ref().map(|d| d.kind), Some(TransitionKind::SlideLeft));
        assert_eq!(seq[2].as_ref().map(|d| d.kind), Some(TransitionKind::ZoomOut));
    }
}
