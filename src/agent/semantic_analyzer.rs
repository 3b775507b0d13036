// SYNOID Semantic Analyzer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Derives an energy / emotion / pace profile for each script section. The
// rule engine is a static archetype table plus two small vocabularies; an
// optional sentiment estimator can blend in, but never decides alone.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::sentiment::SentimentEstimator;
use crate::agent::worker_pool;
use crate::composer::script::ScriptSection;
use crate::error::Result;

/// Narrative role of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Hook,
    Introduction,
    Background,
    MainContent,
    Application,
    Summary,
    Cta,
}

impl SectionType {
    pub const ALL: [SectionType; 7] = [
        SectionType::Hook,
        SectionType::Introduction,
        SectionType::Background,
        SectionType::MainContent,
        SectionType::Application,
        SectionType::Summary,
        SectionType::Cta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Hook => "hook",
            SectionType::Introduction => "introduction",
            SectionType::Background => "background",
            SectionType::MainContent => "main_content",
            SectionType::Application => "application",
            SectionType::Summary => "summary",
            SectionType::Cta => "cta",
        }
    }

    /// Words in a section name that identify the archetype. Checked in
    /// `ALL` order, first hit wins.
    fn name_keywords(&self) -> &'static [&'static str] {
        match self {
            SectionType::Hook => &["开场", "钩子", "hook", "引子", "吸引"],
            SectionType::Introduction => &["介绍", "导入", "intro", "引言", "前言"],
            SectionType::Background => &["背景", "基础", "background", "基本", "前置"],
            SectionType::MainContent => &["核心", "主要", "正文", "main", "内容", "讲解"],
            SectionType::Application => &["应用", "实践", "application", "实际"],
            SectionType::Summary => &["总结", "回顾", "summary", "结论", "小结"],
            SectionType::Cta => &["行动", "号召", "cta", "互动", "关注"],
        }
    }

    /// Match a free-form section name against the archetype vocabulary.
    pub fn from_section_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.name_keywords().iter().any(|kw| lower.contains(kw)))
    }

    pub fn base_profile(&self) -> ArchetypeProfile {
        use Emotion::*;
        use Pace::*;
        let (emotion, pace, base_energy) = match self {
            SectionType::Hook => (Excitement, Fast, 9.0),
            SectionType::Introduction => (Curiosity, Moderate, 6.0),
            SectionType::Background => (Calm, Slow, 4.0),
            SectionType::MainContent => (Focus, Varied, 7.0),
            SectionType::Application => (Inspired, Moderate, 6.5),
            SectionType::Summary => (Satisfied, Slow, 5.0),
            SectionType::Cta => (Motivated, Fast, 8.5),
        };
        ArchetypeProfile { emotion, pace, base_energy }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "hook" => Ok(SectionType::Hook),
            "introduction" | "intro" => Ok(SectionType::Introduction),
            "background" => Ok(SectionType::Background),
            "main_content" | "main" | "content" => Ok(SectionType::MainContent),
            "application" => Ok(SectionType::Application),
            "summary" | "conclusion" => Ok(SectionType::Summary),
            "cta" | "call_to_action" => Ok(SectionType::Cta),
            other => Err(format!("unknown section type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Excitement,
    Curiosity,
    Calm,
    Focus,
    Inspired,
    Satisfied,
    Motivated,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Excitement => "excitement",
            Emotion::Curiosity => "curiosity",
            Emotion::Calm => "calm",
            Emotion::Focus => "focus",
            Emotion::Inspired => "inspired",
            Emotion::Satisfied => "satisfied",
            Emotion::Motivated => "motivated",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    VeryFast,
    Fast,
    Moderate,
    Varied,
    Slow,
}

impl Pace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::VeryFast => "very_fast",
            Pace::Fast => "fast",
            Pace::Moderate => "moderate",
            Pace::Varied => "varied",
            Pace::Slow => "slow",
        }
    }

    pub fn is_fast(&self) -> bool {
        matches!(self, Pace::VeryFast | Pace::Fast)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualIntensity {
    Low,
    Medium,
    High,
}

impl VisualIntensity {
    pub fn from_energy(energy: f64) -> Self {
        if energy >= 7.5 {
            VisualIntensity::High
        } else if energy >= 5.0 {
            VisualIntensity::Medium
        } else {
            VisualIntensity::Low
        }
    }
}

/// Static per-archetype defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchetypeProfile {
    pub emotion: Emotion,
    pub pace: Pace,
    pub base_energy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordTone {
    High,
    Calm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticKeyword {
    pub tone: KeywordTone,
    pub word: String,
}

/// Analysis result for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticProfile {
    pub section_type: SectionType,
    pub emotion: Emotion,
    /// 0–10, one decimal.
    pub energy_level: f64,
    pub pace: Pace,
    pub keywords: Vec<SemanticKeyword>,
    pub visual_intensity: VisualIntensity,
}

impl SemanticProfile {
    /// Profile straight from the archetype table, no text nudges.
    pub fn archetype(section_type: SectionType) -> Self {
        let base = section_type.base_profile();
        Self {
            section_type,
            emotion: base.emotion,
            energy_level: base.base_energy,
            pace: base.pace,
            keywords: Vec::new(),
            visual_intensity: VisualIntensity::from_energy(base.base_energy),
        }
    }
}

const HIGH_ENERGY_WORDS: &[&str] = &[
    "惊人", "震撼", "突破", "发现", "革命", "颠覆", "神奇", "不可思议", "揭秘", "爆炸", "飞速", "惊艳",
    "巨大", "重大", "关键", "核心", "重要", "必须", "breakthrough", "shock", "amazing", "incredible",
    "revolution", "discover", "explo", "stunning", "huge", "crucial", "essential",
];

const CALM_WORDS: &[&str] = &[
    "基础", "了解", "认识", "理解", "简单", "基本", "平稳", "逐步", "缓慢", "稳定", "慢慢", "渐渐", "轻松",
    "容易", "温和", "basic", "simple", "understand", "gradual", "slow", "steady", "easy", "gentle",
];

const MAX_KEYWORDS: usize = 5;
const HIGH_ENERGY_BONUS: f64 = 0.5;
const CALM_PENALTY: f64 = 0.3;

/// Rule-based analyzer with an optional sentiment blend.
#[derive(Clone, Default)]
pub struct SemanticAnalyzer {
    estimator: Option<Arc<dyn SentimentEstimator>>,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self { estimator: None }
    }

    pub fn with_estimator(estimator: Arc<dyn SentimentEstimator>) -> Self {
        Self { estimator: Some(estimator) }
    }

    pub fn has_estimator(&self) -> bool {
        self.estimator.is_some()
    }

    pub fn analyze(&self, section: &ScriptSection) -> SemanticProfile {
        let section_type = resolve_section_type(section);
        let base = section_type.base_profile();
        let keywords = extract_keywords(&section.narration);

        let mut energy = base.base_energy;
        if let Some(intensity) = self.estimated_intensity(section) {
            energy = (energy + intensity) / 2.0;
        }

        let high = keywords.iter().filter(|k| k.tone == KeywordTone::High).count() as f64;
        let calm = keywords.iter().filter(|k| k.tone == KeywordTone::Calm).count() as f64;
        energy += high * HIGH_ENERGY_BONUS;
        energy -= calm * CALM_PENALTY;
        let energy = ((energy * 10.0).round() / 10.0).clamp(0.0, 10.0);

        debug!(
            "[ANALYZER] '{}' -> {} energy {:.1} ({} keywords)",
            section.section_name,
            section_type,
            energy,
            keywords.len()
        );

        SemanticProfile {
            section_type,
            emotion: base.emotion,
            energy_level: energy,
            pace: base.pace,
            keywords,
            visual_intensity: VisualIntensity::from_energy(energy),
        }
    }

    /// Analyze every section on a bounded pool. Output order matches input.
    pub fn analyze_all(&self, sections: &[ScriptSection], workers: usize) -> Result<Vec<SemanticProfile>> {
        if sections.is_empty() {
            return Ok(Vec::new());
        }
        let pool = worker_pool(workers, sections.len())?;
        info!(
            "[ANALYZER] Analyzing {} sections on {} workers",
            sections.len(),
            pool.current_num_threads()
        );
        let profiles: Vec<SemanticProfile> =
            pool.install(|| sections.par_iter().map(|s| self.analyze(s)).collect());

        for (i, profile) in profiles.iter().enumerate() {
            info!(
                "[ANALYZER] #{} {} | {} | energy {:.1} | {}",
                i + 1,
                profile.section_type,
                profile.emotion,
                profile.energy_level,
                profile.pace.as_str()
            );
        }
        Ok(profiles)
    }

    fn estimated_intensity(&self, section: &ScriptSection) -> Option<f64> {
        let estimator = self.estimator.as_ref()?;
        if section.narration.trim().is_empty() {
            return None;
        }
        match estimator.estimate(&section.narration) {
            Ok(estimate) if estimate.intensity.is_finite() => Some(estimate.intensity.clamp(0.0, 10.0)),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    "[ANALYZER] Sentiment estimate failed for '{}', using rules only: {:#}",
                    section.section_name, e
                );
                None
            }
        }
    }
}

/// Explicit tag first, then the section name, then `main_content`.
pub fn resolve_section_type(section: &ScriptSection) -> SectionType {
    if let Some(tag) = section.section_tag.as_deref() {
        match tag.parse::<SectionType>() {
            Ok(t) => return t,
            Err(e) => debug!("[ANALYZER] Ignoring section tag: {}", e),
        }
    }
    SectionType::from_section_name(&section.section_name).unwrap_or(SectionType::MainContent)
}

/// High-energy words first, then calm words, at most five overall.
pub fn extract_keywords(text: &str) -> Vec<SemanticKeyword> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() || !c.is_ascii())
        .filter(|t| !t.is_empty())
        .collect();

    let matches = |word: &str| {
        if word.is_ascii() {
            tokens.iter().any(|t| t.starts_with(word))
        } else {
            text.contains(word)
        }
    };

    let high = HIGH_ENERGY_WORDS
        .iter()
        .filter(|w| matches(w))
        .map(|w| SemanticKeyword { tone: KeywordTone::High, word: w.to_string() });
    let calm = CALM_WORDS
        .iter()
        .filter(|w| matches(w))
        .map(|w| SemanticKeyword { tone: KeywordTone::Calm, word: w.to_string() });

    high.chain(calm).take(MAX_KEYWORDS).collect()
}
