// SYNOID Timeline Composer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Script + TTS timing + materials -> RenderRequest -> rendered video.
// Narration timing is authoritative: a section with a TTS clip lasts exactly
// as long as its clip.

pub mod materials;
pub mod script;

use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::agent::ken_burns::KenBurnsMotion;
use crate::agent::semantic_analyzer::{SemanticAnalyzer, SemanticProfile};
use crate::agent::sentiment::ChatSentimentEstimator;
use crate::agent::transition_engine::{TransitionDecision, TransitionEngine};
use crate::config::Settings;
use crate::error::{Result, TimelineError};
use crate::render::{DurationProber, ProcessRunner, RenderCommand, RenderOutcome, TimelineRenderer};
use crate::timeline::{AudioPlan, RenderRequest, SegmentSpec, SourceKind, SubtitleOverlay};

use materials::{resolve_all, MaterialResolver, ResolvedMaterial, ScriptMaterialResolver};
use script::{Script, ScriptSection, TtsClip, TtsMetadata};

/// Narration and video may drift this far before the last segment absorbs it.
const SYNC_TOLERANCE: f64 = 1.0;
const MIN_LAST_SEGMENT: f64 = 0.5;
const SENTIMENT_TIMEOUT: Duration = Duration::from_secs(20);

/// Everything decided for one script, before anything is rendered.
#[derive(Debug, Clone, Serialize)]
pub struct TimelinePlan {
    pub title: String,
    pub request: RenderRequest,
    /// One per section; empty when smart effects are off.
    pub profiles: Vec<SemanticProfile>,
    /// Entrance decision per section, first is always `None`.
    pub transitions: Vec<Option<TransitionDecision>>,
    pub motions: Vec<Option<KenBurnsMotion>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionEstimate {
    /// 1-based.
    pub index: usize,
    pub name: String,
    pub duration: f64,
    pub has_narration: bool,
    pub has_visual_notes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionEstimate {
    pub title: String,
    pub total_sections: usize,
    pub estimated_duration: f64,
    pub estimated_file_size_mb: f64,
    pub sections: Vec<SectionEstimate>,
}

pub struct TimelineComposer {
    settings: Settings,
    analyzer: SemanticAnalyzer,
    transitions: TransitionEngine,
    resolver: Arc<dyn MaterialResolver>,
    renderer: TimelineRenderer,
}

impl TimelineComposer {
    pub fn new(settings: Settings) -> Self {
        let analyzer = Self::build_analyzer(&settings);
        let prober = DurationProber::new(&settings.binaries.ffprobe, settings.binaries.probe_timeout());
        let renderer = TimelineRenderer::new(&settings.binaries.ffmpeg, prober);
        Self {
            settings,
            analyzer,
            transitions: TransitionEngine::new(),
            resolver: Arc::new(ScriptMaterialResolver),
            renderer,
        }
    }

    fn build_analyzer(settings: &Settings) -> SemanticAnalyzer {
        let effects = &settings.smart_effects;
        if !(effects.enable && effects.use_ai_analysis) {
            return SemanticAnalyzer::new();
        }
        match ChatSentimentEstimator::from_env(SENTIMENT_TIMEOUT) {
            Some(estimator) => {
                info!("[COMPOSER] Sentiment blending enabled");
                SemanticAnalyzer::with_estimator(Arc::new(estimator))
            }
            None => {
                warn!("[COMPOSER] use_ai_analysis is set but no LLM endpoint is configured, rules only");
                SemanticAnalyzer::new()
            }
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn MaterialResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_analyzer(mut self, analyzer: SemanticAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.renderer = self.renderer.with_runner(runner);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Decide the whole timeline without rendering it.
    pub async fn plan(
        &self,
        script: &Script,
        tts: Option<&TtsMetadata>,
        subtitles: Option<&Path>,
        output: &Path,
    ) -> Result<TimelinePlan> {
        let video = &self.settings.video;
        let effects = &self.settings.smart_effects;
        let sections = &script.sections;
        info!("[COMPOSER] Planning '{}' ({} sections)", script.title, sections.len());

        let clips: Vec<Option<TtsClip>> = match tts {
            Some(meta) => {
                if let Some(gap) = meta.total_mismatch(SYNC_TOLERANCE) {
                    warn!(
                        "[TTS] Declared total {:.2}s is {:+.2}s off the clip durations",
                        meta.total_duration.unwrap_or_default(),
                        gap
                    );
                }
                meta.align(sections.len())
            }
            None => vec![None; sections.len()],
        };

        let (profiles, materials) = self.analyze_and_resolve(sections.clone()).await?;

        let transitions = if effects.enable {
            self.transitions.decide_sequence(&profiles)
        } else {
            vec![None; sections.len()]
        };

        let caption_style = self.settings.caption_style();
        let mut motions = Vec::with_capacity(sections.len());
        let mut segments = Vec::with_capacity(sections.len());
        let mut last_timed_by_tts = false;
        for (i, section) in sections.iter().enumerate() {
            let tts_timing = self.tts_timing(clips[i].as_ref());
            let duration = tts_timing.unwrap_or_else(|| self.nominal_duration(section));
            last_timed_by_tts = tts_timing.is_some();
            let name = section_display_name(section, i);

            let mut segment = SegmentSpec::new(i, SourceKind::Color, duration).with_section_name(&name);
            segment.caption_style = caption_style.clone();
            if let Some(ResolvedMaterial { path, kind }) = &materials[i] {
                segment.source_kind = *kind;
                segment.source_path = Some(path.clone());
            }
            let narration = section.narration.trim();
            if video.show_narration_text && !narration.is_empty() {
                segment.caption = Some(narration.to_string());
            }

            let motion = match profiles.get(i) {
                Some(profile) if effects.ken_burns_enabled && segment.source_kind == SourceKind::Image => {
                    let motion = KenBurnsMotion::for_profile(profile);
                    info!("[KENBURNS] #{} {}: {}", i + 1, motion.movement, motion.description());
                    Some(motion)
                }
                _ => None,
            };
            segment.motion = motion;
            if effects.render_transitions {
                segment.transition = transitions.get(i).cloned().flatten();
            }
            motions.push(motion);

            info!(
                "[COMPOSER] #{} '{}' {:?} {:.2}s{}",
                i + 1,
                name,
                segment.source_kind,
                duration,
                if tts_timing.is_some() { " (narration timing)" } else { "" }
            );
            segments.push(segment);
        }

        let narration = place_narration(&segments, &clips);
        reconcile_last_segment(&mut segments, &narration, last_timed_by_tts);

        let mut request = RenderRequest::new(segments, output);
        request.resolution = video.resolution;
        request.fps = video.fps;
        request.encoder = self.settings.encoder_settings();
        request.audio = self.audio_plan(&narration, request.total_duration());
        request.subtitles = subtitles.map(|path| SubtitleOverlay {
            path: path.to_path_buf(),
            style: self.settings.subtitle_style(),
        });
        request.validate()?;

        Ok(TimelinePlan {
            title: script.title.clone(),
            request,
            profiles,
            transitions,
            motions,
        })
    }

    /// The ffmpeg command a plan would run.
    pub async fn preview(&self, plan: &TimelinePlan) -> Result<RenderCommand> {
        self.renderer.preview(&plan.request).await
    }

    /// Plan and render. Renderer errors come back unchanged.
    pub async fn compose(
        &self,
        script: &Script,
        tts: Option<&TtsMetadata>,
        subtitles: Option<&Path>,
        output: &Path,
    ) -> Result<RenderOutcome> {
        self.compose_with_cancel(script, tts, subtitles, output, std::future::pending::<()>())
            .await
    }

    pub async fn compose_with_cancel<F>(
        &self,
        script: &Script,
        tts: Option<&TtsMetadata>,
        subtitles: Option<&Path>,
        output: &Path,
        cancel: F,
    ) -> Result<RenderOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        let plan = self.plan(script, tts, subtitles, output).await?;
        let outcome = self.renderer.render_with_cancel(&plan.request, cancel).await?;
        info!(
            "[COMPOSER] '{}' -> {:?} ({:.2}s, {} segments, {})",
            plan.title, outcome.output_path, outcome.duration, outcome.segment_count, outcome.resolution
        );
        Ok(outcome)
    }

    /// Duration and size estimate from the script alone.
    pub fn estimate(&self, script: &Script) -> CompositionEstimate {
        let default = self.settings.video.default_image_duration;
        let sections: Vec<SectionEstimate> = script
            .sections
            .iter()
            .enumerate()
            .map(|(i, s)| SectionEstimate {
                index: i + 1,
                name: section_display_name(s, i),
                duration: s.nominal_seconds(default),
                has_narration: !s.narration.trim().is_empty(),
                has_visual_notes: !s.visual_hint.trim().is_empty(),
            })
            .collect();
        let estimated_duration: f64 = sections.iter().map(|s| s.duration).sum();
        let size = estimated_duration / 60.0 * self.settings.video.estimated_bitrate_mb_per_min;
        CompositionEstimate {
            title: script.title.clone(),
            total_sections: sections.len(),
            estimated_duration,
            estimated_file_size_mb: (size * 100.0).round() / 100.0,
            sections,
        }
    }

    fn nominal_duration(&self, section: &ScriptSection) -> f64 {
        section.nominal_seconds(self.settings.video.default_image_duration)
    }

    /// The clip's length when it is allowed to set the section's duration.
    fn tts_timing(&self, clip: Option<&TtsClip>) -> Option<f64> {
        clip.map(|c| c.duration)
            .filter(|d| self.settings.video.use_tts_duration && d.is_finite() && *d > 0.0)
    }

    /// Analysis and material lookup, both on the bounded pool.
    async fn analyze_and_resolve(
        &self,
        sections: Vec<ScriptSection>,
    ) -> Result<(Vec<SemanticProfile>, Vec<Option<ResolvedMaterial>>)> {
        let analyzer = self.analyzer.clone();
        let resolver = Arc::clone(&self.resolver);
        let analyze = self.settings.smart_effects.enable;
        let workers = self.settings.video.workers;

        tokio::task::spawn_blocking(move || {
            let profiles = if analyze {
                analyzer.analyze_all(&sections, workers)?
            } else {
                Vec::new()
            };
            let materials = resolve_all(resolver.as_ref(), &sections, workers)?;
            Ok::<_, TimelineError>((profiles, materials))
        })
        .await
        .map_err(|e| TimelineError::Worker(e.to_string()))?
    }

    /// Narration first, music under it when allowed, music alone otherwise.
    fn audio_plan(&self, narration: &[NarrationCue<'_>], video_total: f64) -> Option<AudioPlan> {
        let bgm = self
            .settings
            .video
            .default_bgm
            .clone()
            .filter(|p| {
                let exists = p.exists();
                if !exists {
                    warn!("[COMPOSER] Background music not found, skipping: {:?}", p);
                }
                exists
            });
        let base = AudioPlan {
            bgm_volume: self.settings.tts.bgm_volume,
            audio_codec: self.settings.video.audio_codec.clone(),
            ..Default::default()
        };

        if !narration.is_empty() {
            return Some(AudioPlan {
                use_tts: true,
                tts_inputs: narration.iter().map(|c| c.clip.file_path.clone()).collect(),
                tts_durations: narration.iter().map(|c| c.clip.duration).collect(),
                tts_offsets: narration.iter().map(|c| c.offset).collect(),
                bgm_path: bgm.filter(|_| self.settings.tts.enable_bgm_mixing),
                target_duration: narration_end(narration).max(video_total),
                ..base
            });
        }
        bgm.map(|path| AudioPlan {
            bgm_path: Some(path),
            target_duration: video_total,
            ..base
        })
    }
}

/// A narration clip pinned to the start of its section.
#[derive(Debug, Clone, Copy)]
struct NarrationCue<'a> {
    section: usize,
    clip: &'a TtsClip,
    offset: f64,
}

/// Start each clip where its section starts on the timeline.
fn place_narration<'a>(segments: &[SegmentSpec], clips: &'a [Option<TtsClip>]) -> Vec<NarrationCue<'a>> {
    let mut cues = Vec::new();
    let mut offset = 0.0;
    for (section, (segment, clip)) in segments.iter().zip(clips).enumerate() {
        if let Some(clip) = clip {
            cues.push(NarrationCue { section, clip, offset });
        }
        offset += segment.duration;
    }
    cues
}

fn narration_end(narration: &[NarrationCue<'_>]) -> f64 {
    narration
        .iter()
        .map(|c| c.offset + c.clip.duration)
        .fold(0.0, f64::max)
}

fn section_display_name(section: &ScriptSection, index: usize) -> String {
    let name = section.section_name.trim();
    if name.is_empty() {
        format!("章节{}", index + 1)
    } else {
        name.to_string()
    }
}

/// Let a nominally timed last segment absorb a residual narration/video
/// mismatch. A segment timed by its own clip is never resized, and a silent
/// closing segment only grows to cover narration that runs past it.
fn reconcile_last_segment(segments: &mut [SegmentSpec], narration: &[NarrationCue<'_>], last_timed_by_tts: bool) {
    if narration.is_empty() || last_timed_by_tts || segments.is_empty() {
        return;
    }
    let last_index = segments.len() - 1;
    let video_total: f64 = segments.iter().map(|s| s.duration).sum();
    let diff = narration_end(narration) - video_total;
    if diff.abs() <= SYNC_TOLERANCE {
        return;
    }
    let last_narrated = narration.iter().any(|c| c.section == last_index);
    if diff < 0.0 && !last_narrated {
        debug!("[COMPOSER] Closing section has no narration, keeping its {:.2}s", segments[last_index].duration);
        return;
    }
    let last = &mut segments[last_index];
    let adjusted = (last.duration + diff).max(MIN_LAST_SEGMENT);
    warn!(
        "[COMPOSER] Narration and video differ by {:.2}s, last segment {:.2}s -> {:.2}s",
        diff, last.duration, adjusted
    );
    last.duration = adjusted;
}

/// `<dir>/<title>.mp4` with the title reduced to filename-safe characters.
pub fn default_output_path(dir: &Path, title: &str) -> PathBuf {
    let stem: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    dir.join(format!("{}.mp4", if stem.is_empty() { "video" } else { stem }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::transition_engine::TransitionKind;
    use crate::composer::script::NominalDuration;

    fn section(tag: &str, name: &str, narration: &str, seconds: f64) -> ScriptSection {
        ScriptSection {
            section_tag: Some(tag.to_string()),
            section_name: name.to_string(),
            narration: narration.to_string(),
            duration: Some(NominalDuration::Seconds(seconds)),
            ..Default::default()
        }
    }

    fn clip(dir: &Path, index: usize, duration: f64) -> TtsClip {
        let path = dir.join(format!("section_{}.mp3", index));
        std::fs::write(&path, b"mp3").unwrap();
        TtsClip { section_index: Some(index), section_name: None, file_path: path, duration }
    }

    fn script() -> Script {
        Script {
            title: "Why the sky is blue".into(),
            sections: vec![
                section("hook", "Hook", "A shocking fact!", 5.0),
                section("main_content", "Core", "Light scatters.", 6.0),
                section("summary", "Wrap", "", 4.0),
            ],
        }
    }

    #[tokio::test]
    async fn test_tts_duration_overrides_nominal() {
        let dir = tempfile::tempdir().unwrap();
        let tts = TtsMetadata {
            audio_files: vec![clip(dir.path(), 1, 3.2), clip(dir.path(), 2, 6.0), clip(dir.path(), 3, 4.0)],
            total_duration: Some(13.2),
        };
        let composer = TimelineComposer::new(Settings::default());
        let plan = composer
            .plan(&script(), Some(&tts), None, &dir.path().join("out.mp4"))
            .await
            .unwrap();
        assert_eq!(plan.request.segments[0].duration, 3.2);
        let audio = plan.request.audio.as_ref().unwrap();
        assert!(audio.has_tts());
        assert_eq!(audio.tts_inputs.len(), 3);
        assert!((audio.target_duration - 13.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_plan_effects_and_captions() {
        let dir = tempfile::tempdir().unwrap();
        let composer = TimelineComposer::new(Settings::default());
        let plan = composer.plan(&script(), None, None, &dir.path().join("out.mp4")).await.unwrap();

        assert_eq!(plan.profiles.len(), 3);
        assert!(plan.transitions[0].is_none());
        assert!(plan.request.segments[0].transition.is_none());
        assert!(plan.request.segments[1].transition.is_some());
        assert_eq!(
            plan.transitions[2].as_ref().map(|t| t.kind),
            plan.request.segments[2].transition.as_ref().map(|t| t.kind)
        );
        // no materials, so nothing gets camera motion
        assert!(plan.motions.iter().all(Option::is_none));
        assert_eq!(plan.request.segments[0].caption.as_deref(), Some("A shocking fact!"));
        assert!(plan.request.segments[2].caption.is_none());
        assert_eq!(plan.request.segments[0].caption_style.margin, 100);
        assert!(plan.request.audio.is_none());
        assert_eq!(plan.request.total_duration(), 15.0);
    }

    #[tokio::test]
    async fn test_image_material_gets_motion() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("still.png");
        std::fs::write(&still, b"png").unwrap();
        let mut script = script();
        script.sections[0].material_path = Some(still.clone());

        let composer = TimelineComposer::new(Settings::default());
        let plan = composer.plan(&script, None, None, &dir.path().join("out.mp4")).await.unwrap();
        assert_eq!(plan.request.segments[0].source_kind, SourceKind::Image);
        assert!(plan.motions[0].is_some());
        assert_eq!(plan.request.segments[0].motion, plan.motions[0]);

        let mut settings = Settings::default();
        settings.smart_effects.ken_burns_enabled = false;
        settings.smart_effects.render_transitions = false;
        let plan = TimelineComposer::new(settings)
            .plan(&script, None, None, &dir.path().join("out.mp4"))
            .await
            .unwrap();
        assert!(plan.motions[0].is_none());
        assert!(plan.request.segments.iter().all(|s| s.transition.is_none()));
        assert!(plan.transitions[1].is_some());
    }

    #[tokio::test]
    async fn test_narrated_last_section_keeps_clip_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut script = script();
        script.sections[2].duration = Some(NominalDuration::Seconds(5.0));
        let tts = TtsMetadata { audio_files: vec![clip(dir.path(), 3, 3.2)], total_duration: Some(3.2) };
        let plan = TimelineComposer::new(Settings::default())
            .plan(&script, Some(&tts), None, &dir.path().join("out.mp4"))
            .await
            .unwrap();
        let durations: Vec<f64> = plan.request.segments.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![5.0, 6.0, 3.2]);
        let audio = plan.request.audio.as_ref().unwrap();
        assert_eq!(audio.tts_offsets, vec![11.0]);
        assert!((audio.target_duration - 14.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_silent_closing_section_keeps_nominal_length() {
        let dir = tempfile::tempdir().unwrap();
        let tts = TtsMetadata {
            audio_files: vec![clip(dir.path(), 1, 3.0), clip(dir.path(), 2, 3.0)],
            total_duration: None,
        };
        let plan = TimelineComposer::new(Settings::default())
            .plan(&script(), Some(&tts), None, &dir.path().join("out.mp4"))
            .await
            .unwrap();
        assert_eq!(plan.request.segments[2].duration, 4.0);
        let audio = plan.request.audio.as_ref().unwrap();
        assert_eq!(audio.tts_offsets, vec![0.0, 3.0]);
        assert!(audio.narration_is_contiguous());
        assert!((audio.target_duration - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nominal_last_section_absorbs_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.video.use_tts_duration = false;
        let tts = TtsMetadata {
            audio_files: vec![clip(dir.path(), 1, 3.0), clip(dir.path(), 2, 3.0), clip(dir.path(), 3, 2.0)],
            total_duration: Some(8.0),
        };
        let plan = TimelineComposer::new(settings)
            .plan(&script(), Some(&tts), None, &dir.path().join("out.mp4"))
            .await
            .unwrap();
        // clips start at 0, 5 and 11; narration ends at 13 against 15 of video
        let durations: Vec<f64> = plan.request.segments.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![5.0, 6.0, 2.0]);
        let audio = plan.request.audio.as_ref().unwrap();
        assert_eq!(audio.tts_offsets, vec![0.0, 5.0, 11.0]);
        assert!(!audio.narration_is_contiguous());
        assert!((audio.target_duration - 13.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_bgm_only_targets_video_length() {
        let dir = tempfile::tempdir().unwrap();
        let bgm = dir.path().join("bgm.mp3");
        std::fs::write(&bgm, b"mp3").unwrap();
        let mut settings = Settings::default();
        settings.video.default_bgm = Some(bgm.clone());

        let plan = TimelineComposer::new(settings)
            .plan(&script(), None, None, &dir.path().join("out.mp4"))
            .await
            .unwrap();
        let audio = plan.request.audio.unwrap();
        assert!(!audio.use_tts);
        assert_eq!(audio.bgm_path, Some(bgm));
        assert_eq!(audio.target_duration, 15.0);
    }

    #[tokio::test]
    async fn test_empty_script_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let composer = TimelineComposer::new(Settings::default());
        let err = composer
            .plan(&Script::default(), None, None, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_transitions_follow_pair_table_and_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let composer = TimelineComposer::new(Settings::default());
        let plan = composer.plan(&script(), None, None, &dir.path().join("out.mp4")).await.unwrap();
        let again = composer.plan(&script(), None, None, &dir.path().join("out.mp4")).await.unwrap();
        assert_eq!(plan.transitions, again.transitions);
        assert_eq!(plan.transitions[2].as_ref().map(|t| t.kind), Some(TransitionKind::ZoomOut));
    }

    #[test]
    fn test_estimate() {
        let composer = TimelineComposer::new(Settings::default());
        let mut script = script();
        script.sections.push(ScriptSection {
            duration: Some(NominalDuration::Text("30秒".into())),
            visual_hint: "diagram".into(),
            ..Default::default()
        });
        let estimate = composer.estimate(&script);
        assert_eq!(estimate.total_sections, 4);
        assert_eq!(estimate.estimated_duration, 45.0);
        assert_eq!(estimate.estimated_file_size_mb, 3.75);
        assert_eq!(estimate.sections[3].name, "章节4");
        assert_eq!(estimate.sections[3].index, 4);
        assert!(estimate.sections[3].has_visual_notes);
        assert!(!estimate.sections[3].has_narration);
    }

    #[test]
    fn test_default_output_path() {
        let dir = Path::new("/tmp/out");
        assert_eq!(default_output_path(dir, "Why: the sky?"), dir.join("Why__the_sky.mp4"));
        assert_eq!(default_output_path(dir, "???"), dir.join("video.mp4"));
    }
}
