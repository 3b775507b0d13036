// SYNOID Render Command
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Assembles the single ffmpeg invocation for a RenderRequest. Argument order
// is fixed: globals, segment inputs, audio inputs, graph, maps, encoder,
// audio codec, faststart, output.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::render::audio::build_audio_graph;
use crate::render::filters::{self, FilterContext, CONCAT_LABEL};
use crate::render::inputs::segment_inputs;
use crate::timeline::{EncoderSettings, RenderRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub output: PathBuf,
    pub video_label: String,
    pub audio_label: Option<String>,
}

impl RenderCommand {
    pub fn has_audio(&self) -> bool {
        self.audio_label.is_some()
    }

    /// The `-filter_complex` value.
    pub fn filter_graph(&self) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == "-filter_complex")
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// SHA-256 over program and arguments. Stable for identical requests.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.program.to_string_lossy().as_bytes());
        for arg in &self.args {
            hasher.update([0u8]);
            hasher.update(arg.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Shell-pasteable rendering of the command line.
impl fmt::Display for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=+@%,:".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\"'\"'"))
    }
}

/// Build the command for `request` encoding with `encoder`.
///
/// `probed` holds source durations for the segments in index order.
pub fn build_command(
    ffmpeg: &Path,
    request: &RenderRequest,
    encoder: &EncoderSettings,
    probed: &[Option<f64>],
) -> RenderCommand {
    let segments = request.ordered_segments();
    let ctx = FilterContext {
        resolution: request.resolution,
        fps: request.fps,
        captions: request.captions_enabled(),
    };

    let video_inputs = segment_inputs(&segments, probed, request.resolution, request.fps);
    let mut graph: Vec<String> = segments
        .iter()
        .zip(&video_inputs)
        .enumerate()
        .map(|(i, (segment, input))| filters::segment_chain(i, segment, input.kind(), &ctx))
        .collect();
    graph.push(filters::concat_stage(&segments));

    let mut video_label = CONCAT_LABEL.to_string();
    if let Some(overlay) = &request.subtitles {
        graph.push(filters::subtitle_stage(CONCAT_LABEL, overlay));
        video_label = filters::SUBTITLE_LABEL.to_string();
    }

    let audio = build_audio_graph(request.audio.as_ref(), video_inputs.len());
    graph.extend(audio.filters.iter().cloned());

    let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
    for input in &video_inputs {
        args.extend(input.to_args());
    }
    for input in &audio.inputs {
        args.extend(input.to_args());
    }
    args.push("-filter_complex".into());
    args.push(graph.join(";"));

    args.push("-map".into());
    args.push(video_label.clone());
    if let Some(label) = &audio.label {
        args.push("-map".into());
        args.push(label.clone());
    }

    args.extend(encoder_args(encoder));

    if let (Some(plan), Some(_)) = (&request.audio, &audio.label) {
        args.push("-c:a".into());
        args.push(plan.audio_codec.clone());
    }

    args.push("-movflags".into());
    args.push("+faststart".into());
    args.push(request.output_path.to_string_lossy().into_owned());

    RenderCommand {
        program: ffmpeg.to_path_buf(),
        args,
        output: request.output_path.clone(),
        video_label,
        audio_label: audio.label,
    }
}

/// Video encoder flags in their fixed order.
pub fn encoder_args(encoder: &EncoderSettings) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), encoder.codec.clone()];
    if encoder.is_h264_family() {
        args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
    }
    if !encoder.preset.is_empty() {
        args.extend(["-preset".to_string(), encoder.preset.clone()]);
    }
    if let Some(bitrate) = encoder.bitrate.as_ref().filter(|_| !encoder.rejects_bitrate()) {
        args.extend(["-b:v".to_string(), bitrate.clone()]);
    }
    if let Some(threads) = encoder.threads.filter(|t| *t > 0) {
        args.extend(["-threads".to_string(), threads.to_string()]);
    }
    args.extend(encoder.hardware_params.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{AudioPlan, SegmentSpec, SoftwareFallback, SourceKind};

    fn request() -> RenderRequest {
        let mut req = RenderRequest::new(
            vec![
                SegmentSpec::new(1, SourceKind::Color, 2.0).with_caption("second"),
                SegmentSpec::new(0, SourceKind::Color, 3.0).with_caption("first"),
            ],
            "/tmp/out.mp4",
        );
        req.resolution = crate::timeline::Resolution::new(640, 360);
        req
    }

    #[test]
    fn test_argument_order() {
        let req = request();
        let cmd = build_command(Path::new("ffmpeg"), &req, &req.encoder, &[]);
        let args = &cmd.args;
        assert_eq!(args[..3], ["-y", "-loglevel", "error"]);
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert!(pos("-f") < pos("-filter_complex"));
        assert!(pos("-filter_complex") < pos("-map"));
        assert!(pos("-map") < pos("-c:v"));
        assert!(pos("-c:v") < pos("-pix_fmt"));
        assert!(pos("-pix_fmt") < pos("-preset"));
        assert!(pos("-preset") < pos("-movflags"));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
        assert!(!args.contains(&"-c:a".to_string()));
        assert!(!cmd.has_audio());
    }

    #[test]
    fn test_graph_chains_by_index() {
        let req = request();
        let cmd = build_command(Path::new("ffmpeg"), &req, &req.encoder, &[]);
        let graph = cmd.filter_graph().unwrap();
        let parts: Vec<&str> = graph.split(';').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].starts_with("[0:v]trim=duration=3.000000"));
        assert!(parts[0].contains("drawtext=text=first"));
        assert!(parts[1].ends_with("[v1]"));
        assert_eq!(parts[2], "[v0][v1]concat=n=2:v=1:a=0[vout]");
        assert_eq!(cmd.video_label, "[vout]");
    }

    #[test]
    fn test_nvenc_drops_bitrate_and_appends_params() {
        let encoder = EncoderSettings {
            codec: "h264_nvenc".into(),
            preset: "p4".into(),
            bitrate: Some("8M".into()),
            threads: Some(8),
            hardware_params: vec!["-rc".into(), "vbr".into(), "-cq".into(), "19".into()],
            fallback: Some(SoftwareFallback { codec: "libx264".into(), preset: "medium".into() }),
        };
        assert_eq!(
            encoder_args(&encoder),
            vec!["-c:v", "h264_nvenc", "-pix_fmt", "yuv420p", "-preset", "p4", "-threads", "8", "-rc", "vbr", "-cq", "19"]
        );
        let sw = encoder.fallback_settings().unwrap();
        assert_eq!(
            encoder_args(&sw),
            vec!["-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset", "medium", "-b:v", "8M", "-threads", "8"]
        );
    }

    #[test]
    fn test_audio_inputs_follow_video_inputs() {
        let mut req = request();
        req.audio = Some(AudioPlan {
            bgm_path: Some("bgm.mp3".into()),
            target_duration: 5.0,
            ..Default::default()
        });
        let cmd = build_command(Path::new("ffmpeg"), &req, &req.encoder, &[]);
        assert!(cmd.filter_graph().unwrap().contains("[2:a]aloop"));
        let maps: Vec<&String> = cmd
            .args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| &w[1])
            .collect();
        assert_eq!(maps, vec!["[vout]", "[bgmtrim]"]);
        let ca = cmd.args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(cmd.args[ca + 1], "aac");
        assert!(ca < cmd.args.iter().position(|a| a == "-movflags").unwrap());
    }

    #[test]
    fn test_fingerprint_and_display() {
        let req = request();
        let a = build_command(Path::new("ffmpeg"), &req, &req.encoder, &[]);
        let b = build_command(Path::new("ffmpeg"), &req, &req.encoder, &[]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        let shown = a.to_string();
        assert!(shown.starts_with("ffmpeg -y -loglevel error"));
        assert!(shown.contains("'[v0][v1]concat") || shown.contains("-filter_complex '"));
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
    }
}
