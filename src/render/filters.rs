// SYNOID Filter Graph
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Video side of the -filter_complex graph: one chain per segment, a concat
// stage joining them by index, and an optional subtitle burn-in at the end.
//
// Every chain ends in yuv420p / SAR 1 at the output size and fps, which is
// what concat requires of its inputs.

use std::path::Path;

use crate::agent::ken_burns::KenBurnsMotion;
use crate::agent::transition_engine::{TransitionDecision, TransitionKind};
use crate::timeline::{CaptionStyle, Resolution, SegmentSpec, SourceKind, SubtitleOverlay, SubtitleStyle};

pub const CONCAT_LABEL: &str = "[vout]";
pub const SUBTITLE_LABEL: &str = "[vfinal]";

pub const CAPTION_LINE_CHARS: usize = 28;
pub const CAPTION_MAX_LINES: usize = 3;

/// Output geometry shared by every segment chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterContext {
    pub resolution: Resolution,
    pub fps: u32,
    /// False when a subtitle file takes over captioning.
    pub captions: bool,
}

pub fn segment_label(segment: &SegmentSpec) -> String {
    format!("[v{}]", segment.index)
}

/// Full per-segment chain from input `input_index` to `[v{index}]`.
///
/// `kind` is the source actually fed to the input, which is `Color` when the
/// declared file was unusable.
pub fn segment_chain(input_index: usize, segment: &SegmentSpec, kind: SourceKind, ctx: &FilterContext) -> String {
    let Resolution { width, height } = ctx.resolution;
    let mut chain: Vec<String> = Vec::with_capacity(10);

    if kind != SourceKind::Color {
        chain.push(format!("scale={}:{}:force_original_aspect_ratio=decrease", width, height));
        chain.push(format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2:black", width, height));
    }
    chain.push(format!("trim=duration={:.6}", segment.duration));
    chain.push("setpts=PTS-STARTPTS".to_string());
    chain.push(format!("fps={}", ctx.fps));

    let motion = segment.motion.filter(|m| !m.is_static());
    if let Some(motion) = &motion {
        chain.push(ken_burns_filter(motion, segment.duration, ctx));
    }
    if let Some(transition) = &segment.transition {
        if let Some(filter) = transition_filter(transition, segment.duration, motion.is_some(), ctx) {
            chain.push(filter);
        }
    }
    if ctx.captions {
        if let Some(caption) = segment.caption.as_deref().filter(|c| !c.trim().is_empty()) {
            chain.push(drawtext_filter(caption, &segment.caption_style));
        }
    }

    chain.push("format=yuv420p".to_string());
    chain.push("setsar=1".to_string());

    format!("[{}:v]{}{}", input_index, chain.join(","), segment_label(segment))
}

/// Join every segment output, strictly by `index`.
pub fn concat_stage(segments: &[&SegmentSpec]) -> String {
    let mut ordered: Vec<&SegmentSpec> = segments.to_vec();
    ordered.sort_by_key(|s| s.index);
    let labels: String = ordered.iter().map(|s| segment_label(s)).collect();
    format!("{}concat=n={}:v=1:a=0{}", labels, ordered.len(), CONCAT_LABEL)
}

/// Burn `overlay` onto `input_label`, producing `[vfinal]`.
pub fn subtitle_stage(input_label: &str, overlay: &SubtitleOverlay) -> String {
    format!(
        "{}subtitles={}:force_style={}{}",
        input_label,
        escape_filter_path(&overlay.path),
        escape_option_value(&force_style(&overlay.style)),
        SUBTITLE_LABEL
    )
}

fn force_style(style: &SubtitleStyle) -> String {
    let mut parts = Vec::with_capacity(7);
    // commas separate the style overrides, so a font name cannot carry one
    if let Some(font) = style.font.as_deref().map(|f| f.replace(',', " ")).filter(|f| !f.trim().is_empty()) {
        parts.push(format!("FontName={}", font.trim()));
    }
    let primary = ass_colour(&style.font_color).unwrap_or(ASS_WHITE);
    let back = ass_colour(&style.bg_color).unwrap_or(ASS_BLACK);
    parts.push(format!("FontSize={}", style.font_size));
    parts.push(format!("PrimaryColour={}", primary));
    // "&H00" + BBGGRR, alpha replaced
    parts.push(format!("BackColour=&H{:02X}{}", ass_alpha(style.bg_opacity), &back[4..]));
    parts.push("BorderStyle=3".to_string());
    parts.push(format!("Alignment={}", style.alignment));
    parts.push(format!("MarginV={}", style.margin_v));
    parts.join(",")
}

const ASS_WHITE: &str = "&H00FFFFFF";
const ASS_BLACK: &str = "&H00000000";

/// ASS `&HAABBGGRR` for the small set of named colours we accept.
pub fn ass_colour(name: &str) -> Option<&'static str> {
    match name.trim().to_lowercase().as_str() {
        "white" => Some(ASS_WHITE),
        "black" => Some(ASS_BLACK),
        "yellow" => Some("&H0000FFFF"),
        "red" => Some("&H000000FF"),
        "blue" => Some("&H00FF0000"),
        _ => None,
    }
}

/// ASS alpha byte for a 0..=1 opacity. 0 is opaque in ASS.
pub fn ass_alpha(opacity: f64) -> u8 {
    if !opacity.is_finite() || !(0.0..=1.0).contains(&opacity) {
        return 0x80;
    }
    ((1.0 - opacity) * 255.0) as u8
}

/// Characters the option parser splits or quotes on.
const OPTION_SPECIALS: [char; 2] = ['\'', ':'];
/// Characters the graph parser splits or quotes on.
const GRAPH_SPECIALS: [char; 5] = ['\'', '[', ']', ',', ';'];

fn backslash_escape(text: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if c == '\\' || specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a filter option value inside a `-filter_complex` graph.
///
/// ffmpeg unescapes twice: once while splitting the graph, once while
/// splitting the filter's options.
pub fn escape_option_value(value: &str) -> String {
    backslash_escape(&backslash_escape(value, &OPTION_SPECIALS), &GRAPH_SPECIALS)
}

pub fn escape_filter_path(path: &Path) -> String {
    escape_option_value(&path.to_string_lossy())
}

/// Escape caption text for drawtext `text=`. drawtext applies its own
/// backslash pass and `%{}` expansion on top of the two graph levels.
/// Newlines stay literal; drawtext breaks lines on them.
pub fn escape_drawtext(text: &str) -> String {
    escape_option_value(&backslash_escape(&text.replace('\r', ""), &['%']))
}

/// Soft-wrap a caption to `width` chars per line, keeping `max_lines`.
///
/// Words longer than a line (including unspaced CJK runs) are broken by
/// character. Lines past `max_lines` are dropped.
pub fn wrap_caption(text: &str, width: usize, max_lines: usize) -> String {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut len = 0usize;
        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if word_len > width {
                if len > 0 && len + 1 < width {
                    current.push(' ');
                    len += 1;
                } else if len > 0 {
                    lines.push(std::mem::take(&mut current));
                    len = 0;
                }
                for ch in word.chars() {
                    if len >= width {
                        lines.push(std::mem::take(&mut current));
                        len = 0;
                    }
                    current.push(ch);
                    len += 1;
                }
                continue;
            }
            if len > 0 && len + 1 + word_len > width {
                lines.push(std::mem::take(&mut current));
                len = 0;
            }
            if len > 0 {
                current.push(' ');
                len += 1;
            }
            current.push_str(word);
            len += word_len;
        }
        if !current.is_empty() {
            lines.push(current);
        }
        if lines.len() >= max_lines {
            break;
        }
    }

    lines.truncate(max_lines);
    lines.join("\n")
}

pub fn drawtext_filter(caption: &str, style: &CaptionStyle) -> String {
    let text = escape_drawtext(&wrap_caption(caption, CAPTION_LINE_CHARS, CAPTION_MAX_LINES));
    let font = style
        .font_file
        .as_deref()
        .map(|f| format!(":fontfile={}", escape_filter_path(f)))
        .unwrap_or_default();
    format!(
        "drawtext=text={}{}:fontsize={}:fontcolor={}:box=1:boxcolor={}:boxborderw={}:x=(w-text_w)/2:y=h-(text_h+{})",
        text,
        font,
        style.font_size,
        escape_option_value(&style.font_color),
        escape_option_value(&style.box_color),
        style.box_border,
        style.margin
    )
}

fn frame_count(seconds: f64, fps: u32) -> u64 {
    ((seconds * fps as f64).round() as u64).max(1)
}

/// `zoompan` driving a Ken-Burns curve over the whole segment.
pub fn ken_burns_filter(motion: &KenBurnsMotion, duration: f64, ctx: &FilterContext) -> String {
    let n = frame_count(duration, ctx.fps);
    let progress = format!("min(on/{},1)", n);
    let curve = motion.curve;
    let zoom = format!(
        "{:.4}+({:.4}-{:.4})*{}",
        curve.scale_start, curve.scale_end, curve.scale_start, progress
    );
    // Image drift d moves the crop window by -d of the visible width.
    let drift = |shift: f64, axis: &str| {
        if shift == 0.0 {
            String::new()
        } else {
            let sign = if shift < 0.0 { '+' } else { '-' };
            format!("{}{:.4}*{}/zoom*{}", sign, shift.abs(), axis, progress)
        }
    };
    format!(
        "zoompan=z='{}':x='iw/2-(iw/zoom/2){}':y='ih/2-(ih/zoom/2){}':d=1:s={}:fps={}",
        zoom,
        drift(curve.shift_x, "iw"),
        drift(curve.shift_y, "ih"),
        ctx.resolution,
        ctx.fps
    )
}

/// Entrance effect for a segment. Never changes the segment's length.
///
/// Capped at half the segment. `None` for hard cuts and zero-length effects.
pub fn transition_filter(
    decision: &TransitionDecision,
    segment_duration: f64,
    has_motion: bool,
    ctx: &FilterContext,
) -> Option<String> {
    let d = decision.duration.min(segment_duration / 2.0);
    if d <= 0.0 || decision.kind == TransitionKind::HardCut {
        return None;
    }
    let Resolution { width: w, height: h } = ctx.resolution;
    let fade = format!("fade=t=in:st=0:d={:.3}", d);

    let filter = match decision.kind {
        TransitionKind::Fade | TransitionKind::Crossfade => fade,
        TransitionKind::SlideLeft => format!(
            "pad={}:{}:{}:0:black,crop=w={}:h={}:x='min({},{}*t/{:.3})':y=0",
            w * 2,
            h,
            w,
            w,
            h,
            w,
            w,
            d
        ),
        TransitionKind::SlideRight => format!(
            "pad={}:{}:0:0:black,crop=w={}:h={}:x='max(0,{}-{}*t/{:.3})':y=0",
            w * 2,
            h,
            w,
            h,
            w,
            w,
            d
        ),
        TransitionKind::ZoomIn | TransitionKind::ZoomOut if has_motion => fade,
        TransitionKind::ZoomIn | TransitionKind::ZoomOut => {
            let n = frame_count(d, ctx.fps);
            let r = decision.zoom_ratio().unwrap_or(1.2).max(1.0);
            let z = if decision.kind == TransitionKind::ZoomIn {
                format!("if(lt(on,{n}),1+({r:.4}-1)*on/{n},{r:.4})", n = n, r = r)
            } else {
                format!("if(lt(on,{n}),{r:.4}-({r:.4}-1)*on/{n},1)", n = n, r = r)
            };
            format!(
                "zoompan=z='{}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={}:fps={}",
                z, ctx.resolution, ctx.fps
            )
        }
        TransitionKind::HardCut => return None,
    };
    Some(filter)
}
