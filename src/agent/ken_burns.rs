// SYNOID Ken-Burns Motion
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Camera movement over still images. A movement is a linear curve over
// normalised segment time: scale from start to end, plus a drift expressed
// as a fraction of the frame size.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::semantic_analyzer::{Emotion, SemanticProfile};

/// Pre-scale applied to pans so the drift never exposes an empty edge.
pub const PAN_SCALE: f64 = 1.15;
const PAN_DRIFT: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    ZoomInFast,
    DiagonalZoom,
    ZoomInSlow,
    PanLeft,
    ZoomOut,
    PanRight,
    Static,
}

impl Movement {
    /// Pick a movement from energy, with `satisfied` sections pulling back.
    pub fn choose(energy: f64, emotion: Emotion) -> Self {
        if energy >= 8.5 {
            Movement::ZoomInFast
        } else if energy >= 7.5 {
            Movement::DiagonalZoom
        } else if energy >= 6.0 {
            Movement::ZoomInSlow
        } else if energy >= 4.5 {
            Movement::PanLeft
        } else if emotion == Emotion::Satisfied {
            Movement::ZoomOut
        } else if energy >= 3.0 {
            Movement::PanRight
        } else {
            Movement::Static
        }
    }

    pub fn curve(&self) -> MotionCurve {
        let (scale_start, scale_end, shift_x, shift_y) = match self {
            Movement::ZoomInFast => (1.0, 1.3, 0.0, 0.0),
            Movement::DiagonalZoom => (1.0, 1.2, -0.05, -0.05),
            Movement::ZoomInSlow => (1.0, 1.15, 0.0, 0.0),
            Movement::PanLeft => (PAN_SCALE, PAN_SCALE, -PAN_DRIFT, 0.0),
            Movement::ZoomOut => (1.2, 1.0, 0.0, 0.0),
            Movement::PanRight => (PAN_SCALE, PAN_SCALE, PAN_DRIFT, 0.0),
            Movement::Static => (1.0, 1.0, 0.0, 0.0),
        };
        MotionCurve { scale_start, scale_end, shift_x, shift_y }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Movement::ZoomInFast => "zoom_in_fast",
            Movement::DiagonalZoom => "diagonal_zoom",
            Movement::ZoomInSlow => "zoom_in_slow",
            Movement::PanLeft => "pan_left",
            Movement::ZoomOut => "zoom_out",
            Movement::PanRight => "pan_right",
            Movement::Static => "static",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Movement::ZoomInFast => "fast zoom in (1.0→1.3)",
            Movement::DiagonalZoom => "diagonal zoom",
            Movement::ZoomInSlow => "slow zoom in (1.0→1.15)",
            Movement::PanLeft => "pan left",
            Movement::ZoomOut => "zoom out (1.2→1.0)",
            Movement::PanRight => "pan right",
            Movement::Static => "static",
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear scale and drift over progress `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionCurve {
    pub scale_start: f64,
    pub scale_end: f64,
    /// Final horizontal drift as a fraction of frame width. Negative is left.
    pub shift_x: f64,
    /// Final vertical drift as a fraction of frame height. Negative is up.
    pub shift_y: f64,
}

/// Camera state at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionFrame {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl MotionCurve {
    pub fn frame_at(&self, progress: f64) -> MotionFrame {
        let p = if progress.is_finite() { progress.clamp(0.0, 1.0) } else { 0.0 };
        MotionFrame {
            scale: self.scale_start + (self.scale_end - self.scale_start) * p,
            offset_x: self.shift_x * p,
            offset_y: self.shift_y * p,
        }
    }

    pub fn has_drift(&self) -> bool {
        self.shift_x != 0.0 || self.shift_y != 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KenBurnsMotion {
    pub movement: Movement,
    pub curve: MotionCurve,
}

impl KenBurnsMotion {
    pub fn new(movement: Movement) -> Self {
        Self { movement, curve: movement.curve() }
    }

    pub fn for_profile(profile: &SemanticProfile) -> Self {
        Self::new(Movement::choose(profile.energy_level, profile.emotion))
    }

    /// Camera state at `t` seconds into a segment of `duration` seconds.
    pub fn frame_at(&self, t: f64, duration: f64) -> MotionFrame {
        if duration <= 0.0 {
            return self.curve.frame_at(0.0);
        }
        self.curve.frame_at(t / duration)
    }

    pub fn is_static(&self) -> bool {
        self.movement == Movement::Static
    }

    pub fn description(&self) -> &'static str {
        self.movement.description()
    }
}
