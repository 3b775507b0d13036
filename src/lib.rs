// SYNOID Timeline Library
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Narrated script sections in, one rendered video out.

pub mod agent;
pub mod composer;
pub mod config;
pub mod error;
pub mod render;
pub mod timeline;

pub use composer::{CompositionEstimate, TimelineComposer, TimelinePlan};
pub use config::Settings;
pub use error::{Result, TimelineError};
pub use render::{RenderOutcome, TimelineRenderer};
pub use timeline::{AudioPlan, EncoderSettings, RenderRequest, Resolution, SegmentSpec, SourceKind};
