//! Caption blocks, their visibility windows, and per-line styling.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::composition::ModelError;

/// A block of caption text burned into the main video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionBlock {
    /// Label used in logs (e.g. `first_box`).
    pub name: String,

    /// Raw source lines, in display order. Each is wrapped independently.
    pub lines: Vec<String>,

    /// Vertical position of the block's first line on the padded canvas.
    pub anchor_y: u32,

    /// When the block is visible.
    pub window: CaptionWindow,
}

/// Visibility window of a caption block.
///
/// The window starts `offset_secs` after its anchor point and lasts
/// `duration_secs`. The anchor is resolved against measured durations at
/// render time rather than fixed constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptionWindow {
    /// Point on the main timeline the offset is measured from.
    #[serde(default)]
    pub anchor: WindowAnchor,

    /// Seconds after the anchor at which the block appears.
    #[serde(default)]
    pub offset_secs: f64,

    /// Seconds the block stays visible.
    pub duration_secs: f64,
}

/// Reference points for caption windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    /// Beginning of the main (pre-intro) timeline.
    #[default]
    Start,
    /// End of the lead-in segment that carries the replacement audio.
    LeadInEnd,
}

/// A caption window resolved to absolute times on the main timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl CaptionWindow {
    /// Window at a fixed position from the start of the main timeline.
    pub fn fixed(start_secs: f64, duration_secs: f64) -> Self {
        Self {
            anchor: WindowAnchor::Start,
            offset_secs: start_secs,
            duration_secs,
        }
    }

    /// Window starting `offset_secs` after the lead-in ends.
    pub fn after_lead_in(offset_secs: f64, duration_secs: f64) -> Self {
        Self {
            anchor: WindowAnchor::LeadInEnd,
            offset_secs,
            duration_secs,
        }
    }

    /// Resolve the window given the measured end of the lead-in.
    pub fn resolve(&self, lead_in_end_secs: f64) -> ResolvedWindow {
        let base = match self.anchor {
            WindowAnchor::Start => 0.0,
            WindowAnchor::LeadInEnd => lead_in_end_secs,
        };
        let start_secs = base + self.offset_secs;
        ResolvedWindow {
            start_secs,
            end_secs: start_secs + self.duration_secs,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.offset_secs.is_finite() || self.offset_secs < 0.0 {
            return Err(ModelError::ValidationError {
                message: format!("caption offset must be >= 0, got {}", self.offset_secs),
            });
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(ModelError::ValidationError {
                message: format!("caption duration must be > 0, got {}", self.duration_secs),
            });
        }
        Ok(())
    }
}

impl ResolvedWindow {
    /// Whether two windows share any instant.
    pub fn overlaps(&self, other: &ResolvedWindow) -> bool {
        self.start_secs < other.end_secs && other.start_secs < self.end_secs
    }

    /// Timeline gate expression for the encoder's `enable` option.
    pub fn enable_expr(&self) -> String {
        format!(
            "between(t,{},{})",
            format_secs(self.start_secs),
            format_secs(self.end_secs)
        )
    }
}

/// Style chosen for one rendered caption line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDecision {
    pub text: String,
    pub font_size_pt: u32,
    pub bold: bool,
}

impl StyleDecision {
    /// Same style applied to a different piece of text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size_pt: self.font_size_pt,
            bold: self.bold,
        }
    }
}

/// Regular and bold font resources.
///
/// `None` selects the encoder's built-in default font.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSet {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
}

impl FontSet {
    pub fn new(regular: impl Into<PathBuf>, bold: impl Into<PathBuf>) -> Self {
        Self {
            regular: Some(regular.into()),
            bold: Some(bold.into()),
        }
    }

    /// Font file for the requested weight.
    pub fn for_weight(&self, bold: bool) -> Option<&Path> {
        if bold {
            self.bold.as_deref()
        } else {
            self.regular.as_deref()
        }
    }
}

/// Format seconds compactly (millisecond precision, no trailing zeros).
pub fn format_secs(secs: f64) -> String {
    let formatted = format!("{secs:.3}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
