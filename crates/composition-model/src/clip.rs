//! Clip ranges over a source media file.

use std::path::{Path, PathBuf};

use crate::composition::ModelError;

/// A sub-range extraction of a source file.
///
/// A missing start means "from the beginning", a missing duration means
/// "to the end". Durations are always strictly positive.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    source: PathBuf,
    start_offset_secs: Option<f64>,
    duration_secs: Option<f64>,
}

impl ClipSpec {
    /// The whole source, untrimmed.
    pub fn whole(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            start_offset_secs: None,
            duration_secs: None,
        }
    }

    /// A clip with explicit bounds.
    pub fn new(
        source: impl Into<PathBuf>,
        start_offset_secs: Option<f64>,
        duration_secs: Option<f64>,
    ) -> Result<Self, ModelError> {
        if let Some(start) = start_offset_secs {
            if !start.is_finite() || start < 0.0 {
                return Err(ModelError::ValidationError {
                    message: format!("clip start offset must be >= 0, got {start}"),
                });
            }
        }
        if let Some(duration) = duration_secs {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ModelError::ValidationError {
                    message: format!("clip duration must be > 0, got {duration}"),
                });
            }
        }

        Ok(Self {
            source: source.into(),
            start_offset_secs,
            duration_secs,
        })
    }

    /// The first `duration_secs` of the source.
    pub fn head(source: impl Into<PathBuf>, duration_secs: f64) -> Result<Self, ModelError> {
        Self::new(source, Some(0.0), Some(duration_secs))
    }

    /// Everything from `start_offset_secs` to the end of the source.
    pub fn tail_from(
        source: impl Into<PathBuf>,
        start_offset_secs: f64,
    ) -> Result<Self, ModelError> {
        Self::new(source, Some(start_offset_secs), None)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn start_offset_secs(&self) -> Option<f64> {
        self.start_offset_secs
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// End of the range, when both bounds are known.
    pub fn end_secs(&self) -> Option<f64> {
        self.duration_secs
            .map(|d| self.start_offset_secs.unwrap_or(0.0) + d)
    }

    /// Whether the clip covers the source unmodified.
    pub fn is_whole(&self) -> bool {
        self.start_offset_secs.unwrap_or(0.0) == 0.0 && self.duration_secs.is_none()
    }
}
