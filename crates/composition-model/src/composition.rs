//! Run configuration for one composition.
//!
//! A composition names every input, intermediate, and output path of a run
//! plus the encode and caption settings. It is loaded from a JSON file;
//! relative paths are resolved against that file's directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::caption::{CaptionBlock, CaptionWindow, FontSet};

/// Top-level composition file (`composition.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composition {
    /// Source media.
    pub inputs: InputPaths,

    /// Final output file.
    pub output: PathBuf,

    /// Directory holding intermediate artifacts. Must not be shared between
    /// concurrent runs.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// File names of intermediate artifacts inside `work_dir`.
    #[serde(default)]
    pub artifacts: ArtifactNames,

    /// Length of the lead-in whose audio is replaced.
    pub lead_in_secs: f64,

    /// Output frame every source is normalized to.
    #[serde(default)]
    pub target: TargetFrame,

    /// Encoder settings shared by all re-encoding stages.
    #[serde(default)]
    pub encode: EncodeSettings,

    /// Caption text and styling.
    #[serde(default)]
    pub captions: CaptionSettings,

    /// What happens to intermediate artifacts when the run ends.
    #[serde(default)]
    pub cleanup: CleanupPolicy,

    /// Probe both halves before the stream-copy merge and fail early on
    /// mismatched codec parameters.
    #[serde(default = "default_true")]
    pub verify_concat_compat: bool,
}

/// Source media paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPaths {
    /// Main video; its lead-in gets the replacement audio.
    pub source_video: PathBuf,

    /// Audio muxed under the lead-in.
    pub replacement_audio: PathBuf,

    /// Clip prepended to the final output.
    pub intro: PathBuf,

    /// Clip appended to the final output.
    pub outro: PathBuf,
}

/// File names of the six intermediate artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNames {
    pub lead_in: String,
    pub lead_in_audio: String,
    pub remainder: String,
    pub manifest: String,
    pub merged: String,
    pub overlaid: String,
}

/// Output frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFrame {
    pub width: u32,
    pub height: u32,
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    pub video_codec: String,
    /// Fixed quality/speed preset.
    pub preset: String,
    pub crf: u32,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate_kbps: u32,
    pub audio_sample_rate: u32,
    pub channel_layout: String,
}

/// Caption blocks plus their shared style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    pub style: CaptionStyle,
    pub blocks: Vec<CaptionBlock>,
}

/// Caption styling shared by every block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    /// Point size for regular lines.
    pub base_font_pt: u32,

    /// Point size for emphasized lines.
    pub emphasis_font_pt: u32,

    /// Substrings that mark a line as emphasized.
    pub emphasis_markers: Vec<String>,

    /// Pixel budget each wrapped line must fit into.
    pub max_text_width: u32,

    /// Gap between the text's right edge and the frame's right edge.
    pub margin: u32,

    /// Vertical distance between consecutive lines sharing an anchor.
    pub line_spacing: u32,

    /// Text fill color, in the encoder's color syntax.
    pub fill_color: String,

    pub fonts: FontSet,
}

/// Artifact retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Remove artifacts whether the run succeeds or fails.
    #[default]
    Always,
    /// Remove artifacts on success, keep them after a failure for inspection.
    KeepOnFailure,
    /// Never remove artifacts.
    Never,
}

impl CleanupPolicy {
    pub fn cleans_on_success(self) -> bool {
        !matches!(self, CleanupPolicy::Never)
    }

    pub fn cleans_on_failure(self) -> bool {
        matches!(self, CleanupPolicy::Always)
    }
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            lead_in: "lead_in.mp4".to_string(),
            lead_in_audio: "lead_in_audio.mp4".to_string(),
            remainder: "remainder.mp4".to_string(),
            manifest: "concat_list.txt".to_string(),
            merged: "merged.mp4".to_string(),
            overlaid: "overlaid.mp4".to_string(),
        }
    }
}

impl ArtifactNames {
    fn all(&self) -> [&str; 6] {
        [
            &self.lead_in,
            &self.lead_in_audio,
            &self.remainder,
            &self.manifest,
            &self.merged,
            &self.overlaid,
        ]
    }
}

impl Default for TargetFrame {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 128,
            audio_sample_rate: 44100,
            channel_layout: "stereo".to_string(),
        }
    }
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            base_font_pt: 26,
            emphasis_font_pt: 48,
            emphasis_markers: vec!["Rs.".to_string(), "₹".to_string()],
            max_text_width: 600,
            margin: 40,
            line_spacing: 60,
            fill_color: "white".to_string(),
            fonts: FontSet::default(),
        }
    }
}

impl Default for Composition {
    fn default() -> Self {
        Self {
            inputs: InputPaths {
                source_video: PathBuf::from("source.mp4"),
                replacement_audio: PathBuf::from("audio.mp3"),
                intro: PathBuf::from("intro.mp4"),
                outro: PathBuf::from("outro.mp4"),
            },
            output: PathBuf::from("final_output.mp4"),
            work_dir: default_work_dir(),
            artifacts: ArtifactNames::default(),
            lead_in_secs: 4.0,
            target: TargetFrame::default(),
            encode: EncodeSettings::default(),
            captions: CaptionSettings::default(),
            cleanup: CleanupPolicy::default(),
            verify_concat_compat: true,
        }
    }
}

impl Composition {
    /// A ready-to-edit composition with two caption boxes sharing one anchor.
    ///
    /// Both boxes stack from the same anchor, so the frame is tall enough to
    /// hold every wrapped line of the two boxes together.
    pub fn sample() -> Self {
        let mut composition = Self::default();
        composition.target = TargetFrame {
            width: 1920,
            height: 1080,
        };
        composition.captions.blocks = vec![
            CaptionBlock {
                name: "first_box".to_string(),
                lines: vec![
                    "Dear Ramesh Kumar,".to_string(),
                    "Your property tax for 2024-25 is now due.".to_string(),
                    "Amount payable: Rs. 999.00".to_string(),
                    "Pay before 31st March to avoid penalty.".to_string(),
                    "https://cdma.ap.gov.in/en/vijayawada-municipal-corporation".to_string(),
                ],
                anchor_y: 80,
                window: CaptionWindow::after_lead_in(0.0, 6.0),
            },
            CaptionBlock {
                name: "second_box".to_string(),
                lines: vec![
                    "Thank you for being a responsible citizen.".to_string(),
                    "Visit your nearest ward secretariat for help.".to_string(),
                    "Vijayawada Municipal Corporation".to_string(),
                ],
                anchor_y: 80,
                window: CaptionWindow::after_lead_in(6.0, 6.0),
            },
        ];
        composition
    }

    /// Load a composition and resolve relative paths against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut composition: Composition =
            serde_json::from_str(&content).map_err(|e| ModelError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        if let Some(base) = path.parent() {
            composition.resolve_relative_to(base);
        }
        Ok(composition)
    }

    /// Write the composition as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ModelError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Rebase every relative path onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.inputs.source_video);
        rebase(&mut self.inputs.replacement_audio);
        rebase(&mut self.inputs.intro);
        rebase(&mut self.inputs.outro);
        rebase(&mut self.output);
        rebase(&mut self.work_dir);
        if let Some(font) = self.captions.style.fonts.regular.as_mut() {
            rebase(font);
        }
        if let Some(font) = self.captions.style.fonts.bold.as_mut() {
            rebase(font);
        }
    }

    /// Path of an intermediate artifact.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    /// Check internal consistency. Does not touch the filesystem.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.lead_in_secs.is_finite() || self.lead_in_secs <= 0.0 {
            return Err(invalid(format!(
                "lead_in_secs must be > 0, got {}",
                self.lead_in_secs
            )));
        }

        let TargetFrame { width, height } = self.target;
        if width == 0 || height == 0 {
            return Err(invalid("target dimensions must be non-zero"));
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(invalid(format!(
                "target dimensions must be even for yuv420p, got {width}x{height}"
            )));
        }

        let style = &self.captions.style;
        if style.max_text_width == 0 {
            return Err(invalid("captions.style.max_text_width must be > 0"));
        }
        if style.base_font_pt == 0 || style.emphasis_font_pt == 0 {
            return Err(invalid("caption font sizes must be > 0"));
        }
        if style.line_spacing == 0 {
            return Err(invalid("captions.style.line_spacing must be > 0"));
        }

        for block in &self.captions.blocks {
            if block.anchor_y >= height {
                return Err(invalid(format!(
                    "caption block '{}': anchor_y {} is outside the {height}px frame",
                    block.name, block.anchor_y
                )));
            }
            block.window.validate().map_err(|e| {
                invalid(format!("caption block '{}': {e}", block.name))
            })?;
        }

        let mut seen = HashSet::new();
        for name in self.artifacts.all() {
            if name.is_empty() {
                return Err(invalid("artifact names must not be empty"));
            }
            if !seen.insert(name) {
                return Err(invalid(format!("duplicate artifact name '{name}'")));
            }
            if self.artifact_path(name) == self.output {
                return Err(invalid(format!(
                    "artifact '{name}' would overwrite the final output"
                )));
            }
        }

        Ok(())
    }

    /// Report missing input files. Empty when every input exists.
    pub fn validate_inputs(&self) -> Vec<String> {
        let mut errors = vec![];

        let check = |path: &Path, label: &str, errors: &mut Vec<String>| {
            if !path.exists() {
                errors.push(format!("{label} missing: {}", path.display()));
            }
        };

        check(&self.inputs.source_video, "Source video", &mut errors);
        check(&self.inputs.replacement_audio, "Replacement audio", &mut errors);
        check(&self.inputs.intro, "Intro clip", &mut errors);
        check(&self.inputs.outro, "Outro clip", &mut errors);

        errors
    }
}

/// Errors that can occur when working with compositions.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid composition: {message}")]
    ValidationError { message: String },
}

fn invalid(message: impl Into<String>) -> ModelError {
    ModelError::ValidationError {
        message: message.into(),
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_composition_is_valid() {
        assert!(Composition::default().validate().is_ok());
        assert!(Composition::sample().validate().is_ok());
    }

    #[test]
    fn test_sample_has_two_blocks_sharing_anchor() {
        let sample = Composition::sample();
        let blocks = &sample.captions.blocks;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines.len(), 5);
        assert_eq!(blocks[1].lines.len(), 3);
        assert_eq!(blocks[0].anchor_y, blocks[1].anchor_y);

        let first = blocks[0].window.resolve(4.0);
        let second = blocks[1].window.resolve(4.0);
        assert!(!first.overlaps(&second));
    }

    #[test]
    fn test_rejects_invalid_lead_in() {
        let mut composition = Composition::default();
        composition.lead_in_secs = 0.0;
        assert!(composition.validate().is_err());
    }

    #[test]
    fn test_rejects_odd_dimensions() {
        let mut composition = Composition::default();
        composition.target.width = 1281;
        let err = composition.validate().unwrap_err();
        assert!(err.to_string().contains("even"));
    }

    #[test]
    fn test_rejects_duplicate_artifact_names() {
        let mut composition = Composition::default();
        composition.artifacts.merged = composition.artifacts.overlaid.clone();
        assert!(composition.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_caption_window() {
        let mut composition = Composition::sample();
        composition.captions.blocks[1].window.duration_secs = 0.0;
        let err = composition.validate().unwrap_err();
        assert!(err.to_string().contains("second_box"));
    }

    #[test]
    fn test_rejects_anchor_outside_frame() {
        let mut composition = Composition::sample();
        composition.captions.blocks[0].anchor_y = u32::MAX - 10;
        let err = composition.validate().unwrap_err();
        assert!(err.to_string().contains("first_box"));

        composition.captions.blocks[0].anchor_y = composition.target.height;
        assert!(composition.validate().is_err());

        composition.captions.blocks[0].anchor_y = composition.target.height - 1;
        assert!(composition.validate().is_ok());
    }

    #[test]
    fn test_cleanup_policy_semantics() {
        assert!(CleanupPolicy::Always.cleans_on_success());
        assert!(CleanupPolicy::Always.cleans_on_failure());
        assert!(CleanupPolicy::KeepOnFailure.cleans_on_success());
        assert!(!CleanupPolicy::KeepOnFailure.cleans_on_failure());
        assert!(!CleanupPolicy::Never.cleans_on_success());
        assert!(!CleanupPolicy::Never.cleans_on_failure());
    }

    #[test]
    fn test_save_and_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composition.json");

        Composition::sample().save(&path).unwrap();
        let loaded = Composition::load(&path).unwrap();

        assert_eq!(loaded.inputs.source_video, dir.path().join("source.mp4"));
        assert_eq!(loaded.work_dir, dir.path().join("work"));
        assert_eq!(loaded.output, dir.path().join("final_output.mp4"));
        assert_eq!(loaded.captions.blocks.len(), 2);
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let json = r#"{
            "inputs": {
                "source_video": "/media/source.mp4",
                "replacement_audio": "/media/voice.mp3",
                "intro": "/media/intro.mp4",
                "outro": "/media/outro.mp4"
            },
            "output": "/media/out.mp4",
            "lead_in_secs": 3.5
        }"#;
        let composition: Composition = serde_json::from_str(json).unwrap();
        assert_eq!(composition.cleanup, CleanupPolicy::Always);
        assert!(composition.verify_concat_compat);
        assert_eq!(composition.artifacts, ArtifactNames::default());
        assert_eq!(composition.captions.style.emphasis_font_pt, 48);
        assert_eq!(composition.target.width, 1280);
    }

    #[test]
    fn test_cleanup_policy_serialization() {
        let json = serde_json::to_string(&CleanupPolicy::KeepOnFailure).unwrap();
        assert_eq!(json, "\"keep-on-failure\"");
    }

    #[test]
    fn test_validate_inputs_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut composition = Composition::default();
        composition.resolve_relative_to(dir.path());
        std::fs::write(&composition.inputs.intro, b"").unwrap();

        let errors = composition.validate_inputs();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("Source video missing")));
        assert!(!errors.iter().any(|e| e.contains("Intro")));
    }
}
