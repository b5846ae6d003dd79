//! Media inspection through `ffprobe`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use promoreel_common::config::ToolPaths;
use promoreel_common::error::{PromoreelError, PromoreelResult};
use serde::Deserialize;

/// Container duration and the first video and audio stream of a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub duration_secs: Option<f64>,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStreamInfo {
    pub codec_name: String,
    pub profile: Option<String>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStreamInfo {
    pub codec_name: String,
    pub profile: Option<String>,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Reads media metadata.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> PromoreelResult<MediaInfo>;
}

/// Probe backed by an `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_tools(tools: &ToolPaths) -> Self {
        Self::new(&tools.ffprobe)
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::from_tools(&ToolPaths::default())
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> PromoreelResult<MediaInfo> {
        let output = tokio::process::Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_type,codec_name,profile,width,height,pix_fmt,sample_rate,channels",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to start {}", self.program.display()))?;

        if !output.status.success() {
            return Err(PromoreelError::probe(format!(
                "{} failed on {} ({}): {}",
                self.program.display(),
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let info = parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!(path = %path.display(), ?info, "Probed media");
        Ok(info)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -of json` output.
pub fn parse_ffprobe_json(json: &str) -> PromoreelResult<MediaInfo> {
    let parsed: ProbeOutput = serde_json::from_str(json)?;

    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    let mut info = MediaInfo {
        duration_secs,
        ..MediaInfo::default()
    };

    for stream in parsed.streams {
        match stream.codec_type.as_deref() {
            Some("video") if info.video.is_none() => {
                info.video = Some(VideoStreamInfo {
                    codec_name: stream.codec_name.unwrap_or_default(),
                    profile: stream.profile,
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    pixel_format: stream.pix_fmt,
                });
            }
            Some("audio") if info.audio.is_none() => {
                info.audio = Some(AudioStreamInfo {
                    codec_name: stream.codec_name.unwrap_or_default(),
                    profile: stream.profile,
                    sample_rate: stream
                        .sample_rate
                        .and_then(|r| r.parse().ok())
                        .unwrap_or(0),
                    channels: stream.channels.unwrap_or(0),
                });
            }
            _ => {}
        }
    }

    Ok(info)
}

/// Differences that make two files unsafe to join with stream copy.
///
/// Empty when the files are compatible.
pub fn concat_mismatches(first: &MediaInfo, second: &MediaInfo) -> Vec<String> {
    let mut mismatches = Vec::new();

    let mut check = |what: &str, a: String, b: String| {
        if a != b {
            mismatches.push(format!("{what}: {a} vs {b}"));
        }
    };

    match (&first.video, &second.video) {
        (Some(a), Some(b)) => {
            check("video codec", a.codec_name.clone(), b.codec_name.clone());
            check("video profile", describe(&a.profile), describe(&b.profile));
            check(
                "dimensions",
                format!("{}x{}", a.width, a.height),
                format!("{}x{}", b.width, b.height),
            );
            check(
                "pixel format",
                describe(&a.pixel_format),
                describe(&b.pixel_format),
            );
        }
        (None, None) => {}
        (a, b) => check(
            "video stream",
            presence(a.is_some()),
            presence(b.is_some()),
        ),
    }

    match (&first.audio, &second.audio) {
        (Some(a), Some(b)) => {
            check("audio codec", a.codec_name.clone(), b.codec_name.clone());
            check("audio profile", describe(&a.profile), describe(&b.profile));
            check(
                "sample rate",
                a.sample_rate.to_string(),
                b.sample_rate.to_string(),
            );
            check("channels", a.channels.to_string(), b.channels.to_string());
        }
        (None, None) => {}
        (a, b) => check(
            "audio stream",
            presence(a.is_some()),
            presence(b.is_some()),
        ),
    }

    mismatches
}

fn describe(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "none".to_string())
}

fn presence(present: bool) -> String {
    if present { "present" } else { "absent" }.to_string()
}
