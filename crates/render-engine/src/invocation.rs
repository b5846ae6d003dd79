//! One external encoder invocation, described as data.

use std::path::{Path, PathBuf};

use promoreel_composition_model::{format_secs, ClipSpec, EncodeSettings};

/// An input file, optionally trimmed and optionally demuxer-forced.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSource {
    pub clip: ClipSpec,
    pub demuxer: Option<Demuxer>,
}

/// Demuxers that have to be selected explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demuxer {
    /// Reads a `file '<path>'` manifest. Absolute paths require `-safe 0`.
    Concat,
}

/// How the video stream of the output is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutput {
    Copy,
    Encode {
        codec: String,
        preset: String,
        crf: u32,
        pixel_format: String,
    },
}

/// How the audio stream of the output is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutput {
    Copy,
    Encode {
        codec: String,
        bitrate_kbps: u32,
        sample_rate: u32,
        channels: Option<u32>,
    },
}

/// A filter graph in one of the two forms the encoder accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterGraph {
    /// Single-input, single-output chain (`-vf`).
    Simple(String),
    /// Labelled multi-input graph (`-filter_complex`).
    Complex(String),
}

/// Everything needed to run the encoder once.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub inputs: Vec<InputSource>,
    pub filter: Option<FilterGraph>,
    pub maps: Vec<String>,
    pub video: VideoOutput,
    pub audio: AudioOutput,
    pub shortest: bool,
    pub faststart: bool,
    pub output: PathBuf,
}

impl InputSource {
    /// The whole file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::clip(ClipSpec::whole(path))
    }

    pub fn clip(clip: ClipSpec) -> Self {
        Self {
            clip,
            demuxer: None,
        }
    }

    /// A concat manifest.
    pub fn concat_manifest(path: impl Into<PathBuf>) -> Self {
        Self {
            clip: ClipSpec::whole(path),
            demuxer: Some(Demuxer::Concat),
        }
    }

    pub fn path(&self) -> &Path {
        self.clip.source()
    }

    fn push_args(&self, args: &mut Vec<String>) {
        if let Some(start) = self.clip.start_offset_secs() {
            args.push("-ss".to_string());
            args.push(format_secs(start));
        }
        if let Some(duration) = self.clip.duration_secs() {
            args.push("-t".to_string());
            args.push(format_secs(duration));
        }
        match self.demuxer {
            Some(Demuxer::Concat) => {
                args.extend(["-f", "concat", "-safe", "0"].map(String::from));
            }
            None => {}
        }
        args.push("-i".to_string());
        args.push(self.path().to_string_lossy().into_owned());
    }
}

impl VideoOutput {
    pub fn encode(settings: &EncodeSettings) -> Self {
        Self::Encode {
            codec: settings.video_codec.clone(),
            preset: settings.preset.clone(),
            crf: settings.crf,
            pixel_format: settings.pixel_format.clone(),
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            Self::Copy => args.extend(["-c:v", "copy"].map(String::from)),
            Self::Encode {
                codec,
                preset,
                crf,
                pixel_format,
            } => args.extend([
                "-c:v".to_string(),
                codec.clone(),
                "-preset".to_string(),
                preset.clone(),
                "-crf".to_string(),
                crf.to_string(),
                "-pix_fmt".to_string(),
                pixel_format.clone(),
            ]),
        }
    }
}

impl AudioOutput {
    pub fn encode(settings: &EncodeSettings) -> Self {
        Self::Encode {
            codec: settings.audio_codec.clone(),
            bitrate_kbps: settings.audio_bitrate_kbps,
            sample_rate: settings.audio_sample_rate,
            channels: channel_count(&settings.channel_layout),
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            Self::Copy => args.extend(["-c:a", "copy"].map(String::from)),
            Self::Encode {
                codec,
                bitrate_kbps,
                sample_rate,
                channels,
            } => {
                args.extend([
                    "-c:a".to_string(),
                    codec.clone(),
                    "-b:a".to_string(),
                    format!("{bitrate_kbps}k"),
                    "-ar".to_string(),
                    sample_rate.to_string(),
                ]);
                if let Some(channels) = channels {
                    args.push("-ac".to_string());
                    args.push(channels.to_string());
                }
            }
        }
    }
}

impl Invocation {
    /// An invocation writing `output` that re-encodes both streams with
    /// `settings`. Stages override what they need.
    pub fn new(output: impl Into<PathBuf>, settings: &EncodeSettings) -> Self {
        Self {
            inputs: Vec::new(),
            filter: None,
            maps: Vec::new(),
            video: VideoOutput::encode(settings),
            audio: AudioOutput::encode(settings),
            shortest: false,
            faststart: false,
            output: output.into(),
        }
    }

    pub fn input(mut self, input: InputSource) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn filter(mut self, filter: FilterGraph) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn map(mut self, spec: impl Into<String>) -> Self {
        self.maps.push(spec.into());
        self
    }

    pub fn video(mut self, video: VideoOutput) -> Self {
        self.video = video;
        self
    }

    pub fn audio(mut self, audio: AudioOutput) -> Self {
        self.audio = audio;
        self
    }

    /// End the output with the shortest input stream.
    pub fn shortest(mut self) -> Self {
        self.shortest = true;
        self
    }

    /// Move the index to the front of the file for progressive playback.
    pub fn faststart(mut self) -> Self {
        self.faststart = true;
        self
    }

    /// Paths of every input file, in input order.
    pub fn input_paths(&self) -> impl Iterator<Item = &Path> {
        self.inputs.iter().map(InputSource::path)
    }

    /// Full encoder argument list, excluding the program name.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-loglevel", "error"]
            .map(String::from)
            .to_vec();

        for input in &self.inputs {
            input.push_args(&mut args);
        }

        match &self.filter {
            Some(FilterGraph::Simple(graph)) => {
                args.push("-vf".to_string());
                args.push(graph.clone());
            }
            Some(FilterGraph::Complex(graph)) => {
                args.push("-filter_complex".to_string());
                args.push(graph.clone());
            }
            None => {}
        }

        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }

        self.video.push_args(&mut args);
        self.audio.push_args(&mut args);

        if self.shortest {
            args.push("-shortest".to_string());
        }
        if self.faststart {
            args.extend(["-movflags", "+faststart"].map(String::from));
        }

        args.push(self.output.to_string_lossy().into_owned());
        args
    }

    /// Shell-like rendering of the command line, for logs and dry runs.
    pub fn command_line(&self, program: &Path) -> String {
        std::iter::once(program.to_string_lossy().into_owned())
            .chain(self.to_args())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Channel count for a named layout, when it is one the encoder's `-ac`
/// flag can express.
pub fn channel_count(layout: &str) -> Option<u32> {
    match layout {
        "mono" => Some(1),
        "stereo" => Some(2),
        "2.1" | "3.0" => Some(3),
        "quad" | "4.0" => Some(4),
        "5.0" => Some(5),
        "5.1" => Some(6),
        "7.1" => Some(8),
        _ => None,
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
