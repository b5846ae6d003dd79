//! PromoReel Render Engine
//!
//! Orchestrates the external encoder to turn a source video, a replacement
//! audio track, an intro and an outro into one captioned video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mp4 ──┬── [0, lead-in) ──┐
//!              │                  ├── mux ── lead_in_audio.mp4 ──┐
//! audio.mp3 ───┼──────────────────┘                              │
//!              │                                                 ├── concat (copy)
//!              └── [lead-in, end) ── remainder.mp4 ──────────────┘        │
//!                                                                         ▼
//!                                                       merged.mp4 ── drawtext
//!                                                                         │
//! intro.mp4 ─────────────────────────┐                                    ▼
//!                                    ├── scale/pad/aformat ── concat ◀── overlaid.mp4
//! outro.mp4 ─────────────────────────┘            │
//!                                                 ▼
//!                                          final_output.mp4
//! ```

pub mod artifacts;
pub mod executor;
pub mod filter_graph;
pub mod invocation;
pub mod manifest;
pub mod pipeline;
pub mod probe;

pub use artifacts::{ArtifactScope, RunOutcome};
pub use executor::{command_exists, FfmpegExecutor, StageExecutor, StageFailure};
pub use invocation::{AudioOutput, FilterGraph, InputSource, Invocation, VideoOutput};
pub use pipeline::*;
pub use probe::{FfprobeProbe, MediaInfo, MediaProbe};
