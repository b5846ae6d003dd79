//! The composition state machine.
//!
//! ```text
//! Start → LeadInExtracted → AudioReplaced → RemainderExtracted
//!       → ManifestWritten → PartsMerged → OverlayApplied
//!       → FinalAssembled → Cleaned → Done
//! ```
//!
//! Every state after `Start` is reached by exactly one transition function.
//! Any failure moves the run to the absorbing `Failed` state; artifacts are
//! then released according to the composition's cleanup policy.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use promoreel_composition_model::{ClipSpec, Composition, WindowAnchor};
use promoreel_text_layout::{EmphasisClassifier, LineClassifier};
use serde::Serialize;

use crate::artifacts::{ArtifactScope, RunOutcome};
use crate::executor::{StageExecutor, StageFailure};
use crate::filter_graph::{build_assembly_graph, build_caption_chain};
use crate::invocation::{AudioOutput, FilterGraph, InputSource, Invocation, VideoOutput};
use crate::manifest::{render_manifest, write_manifest};
use crate::probe::{concat_mismatches, MediaProbe};

/// States of a composition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    LeadInExtracted,
    AudioReplaced,
    RemainderExtracted,
    ManifestWritten,
    PartsMerged,
    OverlayApplied,
    FinalAssembled,
    Cleaned,
    Done,
    Failed,
}

impl PipelineState {
    /// The eight stage states, in execution order.
    pub const STAGES: [PipelineState; 8] = [
        PipelineState::LeadInExtracted,
        PipelineState::AudioReplaced,
        PipelineState::RemainderExtracted,
        PipelineState::ManifestWritten,
        PipelineState::PartsMerged,
        PipelineState::OverlayApplied,
        PipelineState::FinalAssembled,
        PipelineState::Cleaned,
    ];

    /// Successor on success. `None` for terminal states.
    pub fn next(self) -> Option<Self> {
        use PipelineState::*;
        match self {
            Start => Some(LeadInExtracted),
            LeadInExtracted => Some(AudioReplaced),
            AudioReplaced => Some(RemainderExtracted),
            RemainderExtracted => Some(ManifestWritten),
            ManifestWritten => Some(PartsMerged),
            PartsMerged => Some(OverlayApplied),
            OverlayApplied => Some(FinalAssembled),
            FinalAssembled => Some(Cleaned),
            Cleaned => Some(Done),
            Done | Failed => None,
        }
    }

    /// 1-based position among [`Self::STAGES`]; 0 for `Start`.
    pub fn stage_index(self) -> usize {
        Self::STAGES
            .iter()
            .position(|s| *s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::LeadInExtracted => "lead_in_extracted",
            PipelineState::AudioReplaced => "audio_replaced",
            PipelineState::RemainderExtracted => "remainder_extracted",
            PipelineState::ManifestWritten => "manifest_written",
            PipelineState::PartsMerged => "parts_merged",
            PipelineState::OverlayApplied => "overlay_applied",
            PipelineState::FinalAssembled => "final_assembled",
            PipelineState::Cleaned => "cleaned",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing or invalid inputs.
    Input,
    /// Parts cannot be joined without re-encoding.
    CodecIncompatible,
    /// Anything else the encoder or filesystem reported.
    Process,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Input => "input error",
            FailureKind::CodecIncompatible => "codec incompatibility",
            FailureKind::Process => "process error",
        };
        f.write_str(s)
    }
}

/// Terminal failure of a run.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{state} failed (stage {stage_index}/{}, {kind}): {diagnostic}", PipelineState::STAGES.len())]
pub struct PipelineFailure {
    /// State whose transition failed.
    pub state: PipelineState,
    pub stage_index: usize,
    pub kind: FailureKind,
    pub diagnostic: String,
}

impl PipelineFailure {
    pub fn new(state: PipelineState, kind: FailureKind, diagnostic: impl Into<String>) -> Self {
        Self {
            state,
            stage_index: state.stage_index(),
            kind,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub output: PathBuf,
    /// Every state visited, `Start` through `Done`.
    pub states: Vec<PipelineState>,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    /// Lead-in end used to place caption windows.
    pub lead_in_end_secs: f64,
    pub removed_artifacts: Vec<PathBuf>,
}

/// Progress report emitted after each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineProgress {
    pub state: PipelineState,
    pub stage_index: usize,
    pub total_stages: usize,
}

/// Progress callback for pipeline runs.
pub type ProgressCallback = Box<dyn Fn(PipelineProgress) + Send + Sync>;

/// What one stage does, without doing it.
#[derive(Debug, Clone)]
pub enum StageAction {
    Encode(Invocation),
    WriteManifest { path: PathBuf, contents: String },
    Cleanup { paths: Vec<PathBuf> },
}

/// A stage in a dry-run plan.
#[derive(Debug, Clone)]
pub struct PlannedStage {
    pub state: PipelineState,
    pub action: StageAction,
}

/// Mutable state of one run.
struct RunContext {
    state: PipelineState,
    visited: Vec<PipelineState>,
    scope: ArtifactScope,
    lead_in_end_secs: f64,
    removed: Vec<PathBuf>,
}

/// Drives a composition through the state machine.
pub struct Pipeline {
    composition: Composition,
    executor: Arc<dyn StageExecutor>,
    probe: Arc<dyn MediaProbe>,
    classifier: Arc<dyn LineClassifier>,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    pub fn new(
        composition: Composition,
        executor: Arc<dyn StageExecutor>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        let classifier = Arc::new(EmphasisClassifier::from_style(&composition.captions.style));
        Self {
            composition,
            executor,
            probe,
            classifier,
            progress: None,
        }
    }

    /// Replace the emphasis classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn LineClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Run every stage. On failure nothing after the failing stage runs.
    pub async fn run(&self) -> Result<PipelineReport, PipelineFailure> {
        let started_at = Utc::now();
        let clock = std::time::Instant::now();

        tracing::info!(
            output = %self.composition.output.display(),
            work_dir = %self.composition.work_dir.display(),
            cleanup = ?self.composition.cleanup,
            "Starting composition"
        );

        self.preflight().await?;

        let mut ctx = RunContext {
            state: PipelineState::Start,
            visited: vec![PipelineState::Start],
            scope: ArtifactScope::new(self.composition.cleanup),
            lead_in_end_secs: self.composition.lead_in_secs,
            removed: Vec::new(),
        };

        while let Some(next) = ctx.state.next() {
            if let Err(failure) = self.advance(&mut ctx, next).await {
                return Err(self.fail(&mut ctx, failure));
            }

            ctx.state = next;
            ctx.visited.push(next);
            tracing::info!(state = %next, stage = next.stage_index(), "Pipeline advanced");
            if let Some(cb) = &self.progress {
                cb(PipelineProgress {
                    state: next,
                    stage_index: next.stage_index(),
                    total_stages: PipelineState::STAGES.len(),
                });
            }
        }

        let elapsed_secs = clock.elapsed().as_secs_f64();
        tracing::info!(
            output = %self.composition.output.display(),
            elapsed_secs,
            removed = ctx.removed.len(),
            "Composition finished"
        );

        Ok(PipelineReport {
            output: self.composition.output.clone(),
            states: std::mem::take(&mut ctx.visited),
            started_at,
            elapsed_secs,
            lead_in_end_secs: ctx.lead_in_end_secs,
            removed_artifacts: std::mem::take(&mut ctx.removed),
        })
    }

    /// Every stage's action, using the configured lead-in length for caption
    /// placement. Nothing is executed or written.
    pub fn plan(&self) -> Result<Vec<PlannedStage>, PipelineFailure> {
        let c = &self.composition;
        let lead_in_end = c.lead_in_secs;
        let mut stages = Vec::with_capacity(PipelineState::STAGES.len());

        for state in PipelineState::STAGES {
            let action = match state {
                PipelineState::LeadInExtracted => StageAction::Encode(self.lead_in_invocation()?),
                PipelineState::AudioReplaced => StageAction::Encode(self.audio_invocation()),
                PipelineState::RemainderExtracted => {
                    StageAction::Encode(self.remainder_invocation()?)
                }
                PipelineState::ManifestWritten => StageAction::WriteManifest {
                    path: self.path(&c.artifacts.manifest),
                    contents: render_manifest(&self.merge_parts())
                        .map_err(|e| PipelineFailure::new(state, FailureKind::Process, e.to_string()))?,
                },
                PipelineState::PartsMerged => StageAction::Encode(self.merge_invocation()),
                PipelineState::OverlayApplied => {
                    StageAction::Encode(self.overlay_invocation(lead_in_end)?)
                }
                PipelineState::FinalAssembled => StageAction::Encode(self.assembly_invocation()),
                PipelineState::Cleaned => StageAction::Cleanup {
                    paths: self.artifact_paths(),
                },
                _ => continue,
            };
            stages.push(PlannedStage { state, action });
        }

        Ok(stages)
    }

    /// Program name the executor runs, for rendering plans.
    pub fn program(&self) -> PathBuf {
        self.executor.program().to_path_buf()
    }

    async fn preflight(&self) -> Result<(), PipelineFailure> {
        let at_start = |kind, message: String| PipelineFailure::new(PipelineState::Start, kind, message);

        self.composition
            .validate()
            .map_err(|e| at_start(FailureKind::Input, e.to_string()))?;

        let missing = self.composition.validate_inputs();
        if !missing.is_empty() {
            return Err(at_start(FailureKind::Input, missing.join("; ")));
        }

        tokio::fs::create_dir_all(&self.composition.work_dir)
            .await
            .map_err(|e| {
                at_start(
                    FailureKind::Process,
                    format!(
                        "cannot create work directory {}: {e}",
                        self.composition.work_dir.display()
                    ),
                )
            })?;

        if let Some(parent) = self
            .composition
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                at_start(
                    FailureKind::Process,
                    format!("cannot create output directory {}: {e}", parent.display()),
                )
            })?;
        }

        Ok(())
    }

    async fn advance(&self, ctx: &mut RunContext, next: PipelineState) -> Result<(), PipelineFailure> {
        match next {
            PipelineState::LeadInExtracted => self.extract_lead_in(ctx).await,
            PipelineState::AudioReplaced => self.replace_audio(ctx).await,
            PipelineState::RemainderExtracted => self.extract_remainder(ctx).await,
            PipelineState::ManifestWritten => self.write_concat_manifest(ctx).await,
            PipelineState::PartsMerged => self.merge_parts_stage(ctx).await,
            PipelineState::OverlayApplied => self.apply_overlay(ctx).await,
            PipelineState::FinalAssembled => self.assemble_final(ctx).await,
            PipelineState::Cleaned => {
                self.clean(ctx);
                Ok(())
            }
            PipelineState::Done => Ok(()),
            PipelineState::Start | PipelineState::Failed => Err(PipelineFailure::new(
                next,
                FailureKind::Process,
                format!("invalid transition from {} to {next}", ctx.state),
            )),
        }
    }

    async fn extract_lead_in(&self, ctx: &mut RunContext) -> Result<(), PipelineFailure> {
        ctx.scope.track(self.path(&self.composition.artifacts.lead_in));
        let invocation = self.lead_in_invocation()?;
        self.execute(PipelineState::LeadInExtracted, &invocation).await
    }

    async fn replace_audio(&self, ctx: &mut RunContext) -> Result<(), PipelineFailure> {
        let output = ctx
            .scope
            .track(self.path(&self.composition.artifacts.lead_in_audio));
        self.execute(PipelineState::AudioReplaced, &self.audio_invocation())
            .await?;

        if self.uses_lead_in_anchor() {
            ctx.lead_in_end_secs = self.measure_lead_in(&output).await;
        }
        Ok(())
    }

    async fn extract_remainder(&self, ctx: &mut RunContext) -> Result<(), PipelineFailure> {
        ctx.scope.track(self.path(&self.composition.artifacts.remainder));
        let invocation = self.remainder_invocation()?;
        self.execute(PipelineState::RemainderExtracted, &invocation)
            .await
    }

    async fn write_concat_manifest(&self, ctx: &mut RunContext) -> Result<(), PipelineFailure> {
        let path = ctx.scope.track(self.path(&self.composition.artifacts.manifest));
        write_manifest(&path, &self.merge_parts())
            .await
            .map_err(|e| {
                PipelineFailure::new(PipelineState::ManifestWritten, FailureKind::Process, e.to_string())
            })
    }

    async fn merge_parts_stage(&self, ctx: &mut RunContext) -> Result<(), PipelineFailure> {
        if self.composition.verify_concat_compat {
            self.verify_parts_compatible().await?;
        }
        ctx.scope.track(self.path(&self.composition.artifacts.merged));
        self.execute(PipelineState::PartsMerged, &self.merge_invocation())
            .await
    }

    async fn apply_overlay(&self, ctx: &mut RunContext) -> Result<(), PipelineFailure> {
        ctx.scope.track(self.path(&self.composition.artifacts.overlaid));
        let invocation = self.overlay_invocation(ctx.lead_in_end_secs)?;
        self.execute(PipelineState::OverlayApplied, &invocation).await
    }

    async fn assemble_final(&self, _ctx: &mut RunContext) -> Result<(), PipelineFailure> {
        let result = self
            .execute(PipelineState::FinalAssembled, &self.assembly_invocation())
            .await;

        if result.is_err() {
            // A half-written output must not pass for a finished one.
            if let Err(e) = tokio::fs::remove_file(&self.composition.output).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %self.composition.output.display(),
                        error = %e,
                        "Failed to remove partial output"
                    );
                }
            }
        }
        result
    }

    fn clean(&self, ctx: &mut RunContext) {
        ctx.removed = ctx.scope.release(RunOutcome::Succeeded);
    }

    fn fail(&self, ctx: &mut RunContext, failure: PipelineFailure) -> PipelineFailure {
        tracing::error!(
            state = %failure.state,
            stage = failure.stage_index,
            kind = %failure.kind,
            diagnostic = %failure.diagnostic,
            "Composition failed"
        );
        ctx.visited.push(PipelineState::Failed);
        ctx.state = PipelineState::Failed;

        let removed = ctx.scope.release(RunOutcome::Failed);
        if removed.is_empty() && !ctx.scope.policy().cleans_on_failure() {
            tracing::info!(
                work_dir = %self.composition.work_dir.display(),
                "Intermediate artifacts left for inspection"
            );
        }
        failure
    }

    async fn execute(&self, state: PipelineState, invocation: &Invocation) -> Result<(), PipelineFailure> {
        tracing::info!(
            state = %state,
            output = %invocation.output.display(),
            "Running stage"
        );
        self.executor
            .run(invocation)
            .await
            .map_err(|failure| classify_failure(state, &failure))
    }

    async fn verify_parts_compatible(&self) -> Result<(), PipelineFailure> {
        let [first, second] = self.merge_parts();

        let probed = async {
            let a = self.probe.probe(&first).await?;
            let b = self.probe.probe(&second).await?;
            Ok::<_, promoreel_common::PromoreelError>((a, b))
        }
        .await;

        match probed {
            Ok((a, b)) => {
                let mismatches = concat_mismatches(&a, &b);
                if mismatches.is_empty() {
                    Ok(())
                } else {
                    Err(PipelineFailure::new(
                        PipelineState::PartsMerged,
                        FailureKind::CodecIncompatible,
                        format!(
                            "{} and {} cannot be stream-copied together: {}",
                            first.display(),
                            second.display(),
                            mismatches.join("; ")
                        ),
                    ))
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not probe parts before merge, skipping check");
                Ok(())
            }
        }
    }

    async fn measure_lead_in(&self, path: &std::path::Path) -> f64 {
        let fallback = self.composition.lead_in_secs;
        match self.probe.probe(path).await {
            Ok(info) => match info.duration_secs {
                Some(duration) if duration > 0.0 => {
                    tracing::info!(measured_secs = duration, configured_secs = fallback, "Measured lead-in");
                    duration
                }
                _ => {
                    tracing::warn!(path = %path.display(), "Lead-in has no duration, using configured length");
                    fallback
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Could not measure lead-in, using configured length");
                fallback
            }
        }
    }

    fn uses_lead_in_anchor(&self) -> bool {
        self.composition
            .captions
            .blocks
            .iter()
            .any(|b| b.window.anchor == WindowAnchor::LeadInEnd)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.composition.artifact_path(name)
    }

    fn merge_parts(&self) -> [PathBuf; 2] {
        let names = &self.composition.artifacts;
        [self.path(&names.lead_in_audio), self.path(&names.remainder)]
    }

    fn artifact_paths(&self) -> Vec<PathBuf> {
        let names = &self.composition.artifacts;
        [
            &names.lead_in,
            &names.lead_in_audio,
            &names.remainder,
            &names.manifest,
            &names.merged,
            &names.overlaid,
        ]
        .into_iter()
        .map(|n| self.path(n))
        .collect()
    }

    fn lead_in_invocation(&self) -> Result<Invocation, PipelineFailure> {
        let c = &self.composition;
        let clip = ClipSpec::head(&c.inputs.source_video, c.lead_in_secs).map_err(|e| {
            PipelineFailure::new(PipelineState::LeadInExtracted, FailureKind::Input, e.to_string())
        })?;
        Ok(Invocation::new(self.path(&c.artifacts.lead_in), &c.encode).input(InputSource::clip(clip)))
    }

    fn audio_invocation(&self) -> Invocation {
        let c = &self.composition;
        Invocation::new(self.path(&c.artifacts.lead_in_audio), &c.encode)
            .input(InputSource::file(self.path(&c.artifacts.lead_in)))
            .input(InputSource::file(&c.inputs.replacement_audio))
            .map("0:v:0")
            .map("1:a:0")
            .video(VideoOutput::Copy)
            .shortest()
    }

    fn remainder_invocation(&self) -> Result<Invocation, PipelineFailure> {
        let c = &self.composition;
        let clip = ClipSpec::tail_from(&c.inputs.source_video, c.lead_in_secs).map_err(|e| {
            PipelineFailure::new(PipelineState::RemainderExtracted, FailureKind::Input, e.to_string())
        })?;
        Ok(Invocation::new(self.path(&c.artifacts.remainder), &c.encode).input(InputSource::clip(clip)))
    }

    fn merge_invocation(&self) -> Invocation {
        let c = &self.composition;
        Invocation::new(self.path(&c.artifacts.merged), &c.encode)
            .input(InputSource::concat_manifest(self.path(&c.artifacts.manifest)))
            .video(VideoOutput::Copy)
            .audio(AudioOutput::Copy)
    }

    fn overlay_invocation(&self, lead_in_end_secs: f64) -> Result<Invocation, PipelineFailure> {
        let c = &self.composition;
        let chain = build_caption_chain(
            c.target,
            &c.captions.style,
            &c.captions.blocks,
            self.classifier.as_ref(),
            lead_in_end_secs,
        )
        .map_err(|e| PipelineFailure::new(PipelineState::OverlayApplied, FailureKind::Input, e.to_string()))?;

        Ok(Invocation::new(self.path(&c.artifacts.overlaid), &c.encode)
            .input(InputSource::file(self.path(&c.artifacts.merged)))
            .filter(FilterGraph::Simple(chain.render()))
            .audio(AudioOutput::Copy))
    }

    fn assembly_invocation(&self) -> Invocation {
        let c = &self.composition;
        Invocation::new(&c.output, &c.encode)
            .input(InputSource::file(&c.inputs.intro))
            .input(InputSource::file(self.path(&c.artifacts.overlaid)))
            .input(InputSource::file(&c.inputs.outro))
            .filter(FilterGraph::Complex(build_assembly_graph(c.target, &c.encode)))
            .map("[outv]")
            .map("[outa]")
            .faststart()
    }
}

const MISSING_INPUT_MARKERS: [&str; 2] = ["No such file or directory", "does not exist"];

/// Map an executor failure onto the failure taxonomy.
///
/// The encoder reports missing inputs on stderr like any other error, so the
/// diagnostic text decides. Anything else failing a stream-copy merge is a
/// codec mismatch.
pub fn classify_failure(state: PipelineState, failure: &StageFailure) -> PipelineFailure {
    let kind = match failure {
        StageFailure::Spawn { .. } => FailureKind::Process,
        StageFailure::Exited { diagnostic, .. } => {
            if MISSING_INPUT_MARKERS.iter().any(|m| diagnostic.contains(m)) {
                FailureKind::Input
            } else if state == PipelineState::PartsMerged {
                FailureKind::CodecIncompatible
            } else {
                FailureKind::Process
            }
        }
    };
    PipelineFailure::new(state, kind, failure.to_string())
}
