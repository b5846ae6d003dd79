//! Print what a composition run would do.

use std::path::PathBuf;
use std::sync::Arc;

use promoreel_common::config::AppConfig;
use promoreel_composition_model::Composition;
use promoreel_render_engine::{FfmpegExecutor, FfprobeProbe, Pipeline, PipelineState, StageAction};

pub fn run(app_config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let composition = Composition::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load composition: {e}"))?;
    composition
        .validate()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let pipeline = Pipeline::new(
        composition,
        Arc::new(FfmpegExecutor::from_tools(&app_config.tools)),
        Arc::new(FfprobeProbe::from_tools(&app_config.tools)),
    );
    let program = pipeline.program();
    let stages = pipeline
        .plan()
        .map_err(|e| anyhow::anyhow!("Failed to plan: {e}"))?;

    println!("Plan for: {}", path.display());
    for stage in stages {
        println!();
        println!(
            "[{}/{}] {}",
            stage.state.stage_index(),
            PipelineState::STAGES.len(),
            stage.state
        );
        match stage.action {
            StageAction::Encode(invocation) => {
                println!("  {}", invocation.command_line(&program));
            }
            StageAction::WriteManifest { path, contents } => {
                println!("  write {}:", path.display());
                for line in contents.lines() {
                    println!("    {line}");
                }
            }
            StageAction::Cleanup { paths } => {
                println!("  remove (policy: {:?}):", pipeline.composition().cleanup);
                for path in paths {
                    println!("    {}", path.display());
                }
            }
        }
    }

    Ok(())
}
