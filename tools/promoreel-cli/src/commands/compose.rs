//! Run the composition pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use promoreel_common::config::AppConfig;
use promoreel_composition_model::{CleanupPolicy, Composition};
use promoreel_render_engine::{FfmpegExecutor, FfprobeProbe, Pipeline, PipelineProgress};

pub async fn run(
    app_config: &AppConfig,
    path: PathBuf,
    cleanup: Option<CleanupPolicy>,
    json: bool,
) -> anyhow::Result<()> {
    let mut composition = Composition::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load composition: {e}"))?;
    if let Some(policy) = cleanup {
        composition.cleanup = policy;
    }

    let executor = FfmpegExecutor::from_tools(&app_config.tools);
    if !executor.is_available() {
        return Err(anyhow::anyhow!(
            "Encoder not found: {} (run `promoreel check`)",
            app_config.tools.ffmpeg.display()
        ));
    }

    if !json {
        println!("Composing: {}", path.display());
        println!("  Output: {}", composition.output.display());
        println!("  Work dir: {}", composition.work_dir.display());
        println!("  Cleanup: {:?}", composition.cleanup);
    }

    let progress_cb = Box::new(move |p: PipelineProgress| {
        if !json {
            println!("  [{}/{}] {}", p.stage_index, p.total_stages, p.state);
        }
    });

    let pipeline = Pipeline::new(
        composition,
        Arc::new(executor),
        Arc::new(FfprobeProbe::from_tools(&app_config.tools)),
    )
    .with_progress(progress_cb);

    match pipeline.run().await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\nComposition complete: {}", report.output.display());
                println!("  Elapsed: {:.1}s", report.elapsed_secs);
                println!("  Lead-in ends at: {:.3}s", report.lead_in_end_secs);
                println!("  Artifacts removed: {}", report.removed_artifacts.len());
            }
            Ok(())
        }
        Err(failure) => Err(anyhow::anyhow!("Composition failed: {failure}")),
    }
}
