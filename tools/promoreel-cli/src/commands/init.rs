//! Write a sample composition file.

use std::path::{Path, PathBuf};

use promoreel_common::config::AppConfig;
use promoreel_composition_model::Composition;

pub fn run(path: PathBuf, force: bool) -> anyhow::Result<()> {
    refuse_overwrite(&path, force)?;

    let composition = Composition::sample();
    composition
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write composition: {e}"))?;

    println!("Composition written to {}", path.display());
    println!();
    println!("Paths are relative to the file's directory:");
    println!("  source video:      {}", composition.inputs.source_video.display());
    println!("  replacement audio: {}", composition.inputs.replacement_audio.display());
    println!("  intro:             {}", composition.inputs.intro.display());
    println!("  outro:             {}", composition.inputs.outro.display());
    println!("  output:            {}", composition.output.display());
    println!("  work dir:          {}/", composition.work_dir.display());

    Ok(())
}

/// Write the default application config.
pub fn write_app_config(path: &Path, force: bool) -> anyhow::Result<()> {
    refuse_overwrite(path, force)?;

    AppConfig::default()
        .save_to(path)
        .map_err(|e| anyhow::anyhow!("Failed to write app config: {e}"))?;

    println!("App config written to {}", path.display());
    Ok(())
}

fn refuse_overwrite(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_loadable_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composition.json");

        run(path.clone(), false).unwrap();

        let loaded = Composition::load(&path).unwrap();
        assert!(loaded.validate().is_ok());
        assert!(run(path, false).is_err());
    }

    #[test]
    fn test_writes_app_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promoreel").join("config.json");

        write_app_config(&path, false).unwrap();
        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.tools.ffmpeg, PathBuf::from("ffmpeg"));

        assert!(write_app_config(&path, false).is_err());
        write_app_config(&path, true).unwrap();
    }
}
