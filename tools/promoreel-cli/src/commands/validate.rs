//! Validate a composition file.

use std::path::PathBuf;

use promoreel_composition_model::Composition;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating composition at: {}", path.display());

    let composition = Composition::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load composition: {e}"))?;

    println!("  Output: {}", composition.output.display());
    println!("  Lead-in: {}s", composition.lead_in_secs);
    println!(
        "  Target: {}x{}",
        composition.target.width, composition.target.height
    );
    println!("  Caption blocks: {}", composition.captions.blocks.len());

    if let Err(e) = composition.validate() {
        println!("\n{e}");
        return Err(anyhow::anyhow!("Composition is invalid"));
    }

    let errors = composition.validate_inputs();
    if !errors.is_empty() {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        return Err(anyhow::anyhow!(
            "{} input(s) missing; the pipeline will refuse to run",
            errors.len()
        ));
    }

    println!("  Inputs: All present");
    println!("\nComposition is valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sample(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("composition.json");
        Composition::sample().save(&path).unwrap();
        path
    }

    #[test]
    fn test_missing_inputs_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());

        let err = run(path).unwrap_err();
        assert!(err.to_string().contains("4 input(s) missing"));
    }

    #[test]
    fn test_present_inputs_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());
        for name in ["source.mp4", "audio.mp3", "intro.mp4", "outro.mp4"] {
            std::fs::write(dir.path().join(name), b"media").unwrap();
        }

        assert!(run(path).is_ok());
    }

    #[test]
    fn test_invalid_composition_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composition.json");
        let mut composition = Composition::sample();
        composition.captions.blocks[0].anchor_y = 5000;
        composition.save(&path).unwrap();

        assert!(run(path).is_err());
    }
}
