//! Concat demuxer manifests.
//!
//! One `file '<path>'` line per part. Paths are absolute with forward
//! slashes; a single quote inside a path closes the quoted string, emits an
//! escaped quote, and reopens it (`'\''`).

use std::path::{Path, PathBuf};

use promoreel_common::error::PromoreelResult;

/// Manifest text listing `parts` in order.
pub fn render_manifest<P: AsRef<Path>>(parts: &[P]) -> PromoreelResult<String> {
    let mut manifest = String::new();
    for part in parts {
        let absolute = absolutize(part.as_ref())?;
        manifest.push_str(&manifest_entry(&absolute));
        manifest.push('\n');
    }
    Ok(manifest)
}

/// Write the manifest for `parts` to `path`.
pub async fn write_manifest<P: AsRef<Path>>(path: &Path, parts: &[P]) -> PromoreelResult<()> {
    let manifest = render_manifest(parts)?;
    tokio::fs::write(path, manifest.as_bytes()).await?;
    tracing::debug!(path = %path.display(), parts = parts.len(), "Wrote concat manifest");
    Ok(())
}

/// One manifest line, without the trailing newline.
pub fn manifest_entry(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    format!("file '{}'", normalized.replace('\'', "'\\''"))
}

fn absolutize(path: &Path) -> PromoreelResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_lists_parts_in_order() {
        let manifest =
            render_manifest(&["/work/lead_in_audio.mp4", "/work/remainder.mp4"]).unwrap();
        assert_eq!(
            manifest,
            "file '/work/lead_in_audio.mp4'\nfile '/work/remainder.mp4'\n"
        );
    }

    #[test]
    fn test_relative_paths_become_absolute() {
        let manifest = render_manifest(&["part.mp4"]).unwrap();
        let cwd = std::env::current_dir().unwrap();
        let expected = manifest_entry(&cwd.join("part.mp4"));
        assert_eq!(manifest, format!("{expected}\n"));
        assert!(!manifest.contains('\\'));
    }

    #[test]
    fn test_entry_escapes_quotes_and_backslashes() {
        assert_eq!(
            manifest_entry(Path::new("/media/it's.mp4")),
            "file '/media/it'\\''s.mp4'"
        );
        assert_eq!(
            manifest_entry(Path::new("C:\\work\\part.mp4")),
            "file 'C:/work/part.mp4'"
        );
    }

    #[tokio::test]
    async fn test_write_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let lead_in = dir.path().join("lead_in_audio.mp4");
        let remainder = dir.path().join("remainder.mp4");
        let path = dir.path().join("concat_list.txt");

        write_manifest(&path, &[&lead_in, &remainder]).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("lead_in_audio.mp4'"));
        assert!(lines[1].ends_with("remainder.mp4'"));
        assert!(written.ends_with('\n'));
    }
}
