//! Intermediate artifact lifecycle.

use std::path::{Path, PathBuf};

use promoreel_composition_model::CleanupPolicy;

/// How a run ended, as far as cleanup is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// Tracks intermediate files for one run and removes them on release.
///
/// Paths are tracked before the stage that writes them starts, so partial
/// output from a failed stage is covered too. Dropping an unreleased scope
/// (a cancelled run, a panic) counts as a failure.
#[derive(Debug)]
pub struct ArtifactScope {
    policy: CleanupPolicy,
    tracked: Vec<PathBuf>,
    released: bool,
}

impl ArtifactScope {
    pub fn new(policy: CleanupPolicy) -> Self {
        Self {
            policy,
            tracked: Vec::new(),
            released: false,
        }
    }

    pub fn policy(&self) -> CleanupPolicy {
        self.policy
    }

    /// Start tracking `path` and hand it back.
    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        if !self.tracked.contains(&path) {
            self.tracked.push(path.clone());
        }
        path
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }

    /// Remove tracked files as the policy dictates for `outcome`.
    ///
    /// Returns the files actually removed. Files that were never written are
    /// skipped silently. Releasing twice is a no-op.
    pub fn release(&mut self, outcome: RunOutcome) -> Vec<PathBuf> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        let cleans = match outcome {
            RunOutcome::Succeeded => self.policy.cleans_on_success(),
            RunOutcome::Failed => self.policy.cleans_on_failure(),
        };

        if !cleans {
            let present: Vec<_> = self.tracked.iter().filter(|p| p.exists()).collect();
            if !present.is_empty() {
                tracing::info!(
                    policy = ?self.policy,
                    ?outcome,
                    kept = present.len(),
                    "Keeping intermediate artifacts"
                );
            }
            return Vec::new();
        }

        let removed: Vec<PathBuf> = self
            .tracked
            .iter()
            .filter(|path| remove_artifact(path))
            .cloned()
            .collect();

        tracing::info!(?outcome, removed = removed.len(), "Released intermediate artifacts");
        removed
    }
}

impl Drop for ArtifactScope {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!("Artifact scope dropped without release, treating run as failed");
            self.release(RunOutcome::Failed);
        }
    }
}

fn remove_artifact(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed artifact");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove artifact");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[test]
    fn test_release_on_success_removes_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut scope = ArtifactScope::new(CleanupPolicy::KeepOnFailure);
        let a = scope.track(touch(dir.path(), "a.mp4"));
        let b = scope.track(touch(dir.path(), "b.mp4"));
        scope.track(dir.path().join("never_written.mp4"));

        let removed = scope.release(RunOutcome::Succeeded);
        assert_eq!(removed, vec![a.clone(), b.clone()]);
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_keep_on_failure_leaves_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut scope = ArtifactScope::new(CleanupPolicy::KeepOnFailure);
        let a = scope.track(touch(dir.path(), "a.mp4"));

        assert!(scope.release(RunOutcome::Failed).is_empty());
        assert!(a.exists());
    }

    #[test]
    fn test_always_cleans_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut scope = ArtifactScope::new(CleanupPolicy::Always);
        let a = scope.track(touch(dir.path(), "a.mp4"));

        assert_eq!(scope.release(RunOutcome::Failed), vec![a.clone()]);
        assert!(!a.exists());
    }

    #[test]
    fn test_never_policy_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut scope = ArtifactScope::new(CleanupPolicy::Never);
        let a = scope.track(touch(dir.path(), "a.mp4"));

        assert!(scope.release(RunOutcome::Succeeded).is_empty());
        assert!(a.exists());
    }

    #[test]
    fn test_drop_without_release_cleans_per_policy() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.mp4");
        let b = touch(dir.path(), "b.mp4");

        {
            let mut scope = ArtifactScope::new(CleanupPolicy::Always);
            scope.track(&a);
        }
        {
            let mut scope = ArtifactScope::new(CleanupPolicy::KeepOnFailure);
            scope.track(&b);
        }

        assert!(!a.exists());
        assert!(b.exists());
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut scope = ArtifactScope::new(CleanupPolicy::Always);
        scope.track(touch(dir.path(), "a.mp4"));
        scope.track(dir.path().join("a.mp4"));
        assert_eq!(scope.tracked().len(), 1);

        assert_eq!(scope.release(RunOutcome::Succeeded).len(), 1);
        assert!(scope.release(RunOutcome::Succeeded).is_empty());
    }
}
