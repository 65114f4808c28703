use log::warn;
use std::path::Path;
use std::process::Command;

/// Commit identifier recorded when the provider cannot answer.
pub const UNKNOWN_COMMIT: &str = "unknown";

/// Reports the repository's current commit.
pub trait SourceControl: Send + Sync {
    /// Current commit identifier, or [`UNKNOWN_COMMIT`] on any failure.
    fn current_commit(&self, repo: &Path) -> String;
}

/// `git rev-parse HEAD` through the git CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl SourceControl for GitCli {
    fn current_commit(&self, repo: &Path) -> String {
        match rev_parse_head(repo) {
            Ok(Some(commit)) => commit,
            Ok(None) => UNKNOWN_COMMIT.to_string(),
            Err(err) => {
                warn!("git rev-parse failed in {repo:?}: {err}");
                UNKNOWN_COMMIT.to_string()
            }
        }
    }
}

fn rev_parse_head(repo: &Path) -> std::io::Result<Option<String>> {
    let output = Command::new("git")
        .arg("rev-parse")
        .arg("HEAD")
        .current_dir(repo)
        .output()?;
    if !output.status.success() {
        return Ok(None);
    }
    let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!commit.is_empty()).then_some(commit))
}

/// Fixed answer, for repositories outside source control and for tests.
#[derive(Debug, Clone)]
pub struct StaticCommit(pub String);

impl SourceControl for StaticCommit {
    fn current_commit(&self, _repo: &Path) -> String {
        self.0.clone()
    }
}
