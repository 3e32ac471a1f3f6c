// ABOUTME: Version-control sink that stages, commits, and pushes synced files
// ABOUTME: Shells out to git so existing credential helpers keep working

use crate::commit::CommitMessage;
use crate::error::SinkError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

pub trait VcsSink {
    /// Stage `paths` (additions and deletions) and commit them.
    fn commit(&self, paths: &[PathBuf], message: &CommitMessage) -> Result<(), SinkError>;

    fn push(&self) -> Result<(), SinkError>;
}

pub struct GitSink {
    root: PathBuf,
    remote: Option<String>,
}

impl GitSink {
    pub fn new(root: PathBuf) -> Self {
        GitSink { root, remote: None }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.root);
        cmd
    }

    /// Run a git command and return its trimmed stdout.
    fn git(&self, args: &[&str]) -> Result<String, SinkError> {
        debug!(?args, "git");
        let output = self.command(args).output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(SinkError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn resolve_remote(&self) -> Result<String, SinkError> {
        let remotes = self.git(&["remote"])?;
        let remotes: Vec<&str> = remotes.lines().map(str::trim).filter(|r| !r.is_empty()).collect();
        if let Some(wanted) = &self.remote {
            return remotes
                .iter()
                .find(|r| *r == wanted)
                .map(|r| r.to_string())
                .ok_or(SinkError::NoRemote);
        }
        remotes
            .iter()
            .find(|r| **r == "origin")
            .or_else(|| remotes.first())
            .map(|r| r.to_string())
            .ok_or(SinkError::NoRemote)
    }
}

impl VcsSink for GitSink {
    fn commit(&self, paths: &[PathBuf], message: &CommitMessage) -> Result<(), SinkError> {
        let relative: Vec<String> = paths.iter().map(|p| self.relative(p)).collect();

        let mut add = vec!["add", "-A", "--"];
        add.extend(relative.iter().map(String::as_str));
        self.git(&add)?;

        let mut diff = vec!["diff", "--cached", "--quiet", "--"];
        diff.extend(relative.iter().map(String::as_str));
        let status = self.command(&diff).status()?;
        if status.success() {
            return Err(SinkError::NothingStaged);
        }

        // Limit the commit to `paths`; anything else the user staged stays staged.
        let mut commit = vec!["commit", "--quiet", "-m", message.subject.as_str()];
        if let Some(body) = &message.body {
            commit.extend(["-m", body.as_str()]);
        }
        commit.push("--");
        commit.extend(relative.iter().map(String::as_str));
        self.git(&commit)?;
        Ok(())
    }

    fn push(&self) -> Result<(), SinkError> {
        let remote = self.resolve_remote()?;
        self.git(&["push", "--quiet", &remote, "HEAD"])
            .map(|_| ())
            .map_err(|e| match e {
                SinkError::Command { stderr, .. } => SinkError::PushRejected(stderr),
                other => other,
            })
    }
}
