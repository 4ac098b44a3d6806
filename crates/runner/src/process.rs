use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;

/// Captured output of a successful external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("could not execute {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} {args:?} failed ({status})\nstdout: {stdout}\nstderr: {stderr}")]
    Failed {
        program: String,
        args: Vec<String>,
        status: String,
        stdout: String,
        stderr: String,
    },
}

/// Runs external collaborators (helper scripts, `oc`).
pub trait CommandRunner {
    fn run(
        &self,
        program: &Path,
        args: &[&str],
    ) -> impl Future<Output = Result<CommandOutput, CommandError>> + Send;
}

/// Runs commands from a base directory.
///
/// Relative program paths with more than one component (`tests/scripts/x.sh`)
/// resolve against the base directory; bare names go through `PATH`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    base_dir: PathBuf,
}

impl ProcessRunner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, program: &Path) -> PathBuf {
        if program.is_relative() && program.components().count() > 1 {
            self.base_dir.join(program)
        } else {
            program.to_path_buf()
        }
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let resolved = self.resolve(program);
        tracing::debug!(program = %resolved.display(), ?args, "running command");

        let out = tokio::process::Command::new(&resolved)
            .args(args)
            .current_dir(&self.base_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                program: resolved.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&out.stdout).to_string();
        let stderr = String::from_utf8_lossy(&out.stderr).to_string();
        if !out.status.success() {
            return Err(CommandError::Failed {
                program: resolved.display().to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                status: out.status.to_string(),
                stdout,
                stderr,
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }
}
