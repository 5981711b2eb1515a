// ABOUTME: External command runner used for hooks and shell-backed collaborators.
// ABOUTME: Runs `sh -c` in an explicit directory and captures exit code and output.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::CollaboratorError;

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `dir` as working directory and `env` added.
    async fn run(
        &self,
        dir: &Path,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, CollaboratorError>;
}

/// Runs commands as child processes through `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        dir: &Path,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, CollaboratorError> {
        tracing::debug!(dir = %dir.display(), "running: {}", command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CollaboratorError::Spawn {
                command: command.to_string(),
                dir: dir.to_path_buf(),
                source,
            })?;

        // Killed by a signal: no exit code, report a generic failure.
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
