//! Local shell execution for ingredients that converge state via generated
//! scripts. Uses bash (not sh/dash) because generated scripts use
//! `set -o pipefail`.

use super::IngredientError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Output from one script run.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a script through bash, feeding it on stdin.
pub async fn run_script(script: &str) -> Result<ShellOutput, IngredientError> {
    let mut child = Command::new("bash")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| IngredientError::Shell(format!("failed to spawn bash: {}", e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(script.as_bytes())
            .await
            .map_err(|e| IngredientError::Shell(format!("stdin write error: {}", e)))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| IngredientError::Shell(format!("wait error: {}", e)))?;

    Ok(ShellOutput {
        // Killed by signal -> no exit code
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_echo() {
        let out = tokio_test::block_on(run_script("echo hello")).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_shell_exit_code() {
        let out = tokio_test::block_on(run_script("exit 42")).unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 42);
    }

    #[test]
    fn test_shell_stderr() {
        let out = tokio_test::block_on(run_script("echo err >&2")).unwrap();
        assert!(out.success());
        assert!(out.stderr.contains("err"));
    }

    #[test]
    fn test_shell_pipefail() {
        let out = tokio_test::block_on(run_script("set -euo pipefail\nfalse | true")).unwrap();
        assert!(!out.success(), "pipefail should catch false in pipeline");
    }
}
