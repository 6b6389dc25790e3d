//! `CommandRunner` backed by a hidden `powershell.exe` child process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;

use super::CommandRunner;

/// Suppresses the console window of the child on Windows.
#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub struct PowerShellRunner;

#[async_trait]
impl CommandRunner for PowerShellRunner {
    async fn run(&self, script: &str, timeout: Duration) -> Result<String, AppError> {
        let mut cmd = tokio::process::Command::new("powershell");
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(target_os = "windows")]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd
            .spawn()
            .map_err(|e| AppError::Firewall(format!("failed to start powershell: {e}")))?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| AppError::Timeout(timeout))?
            .map_err(|e| AppError::Firewall(format!("powershell did not complete: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(AppError::Firewall(format!(
                "powershell exited with {}: {stderr}",
                output.status
            )));
        }
        if !stderr.is_empty() {
            tracing::debug!("PowerShell stderr: {stderr}");
        }
        tracing::debug!("PowerShell stdout: {stdout}");
        Ok(stdout)
    }
}
