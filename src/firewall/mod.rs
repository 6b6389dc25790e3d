//! Managed firewall rules: create, remove, and check.
//!
//! The controller holds no state beyond the runner and a timeout. Every
//! operation is a single attempt; failures and timeouts are logged and reported
//! as `false`, never retried.

pub mod powershell;
pub mod script;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;

pub use powershell::PowerShellRunner;

/// Executes a firewall script and returns its trimmed standard output.
///
/// Implementations should abandon their work once `timeout` elapses and report
/// [`AppError::Timeout`]; a non-zero exit is [`AppError::Firewall`].
/// [`FirewallRules`] applies the same limit around every call regardless.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, script: &str, timeout: Duration) -> Result<String, AppError>;
}

/// Wrapper around the two managed block rules.
pub struct FirewallRules {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl FirewallRules {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Replace any managed rules with fresh blocks for `ips`.
    pub async fn create_rules(&self, ips: &[String]) -> bool {
        let ips = script::sanitize_addresses(ips);
        if ips.is_empty() {
            tracing::error!("No valid addresses to block; firewall left untouched");
            return false;
        }
        tracing::debug!("Creating firewall rules for {ips:?}");
        self.execute("create", &script::create_script(&ips))
            .await
            .is_some_and(|out| out == script::RESPONSE_OK)
    }

    /// Delete the managed rules. Succeeds when they were already absent.
    pub async fn remove_rules(&self) -> bool {
        tracing::debug!("Removing firewall rules");
        self.execute("remove", &script::remove_script())
            .await
            .is_some_and(|out| out == script::RESPONSE_OK)
    }

    /// Whether both managed rules are present right now. Diagnostic only.
    pub async fn rules_exist(&self) -> bool {
        self.execute("check", &script::check_script())
            .await
            .is_some_and(|out| out == script::RESPONSE_EXISTS)
    }

    async fn execute(&self, action: &str, script: &str) -> Option<String> {
        let result = tokio::time::timeout(self.timeout, self.runner.run(script, self.timeout))
            .await
            .unwrap_or_else(|_| Err(AppError::Timeout(self.timeout)));
        match result {
            Ok(out) => Some(out),
            Err(e) => {
                tracing::error!("Firewall {action} failed ({}): {e}", e.kind());
                None
            }
        }
    }
}
