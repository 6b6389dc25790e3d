//! In-memory firewall used by unit tests.
//!
//! Interprets the statements of the generated scripts against a list of rule
//! names, so duplicate accumulation and check results behave like the real
//! backend. Individual actions can be made to fail or to stall until released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::AppError;

use super::script;
use super::CommandRunner;

/// Permits handed out on release; far more than any test issues.
const RELEASE_PERMITS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Remove,
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Non-zero exit.
    Exit,
    /// Exceeds the time budget.
    Timeout,
    /// Exits cleanly but prints something unexpected.
    Garbage,
}

#[derive(Default)]
pub struct FakeFirewall {
    rules: Mutex<Vec<String>>,
    last_addresses: Mutex<Vec<String>>,
    failures: Mutex<HashMap<Action, Failure>>,
    calls: Mutex<HashMap<Action, usize>>,
    /// When set, matching runs wait for a permit before executing. `None`
    /// as the action holds every run.
    gate: Mutex<Option<(Option<Action>, Arc<Semaphore>)>>,
    started: AtomicUsize,
}

impl FakeFirewall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, action: Action, failure: Failure) {
        self.failures.lock().unwrap().insert(action, failure);
    }

    pub fn succeed(&self, action: Action) {
        self.failures.lock().unwrap().remove(&action);
    }

    /// Hold every subsequent run until [`FakeFirewall::release`] is called.
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some((None, Arc::new(Semaphore::new(0))));
    }

    /// Like [`FakeFirewall::hold`], but only for runs of `action`.
    pub fn hold_only(&self, action: Action) {
        *self.gate.lock().unwrap() = Some((Some(action), Arc::new(Semaphore::new(0))));
    }

    pub fn release(&self) {
        if let Some((_, gate)) = self.gate.lock().unwrap().take() {
            gate.add_permits(RELEASE_PERMITS);
        }
    }

    pub fn calls(&self, action: Action) -> usize {
        self.calls.lock().unwrap().get(&action).copied().unwrap_or(0)
    }

    /// Runs that have entered the runner, including ones still held.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.lock().unwrap().len()
    }

    pub fn insert_rule(&self, name: &str) {
        self.rules.lock().unwrap().push(name.to_string());
    }

    pub fn last_addresses(&self) -> Vec<String> {
        self.last_addresses.lock().unwrap().clone()
    }

    fn classify(script: &str) -> Action {
        if script.contains("Get-NetFirewallRule") {
            Action::Check
        } else if script.contains("New-NetFirewallRule") {
            Action::Create
        } else {
            Action::Remove
        }
    }

    fn interpret(&self, script: &str) -> String {
        let mut rules = self.rules.lock().unwrap();
        if Self::classify(script) == Action::Check {
            let has = |name: &str| rules.iter().any(|r| r == name);
            return if has(crate::config::RULE_OUT) && has(crate::config::RULE_IN) {
                script::RESPONSE_EXISTS.to_string()
            } else {
                script::RESPONSE_NONE.to_string()
            };
        }

        let mut output = String::new();
        for stmt in script.split(';').map(str::trim) {
            if let Some(name) = quoted_after(stmt, "Remove-NetFirewallRule -Name '") {
                rules.retain(|r| r != name);
            } else if let Some(name) = quoted_after(stmt, "New-NetFirewallRule -Name '") {
                rules.push(name.to_string());
                if let Some(list) = stmt.split("-RemoteAddress @(").nth(1) {
                    let list = list.split(')').next().unwrap_or_default();
                    *self.last_addresses.lock().unwrap() = list
                        .split(',')
                        .map(|s| s.trim_matches('"').to_string())
                        .collect();
                }
            } else if let Some(token) = quoted_after(stmt, "Write-Output '") {
                output = token.to_string();
            }
        }
        output
    }
}

fn quoted_after<'a>(stmt: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = stmt.strip_prefix(prefix)?;
    rest.split('\'').next()
}

#[async_trait]
impl CommandRunner for FakeFirewall {
    async fn run(&self, script: &str, timeout: Duration) -> Result<String, AppError> {
        let action = Self::classify(script);
        self.started.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some((_, gate)) = gate.filter(|(held, _)| held.map_or(true, |a| a == action)) {
            let _permit = gate.acquire().await.map_err(|e| AppError::Io(e.to_string()))?;
        }

        *self.calls.lock().unwrap().entry(action).or_default() += 1;
        let failure = self.failures.lock().unwrap().get(&action).copied();
        match failure {
            Some(Failure::Exit) => Err(AppError::Firewall("powershell exited with 1".into())),
            Some(Failure::Timeout) => Err(AppError::Timeout(timeout)),
            Some(Failure::Garbage) => Ok("Access is denied.".into()),
            None => Ok(self.interpret(script)),
        }
    }
}
