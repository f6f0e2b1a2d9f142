//! Drives one provider on its own task and schedule.

use crate::descriptor::Acquisition;
use crate::error::{ProviderError, Result};
use crate::{Provider, Recorder};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Default limit for a single command invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    pub command_timeout: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Start `provider` on its own task.
pub fn spawn(
    provider: Box<dyn Provider>,
    recorder: Recorder,
    options: RunnerOptions,
) -> JoinHandle<()> {
    tokio::spawn(run(provider, recorder, options))
}

/// Run `provider` until the task is dropped.
///
/// Providers without an interval run [`Provider::begin`] once and return.
/// Otherwise every iteration is isolated: its error or panic is logged and
/// the loop sleeps for the interval before trying again.
pub async fn run(mut provider: Box<dyn Provider>, recorder: Recorder, options: RunnerOptions) {
    let descriptor = provider.descriptor();

    let Some(interval) = descriptor.interval else {
        let begin = AssertUnwindSafe(provider.begin(&recorder))
            .catch_unwind()
            .await;
        if let Err(e) = begin.unwrap_or_else(|panic| Err(panicked(descriptor.name, panic))) {
            tracing::warn!(provider = descriptor.name, error = %e, "Provider begin failed");
        }
        tracing::debug!(provider = descriptor.name, "One-shot provider finished");
        return;
    };

    tracing::debug!(
        provider = descriptor.name,
        interval_secs = interval.as_secs(),
        "Provider loop started"
    );

    loop {
        if let Err(e) = run_iteration(provider.as_mut(), &recorder, options).await {
            tracing::warn!(provider = descriptor.name, error = %e, "Provider iteration failed");
        }
        tokio::time::sleep(interval).await;
    }
}

/// [`run_once`], with a panic anywhere in the iteration turned into an error.
pub async fn run_iteration(
    provider: &mut dyn Provider,
    recorder: &Recorder,
    options: RunnerOptions,
) -> anyhow::Result<()> {
    let name = provider.name();
    AssertUnwindSafe(run_once(provider, recorder, options))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(panicked(name, panic)))
}

fn panicked(provider: &str, panic: Box<dyn Any + Send>) -> anyhow::Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow::anyhow!("provider '{provider}' panicked: {message}")
}

/// Perform a single acquisition for `provider`.
pub async fn run_once(
    provider: &mut dyn Provider,
    recorder: &Recorder,
    options: RunnerOptions,
) -> anyhow::Result<()> {
    match provider.descriptor().acquisition {
        Acquisition::Command(template) => {
            let output = read_command(template, options.command_timeout).await?;
            provider.parse(&output, recorder)
        }
        Acquisition::File(path) => {
            let content = read_file(path).await?;
            provider.parse(&content, recorder)
        }
        Acquisition::Direct => provider.fetch(recorder).await,
    }
}

/// Run `template` (split on whitespace) and return its stdout.
///
/// The child is killed if it outlives `timeout`. Stdout is captured in full,
/// so the pipe is closed on every return path.
pub async fn read_command(template: &str, timeout: Duration) -> Result<String> {
    let mut argv = template.split_whitespace();
    let program = argv.next().ok_or(ProviderError::EmptyCommand)?;

    let child = Command::new(program)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProviderError::Spawn {
            command: template.to_string(),
            source,
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ProviderError::Timeout {
            command: template.to_string(),
            timeout_secs: timeout.as_secs(),
        })?
        .map_err(|source| ProviderError::Spawn {
            command: template.to_string(),
            source,
        })?;

    if !output.status.success() && output.stdout.is_empty() {
        return Err(ProviderError::CommandFailed {
            command: template.to_string(),
            status: output.status,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub async fn read_file(path: &str) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProviderError::Read {
            path: path.to_string(),
            source,
        })
}
