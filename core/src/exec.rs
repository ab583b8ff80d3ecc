use crate::{Error, Result};
use std::env;
use std::sync::OnceLock;
use std::thread;

/// How a scheduled task body runs relative to the submitting thread.
///
/// The asynchronous mode is the normal one: every task body gets its own
/// detached thread and synchronizes through the task's completion latch.
/// The synchronous mode runs the body inline on the submitting thread,
/// which makes execution deterministic for tests and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Synchronous,
    Asynchronous,
}

impl ExecutionMode {
    /// Run `body` according to this mode.
    ///
    /// In asynchronous mode the spawned thread is detached; the body is
    /// expected to synchronize by its own means (completion latches,
    /// queue drains). In synchronous mode this does not return until the
    /// body does, and a panic in the body propagates to the caller.
    pub fn execute<F>(self, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            ExecutionMode::Asynchronous => {
                thread::Builder::new()
                    .name("uniflow-task".to_string())
                    .spawn(body)
                    .expect("failed to spawn task thread");
            }
            ExecutionMode::Synchronous => body(),
        }
    }
}

static EXECUTION_MODE_INIT: OnceLock<std::result::Result<ExecutionMode, String>> = OnceLock::new();

/// Initialize the process-wide execution mode.
///
/// Priority:
/// 1. `mode` argument
/// 2. `UNIFLOW_SYNC_SUBMIT` environment variable
/// 3. Default: `Asynchronous`
///
/// Repeated calls are idempotent and return the first initialization
/// result.
pub fn init_execution_mode(mode: Option<ExecutionMode>) -> Result<()> {
    let res = EXECUTION_MODE_INIT.get_or_init(|| match mode {
        Some(m) => Ok(m),
        None => read_mode_from_env(),
    });
    res.clone()
        .map(|_| ())
        .map_err(Error::InvalidConfig)
}

/// The process-wide execution mode, resolving it on first use.
pub fn execution_mode() -> ExecutionMode {
    let res = EXECUTION_MODE_INIT.get_or_init(read_mode_from_env);
    // A bad env var falls back to the default rather than poisoning
    // every submission after the first.
    res.clone().unwrap_or(ExecutionMode::Asynchronous)
}

fn read_mode_from_env() -> std::result::Result<ExecutionMode, String> {
    let raw = match env::var("UNIFLOW_SYNC_SUBMIT") {
        Ok(v) => v,
        Err(env::VarError::NotPresent) => return Ok(ExecutionMode::Asynchronous),
        Err(e) => return Err(format!("failed to read UNIFLOW_SYNC_SUBMIT: {e}")),
    };

    match raw.as_str() {
        "1" | "true" | "yes" => Ok(ExecutionMode::Synchronous),
        "0" | "false" | "no" => Ok(ExecutionMode::Asynchronous),
        _ => Err(format!(
            "UNIFLOW_SYNC_SUBMIT must be a boolean flag, got '{raw}'"
        )),
    }
}
