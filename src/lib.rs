pub use uniflow_core as core;
pub use uniflow_pipe as pipe;
pub use uniflow_runtime as runtime;

/// Initialize the process-wide task execution mode.
///
/// Call this once at application startup, before the first submission.
/// Repeated calls are idempotent and return the first initialization
/// result.
///
/// Priority order:
/// 1. explicit `mode`
/// 2. `UNIFLOW_SYNC_SUBMIT` env var
/// 3. default: asynchronous, one detached thread per task
pub fn init_execution_mode(mode: Option<core::ExecutionMode>) -> core::Result<()> {
    core::init_execution_mode(mode)
}
