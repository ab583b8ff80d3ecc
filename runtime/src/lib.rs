pub mod buffer;
pub mod handler;
pub mod kernel;
pub mod queue;
pub mod task;

pub use buffer::{Buffer, SharedBuffer};
pub use handler::Handler;
pub use kernel::Kernel;
pub use queue::Queue;
pub use task::Task;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("No kernel was attached to this task")]
    NoKernel,

    #[error("Core error: {0}")]
    CoreError(#[from] uniflow_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
