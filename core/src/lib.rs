pub mod access;
pub mod exec;

pub use access::AccessMode;
pub use exec::{execution_mode, init_execution_mode, ExecutionMode};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
