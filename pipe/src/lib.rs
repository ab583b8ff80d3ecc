pub mod pipe;
pub mod reservation;

pub use pipe::Pipe;
pub use reservation::Reservation;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unsupported access mode for a pipe: {0:?}")]
    UnsupportedAccessMode(uniflow_core::AccessMode),

    #[error("The pipe is already used for reading")]
    AlreadyUsedForReading,

    #[error("The pipe is already used for writing")]
    AlreadyUsedForWriting,
}

pub type Result<T> = std::result::Result<T, Error>;
