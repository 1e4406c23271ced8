//! Error types
//!
//! Every fallible operation (`init`, `register`) fails with exactly one
//! of these causes. None of them is retried inside the crate.
//!
//! Author: Moroya Sakamoto

use core::fmt;

/// Scheduler result
pub type Result<T> = core::result::Result<T, Error>;

/// Failure reported by a tick source while being configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSourceError {
    /// The requested timer channel does not exist on this source
    UnsupportedChannel,
    /// The period cannot be produced by the timer
    InvalidPeriod,
    /// The timer peripheral refused the configuration
    Hardware,
}

/// Scheduler error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Tick period of zero milliseconds
    InvalidConfig,
    /// Task table with no slots
    EmptyTaskTable,
    /// Binding the tick source failed
    TickSource(TickSourceError),
    /// `register` before a successful `init`
    NotInitialized,
    /// Task configuration without a run callback
    MissingCallback,
    /// Task was already registered
    AlreadyRegistered,
    /// Every table slot is taken
    TableFull,
}

impl From<TickSourceError> for Error {
    fn from(err: TickSourceError) -> Self {
        Error::TickSource(err)
    }
}

impl fmt::Display for TickSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickSourceError::UnsupportedChannel => f.write_str("unsupported timer channel"),
            TickSourceError::InvalidPeriod => f.write_str("timer period out of range"),
            TickSourceError::Hardware => f.write_str("timer hardware error"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig => f.write_str("millisec_per_tick must be non-zero"),
            Error::EmptyTaskTable => f.write_str("task table has no slots"),
            Error::TickSource(err) => write!(f, "tick source: {err}"),
            Error::NotInitialized => f.write_str("scheduler not initialized"),
            Error::MissingCallback => f.write_str("task has no run callback"),
            Error::AlreadyRegistered => f.write_str("task already registered"),
            Error::TableFull => f.write_str("task table full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TickSourceError {}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
