//! Shared resource error types

use nix::errno::Errno;
use thiserror::Error;

/// Errors raised by named semaphore operations
#[derive(Debug, Error)]
pub enum SemError {
    #[error("wait on semaphore '{name}' was interrupted by a signal")]
    Interrupted { name: String },

    #[error("wait on semaphore '{name}' timed out")]
    TimedOut { name: String },

    #[error("semaphore '{name}' already exists (stale run? restart the supervisor with --reclaim)")]
    AlreadyExists { name: String },

    #[error("semaphore '{name}' does not exist, start the supervisor first")]
    Missing { name: String },

    #[error("{op} on semaphore '{name}' failed: {source}")]
    Os {
        op: &'static str,
        name: String,
        #[source]
        source: Errno,
    },
}

impl SemError {
    /// Whether a wait ended without acquiring a token but without a semaphore failure.
    ///
    /// Interrupted and timed-out waits are recovered by re-checking the run
    /// phase; everything else is fatal for the calling process.
    pub fn is_wakeup(&self) -> bool {
        matches!(self, SemError::Interrupted { .. } | SemError::TimedOut { .. })
    }
}

/// Errors raised while creating, attaching to, or using the shared ring
#[derive(Debug, Error)]
pub enum ShmError {
    #[error("invalid resource name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("shared memory '{name}' already exists (stale run? restart the supervisor with --reclaim)")]
    AlreadyExists { name: String },

    #[error("shared memory '{name}' does not exist, start the supervisor first")]
    Missing { name: String },

    #[error("{op} on shared memory '{name}' failed: {source}")]
    Os {
        op: &'static str,
        name: String,
        #[source]
        source: Errno,
    },

    #[error("{op} on shared memory '{name}' failed: {source}")]
    Io {
        op: &'static str,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shared memory '{name}' exists but the supervisor has not sized it yet")]
    NotReady { name: String },

    #[error("shared memory '{name}' is {actual} bytes, expected {expected}")]
    SizeMismatch { name: String, actual: u64, expected: u64 },

    #[error("shared memory '{name}' has an incompatible layout (magic {magic:#010x}, version {version})")]
    LayoutMismatch { name: String, magic: u32, version: u32 },

    #[error("ring slot {slot} holds an inconsistent solution ({stored} stored, {edge_count} counted)")]
    CorruptSlot { slot: usize, stored: u32, edge_count: u32 },

    #[error(transparent)]
    Semaphore(#[from] SemError),
}
