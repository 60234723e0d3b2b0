//! Error types for the test harness.

use plat_core::TestDataError;
use thiserror::Error;

/// Result alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors raised while driving a test AFU.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Engine number or register index outside the CSR window.
    #[error("CSR index out of range: engine {eng}, register {idx}")]
    CsrIndex {
        /// Requested engine (0 for global registers)
        eng: u32,
        /// Requested register index
        idx: u32,
    },

    /// MMIO access rejected by the backend.
    #[error("MMIO access at offset 0x{offset:x} failed: {reason}")]
    Mmio {
        /// Byte offset of the access
        offset: u64,
        /// Reason for failure
        reason: String,
    },

    /// An engine did not reach the expected state in time.
    #[error("engine hang after {trips} polls")]
    Hang {
        /// Number of failed polls
        trips: u32,
    },

    /// An engine moved no data during a bandwidth run.
    #[error("no memory traffic detected on engine {eng}")]
    NoTraffic {
        /// Engine number
        eng: u32,
    },

    /// Harness or simulator settings out of range.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Invalid test-data parameters.
    #[error(transparent)]
    TestData(#[from] TestDataError),
}

impl HarnessError {
    /// Create an MMIO error
    pub fn mmio(offset: u64, reason: impl Into<String>) -> Self {
        Self::Mmio {
            offset,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
