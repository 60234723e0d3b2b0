//! Software models of the test-data logic built into the test AFUs.
//!
//! This crate provides the rolling hash used by the hardware checkers, the
//! deterministic data generator/checker pair used to verify round-trip data
//! integrity, and the line checks used by the host channel tests. All of it
//! is pure computation over caller-supplied buffers, so it is `no_std` and
//! safe to call from many threads as long as the buffers are disjoint.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

/// Bit-exact model of the hash32 RTL.
///
/// Folds one 32-bit data word into a 32-bit hash state. Every hash lane in
/// the hardware checkers is an instance of this function.
pub mod hash32;

/// Deterministic test-data generator and streaming checker.
///
/// The generator produces the same sequence of data vectors as the hardware
/// generator for a given seed. The checker folds vectors into per-lane hash
/// buckets and reduces them to the 64-bit value the hardware reports.
pub mod test_data;

/// Expected-value checks for host channel read and write traffic.
pub mod line_check;

/// Expected contents of the buffers touched by the atomic update engine.
///
/// Models the initial buffer pattern, the per-index atomic operation and
/// its result, and checks captured buffers in 32 and 64-bit mode.
pub mod atomic_check;

pub use hash32::hash32;
pub use test_data::{TestDataChk, TestDataGen, chk_gen};

use thiserror::Error;

/// Errors returned by the test-data generator and checker.
///
/// Every variant is a caller contract violation: the buffers handed in do
/// not describe a valid data vector or do not agree with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TestDataError {
    /// A data vector length is zero or not a multiple of 8 bytes.
    #[error("invalid data vector length {byte_len} (must be a non-zero multiple of 8 bytes)")]
    InvalidLength { byte_len: usize },

    /// The hash bucket vector does not cover the data vector.
    ///
    /// Buckets must occupy the same number of bytes as the data, i.e. two
    /// 32-bit buckets per 64-bit data word.
    #[error("hash vector holds {actual} buckets, data vector needs {expected}")]
    BucketMismatch { expected: usize, actual: usize },

    /// A buffer is too short for the requested number of lines.
    #[error("buffer holds {actual} words, {expected} required")]
    ShortBuffer { expected: usize, actual: usize },

    /// More atomic updates were requested than a buffer has entries.
    #[error("{count} atomic updates requested, buffer holds {capacity} entries")]
    UpdateCount { count: usize, capacity: usize },
}

/// Result alias for test-data operations.
pub type Result<T> = core::result::Result<T, TestDataError>;
