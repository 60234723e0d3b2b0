//! Atomic update engine checks.
//!
//! The atomic engine walks a 4 KiB buffer of 32 or 64-bit entries and
//! issues one atomic request per entry, rotating through fetch-add, swap
//! and compare-and-swap. The old value returned by each request is written
//! to a second buffer of the same size. The host seeds the atomic buffer
//! with a fixed pattern, so both buffers have a known final state.

use alloc::vec;
use alloc::vec::Vec;

use plat_common::test_data::{
    ATOMIC_BUF_BYTES, ATOMIC_CAS_VALUE, ATOMIC_TAG_BASE, ATOMIC_TAG_MASK,
};

use crate::{Result, TestDataError};

/// 64-bit words in each buffer.
pub const ATOMIC_BUF_WORDS: usize = ATOMIC_BUF_BYTES / 8;

/// Entry size of an atomic run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicWidth {
    Bits32,
    Bits64,
}

impl AtomicWidth {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Self::Bits32),
            64 => Some(Self::Bits64),
            _ => None,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }

    /// All-ones value of one entry.
    pub const fn mask(self) -> u64 {
        match self {
            Self::Bits32 => u32::MAX as u64,
            Self::Bits64 => u64::MAX,
        }
    }

    /// Entries in one buffer.
    pub const fn entries(self) -> usize {
        ATOMIC_BUF_BYTES * 8 / self.bits() as usize
    }
}

/// Operation applied to an entry, chosen by its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicOp {
    FetchAdd,
    Swap,
    CompareSwap,
}

impl AtomicOp {
    pub const fn for_index(idx: usize) -> Self {
        match idx % 3 {
            0 => Self::FetchAdd,
            1 => Self::Swap,
            _ => Self::CompareSwap,
        }
    }
}

/// Request tag of entry `idx`, used as the operand and as the CAS compare
/// value.
#[inline]
pub const fn tag(idx: usize) -> u64 {
    (ATOMIC_TAG_BASE + idx as u64) & ATOMIC_TAG_MASK
}

/// Value the host stores in entry `idx` before the run.
///
/// Odd compare-and-swap entries hold their tag so that the CAS succeeds;
/// every other entry is all ones.
pub fn initial_value(idx: usize, width: AtomicWidth) -> u64 {
    if AtomicOp::for_index(idx) == AtomicOp::CompareSwap && idx & 1 == 1 {
        tag(idx)
    } else {
        width.mask()
    }
}

/// Value of entry `idx` after its atomic request was applied to `init`.
pub fn expected_update(idx: usize, init: u64, width: AtomicWidth) -> u64 {
    let arg = tag(idx);
    match AtomicOp::for_index(idx) {
        AtomicOp::FetchAdd => init.wrapping_add(arg) & width.mask(),
        AtomicOp::Swap => arg,
        AtomicOp::CompareSwap if init == arg => ATOMIC_CAS_VALUE,
        AtomicOp::CompareSwap => init,
    }
}

/// Reads entry `idx` of a buffer of little-endian words.
#[inline]
pub fn entry(buf: &[u64], idx: usize, width: AtomicWidth) -> u64 {
    match width {
        AtomicWidth::Bits64 => buf[idx],
        AtomicWidth::Bits32 => (buf[idx / 2] >> ((idx % 2) * 32)) & width.mask(),
    }
}

/// Stores `value` into entry `idx`, truncated to the entry width.
#[inline]
pub fn set_entry(buf: &mut [u64], idx: usize, width: AtomicWidth, value: u64) {
    match width {
        AtomicWidth::Bits64 => buf[idx] = value,
        AtomicWidth::Bits32 => {
            let shift = (idx % 2) * 32;
            let word = &mut buf[idx / 2];
            *word = (*word & !(width.mask() << shift)) | ((value & width.mask()) << shift);
        }
    }
}

fn check_updates(num_updates: usize, width: AtomicWidth) -> Result<()> {
    if num_updates > width.entries() {
        return Err(TestDataError::UpdateCount {
            count: num_updates,
            capacity: width.entries(),
        });
    }
    Ok(())
}

fn build_buf(width: AtomicWidth, value: impl Fn(usize) -> u64) -> Vec<u64> {
    let mut buf = vec![0u64; ATOMIC_BUF_WORDS];
    for idx in 0..width.entries() {
        set_entry(&mut buf, idx, width, value(idx));
    }
    buf
}

/// The atomic buffer as the host initializes it.
pub fn initial_buf(width: AtomicWidth) -> Vec<u64> {
    build_buf(width, |idx| initial_value(idx, width))
}

/// The atomic buffer after `num_updates` requests.
pub fn expected_atomic_buf(width: AtomicWidth, num_updates: usize) -> Result<Vec<u64>> {
    check_updates(num_updates, width)?;
    Ok(build_buf(width, |idx| {
        let init = initial_value(idx, width);
        if idx < num_updates {
            expected_update(idx, init, width)
        } else {
            init
        }
    }))
}

/// The write-back buffer after `num_updates` requests. It starts zeroed
/// and receives the old value of every updated entry.
pub fn expected_writeback_buf(width: AtomicWidth, num_updates: usize) -> Result<Vec<u64>> {
    check_updates(num_updates, width)?;
    Ok(build_buf(width, |idx| {
        if idx < num_updates {
            initial_value(idx, width)
        } else {
            0
        }
    }))
}

/// Which of the two buffers holds a bad entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicBuffer {
    Atomic,
    WriteBack,
}

/// One entry that differs from its expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicMismatch {
    pub buffer: AtomicBuffer,
    pub idx: usize,
    pub actual: u64,
    pub expected: u64,
}

/// Compares captured buffers with their expected state after
/// `num_updates` requests.
///
/// Returns every mismatching entry in index order, atomic buffer first for
/// each index. An empty list is a pass.
pub fn check_atomic_buffers(
    atomic_buf: &[u64],
    wb_buf: &[u64],
    width: AtomicWidth,
    num_updates: usize,
) -> Result<Vec<AtomicMismatch>> {
    check_updates(num_updates, width)?;
    for buf in [atomic_buf, wb_buf] {
        if buf.len() < ATOMIC_BUF_WORDS {
            return Err(TestDataError::ShortBuffer {
                expected: ATOMIC_BUF_WORDS,
                actual: buf.len(),
            });
        }
    }

    let mut mismatches = Vec::new();
    for idx in 0..width.entries() {
        let init = initial_value(idx, width);
        let (want_atomic, want_wb) = if idx < num_updates {
            (expected_update(idx, init, width), init)
        } else {
            (init, 0)
        };

        for (buffer, buf, expected) in [
            (AtomicBuffer::Atomic, atomic_buf, want_atomic),
            (AtomicBuffer::WriteBack, wb_buf, want_wb),
        ] {
            let actual = entry(buf, idx, width);
            if actual != expected {
                mismatches.push(AtomicMismatch {
                    buffer,
                    idx,
                    actual,
                    expected,
                });
            }
        }
    }
    Ok(mismatches)
}
