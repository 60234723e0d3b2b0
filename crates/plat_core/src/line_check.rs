//! Host channel line checks.
//!
//! The host channel test engine streams bursts of 64-byte cache lines. The
//! read path hashes a 32-bit sample of every line with hash32; the write
//! path stamps every line with its own IOVA and a fixed marker. These
//! helpers compute the same values in software from the shared buffers.

use plat_common::test_data::{CACHE_LINE_BYTES, WRITE_LINE_MARKER};

use crate::hash32::{HASH32_DEFAULT_INIT, hash32};
use crate::{Result, TestDataError};

/// 64-bit words per cache line.
pub const LINE_WORDS: usize = CACHE_LINE_BYTES / 8;

/// The 32-bit sample the hardware hashes from one line.
///
/// It is the high 16 bits of the line's last word above the low 16 bits of
/// its first word.
#[inline]
pub fn line_sample(line: &[u64]) -> u32 {
    let first = (line[0] & 0xffff) as u32;
    let last = (line[LINE_WORDS - 1] >> 48) as u32;
    (last << 16) | first
}

/// Checks that `buf` holds `expected` words. A size that overflowed is
/// reported as `usize::MAX` words, which no buffer can hold.
fn required_words(buf: &[u64], expected: Option<usize>) -> Result<usize> {
    let expected = expected.unwrap_or(usize::MAX);
    if buf.len() < expected {
        return Err(TestDataError::ShortBuffer {
            expected,
            actual: buf.len(),
        });
    }
    Ok(expected)
}

/// Expected read hash after the engine reads `num_bursts` bursts of
/// `burst_size` lines starting at the beginning of `buf`.
pub fn expected_read_hash(buf: &[u64], num_bursts: usize, burst_size: usize) -> Result<u32> {
    let expected = num_bursts
        .checked_mul(burst_size)
        .and_then(|lines| lines.checked_mul(LINE_WORDS));
    let expected = required_words(buf, expected)?;

    Ok(buf[..expected]
        .chunks_exact(LINE_WORDS)
        .map(line_sample)
        .fold(HASH32_DEFAULT_INIT, hash32))
}

/// Outcome of checking a buffer written by the host channel engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCheck {
    /// Every line carries its IOVA and the marker; the next line is clear.
    Pass,
    /// The line at this index is wrong. An index equal to the line count
    /// means the engine wrote past the end of the region.
    BadLine(usize),
}

/// Checks that the engine wrote `num_lines` lines starting at `base_iova`.
///
/// Word 0 of each line must equal the line's IOVA (in cache line units)
/// and word 7 must hold the write marker. The first line after the region
/// must still be zero in both words.
pub fn check_written_lines(buf: &[u64], base_iova: u64, num_lines: usize) -> Result<WriteCheck> {
    let expected = num_lines
        .checked_add(1)
        .and_then(|lines| lines.checked_mul(LINE_WORDS));
    required_words(buf, expected)?;

    let mut lines = buf.chunks_exact(LINE_WORDS);
    for (idx, line) in lines.by_ref().take(num_lines).enumerate() {
        let iova = base_iova.wrapping_add(idx as u64);
        if line[0] != iova || line[LINE_WORDS - 1] != WRITE_LINE_MARKER {
            return Ok(WriteCheck::BadLine(idx));
        }
    }

    match lines.next() {
        Some(tail) if tail[0] == 0 && tail[LINE_WORDS - 1] == 0 => Ok(WriteCheck::Pass),
        _ => Ok(WriteCheck::BadLine(num_lines)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn read_buffer(num_lines: usize) -> Vec<u64> {
        // Unique values per line, as the read buffers are initialized.
        (1..=(num_lines * LINE_WORDS) as u64).collect()
    }

    fn written_buffer(base_iova: u64, num_lines: usize) -> Vec<u64> {
        let mut buf = vec![0u64; (num_lines + 1) * LINE_WORDS];
        for (line, iova) in buf.chunks_exact_mut(LINE_WORDS).take(num_lines).zip(base_iova..) {
            line[0] = iova;
            line[LINE_WORDS - 1] = WRITE_LINE_MARKER;
        }
        buf
    }

    #[test]
    fn sample_takes_first_and_last_halfwords() {
        let mut line = [0u64; LINE_WORDS];
        line[0] = 0xaaaa_bbbb_cccc_1234;
        line[7] = 0x5678_dddd_eeee_ffff;
        assert_eq!(line_sample(&line), 0x5678_1234);
    }

    #[test]
    fn read_hash_folds_one_sample_per_line() {
        let buf = read_buffer(6);
        let manual = buf
            .chunks_exact(LINE_WORDS)
            .fold(HASH32_DEFAULT_INIT, |h, line| hash32(h, line_sample(line)));
        assert_eq!(expected_read_hash(&buf, 2, 3).unwrap(), manual);
        assert_eq!(expected_read_hash(&buf, 3, 2).unwrap(), manual);
        assert_eq!(expected_read_hash(&buf, 0, 3).unwrap(), HASH32_DEFAULT_INIT);
    }

    #[test]
    fn read_hash_rejects_short_buffer() {
        let buf = read_buffer(2);
        assert_eq!(
            expected_read_hash(&buf, 1, 3),
            Err(TestDataError::ShortBuffer {
                expected: 24,
                actual: 16
            })
        );
    }

    #[test]
    fn huge_line_counts_are_short_buffers() {
        let buf = [0u64; LINE_WORDS];
        let too_big = TestDataError::ShortBuffer {
            expected: usize::MAX,
            actual: LINE_WORDS,
        };
        assert_eq!(expected_read_hash(&buf, usize::MAX, 2), Err(too_big));
        assert_eq!(expected_read_hash(&buf, usize::MAX / 4, 1), Err(too_big));
        assert_eq!(check_written_lines(&buf, 0, usize::MAX), Err(too_big));
        assert_eq!(
            check_written_lines(&buf, 0, usize::MAX / LINE_WORDS),
            Err(too_big)
        );
    }

    #[test]
    fn written_lines_pass() {
        let buf = written_buffer(0x4000, 5);
        assert_eq!(check_written_lines(&buf, 0x4000, 5).unwrap(), WriteCheck::Pass);
    }

    #[test]
    fn wrong_iova_is_reported() {
        let mut buf = written_buffer(0x4000, 5);
        buf[3 * LINE_WORDS] = 0;
        assert_eq!(
            check_written_lines(&buf, 0x4000, 5).unwrap(),
            WriteCheck::BadLine(3)
        );
    }

    #[test]
    fn missing_marker_is_reported() {
        let mut buf = written_buffer(0x10, 2);
        buf[LINE_WORDS - 1] = 0;
        assert_eq!(check_written_lines(&buf, 0x10, 2).unwrap(), WriteCheck::BadLine(0));
    }

    #[test]
    fn iova_wraps_at_top_of_address_space() {
        let mut buf = vec![0u64; 3 * LINE_WORDS];
        buf[0] = u64::MAX;
        buf[LINE_WORDS - 1] = WRITE_LINE_MARKER;
        buf[LINE_WORDS] = 0;
        buf[2 * LINE_WORDS - 1] = WRITE_LINE_MARKER;
        // The second line's IOVA wraps to 0.
        assert_eq!(check_written_lines(&buf, u64::MAX, 2).unwrap(), WriteCheck::Pass);
    }

    #[test]
    fn overrun_is_reported() {
        let buf = written_buffer(0x10, 3);
        assert_eq!(check_written_lines(&buf, 0x10, 2).unwrap(), WriteCheck::BadLine(2));
    }
}
