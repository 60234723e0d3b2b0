//! Rolling 32-bit hash matching the hash32 RTL.
//!
//! The RTL treats the hash as 32 one-bit shift-register cells. On each beat
//! every output bit is the matching data bit XORed with the next-higher hash
//! bit, bit 0 wraps around into bit 31, and bit 0 is additionally fed back
//! into output bits 0, 1, 2, 4 and 6. That is a rotate right by one with a
//! conditional XOR of [`HASH32_FEEDBACK`], followed by an XOR of the data.

use plat_common::test_data::HASH32_FEEDBACK;

pub use plat_common::test_data::HASH32_DEFAULT_INIT;

/// Folds `data` into `cur_hash`.
///
/// Pure function of its inputs; fully defined for all values.
#[inline]
pub const fn hash32(cur_hash: u32, data: u32) -> u32 {
    let feedback = (cur_hash & 1).wrapping_neg() & HASH32_FEEDBACK;
    cur_hash.rotate_right(1) ^ feedback ^ data
}

/// Folds a sequence of words into `init`, one beat per word.
#[inline]
pub fn hash32_fold<I>(init: u32, words: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    words.into_iter().fold(init, hash32)
}
