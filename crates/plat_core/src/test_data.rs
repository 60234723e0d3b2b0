//! Test-data generator and checker.
//!
//! The hardware and software versions of this code produce the same
//! sequences for a given seed. A data vector is a buffer of 64-bit words
//! (its byte length is always a non-zero multiple of 8). The checker keeps
//! one 32-bit hash bucket per 32-bit word of the vector, so that each
//! hardware lane owns one bucket and an entire vector is hashed per beat.
//!
//! Generator and checker must be driven in lockstep with the hardware:
//! reset both, then alternate hashing the current vector and advancing the
//! generator.

use alloc::vec;
use alloc::vec::Vec;

use plat_common::test_data::GEN_INIT_PATTERN;

use crate::hash32::{HASH32_DEFAULT_INIT, hash32};
use crate::{Result, TestDataError};

/// Checks a data vector byte length and returns its length in 64-bit words.
pub fn validate_len(byte_len: usize) -> Result<usize> {
    if byte_len < 8 || byte_len % 8 != 0 {
        return Err(TestDataError::InvalidLength { byte_len });
    }
    Ok(byte_len / 8)
}

fn check_words(data: &[u64]) -> Result<()> {
    validate_len(data.len() * 8).map(|_| ())
}

fn check_buckets(hash_vec: &[u32]) -> Result<()> {
    validate_len(hash_vec.len() * 4).map(|_| ())
}

fn fill_initial(seed: u64, data: &mut [u64]) {
    let mut seed = seed;
    for (word, init) in data.iter_mut().zip(GEN_INIT_PATTERN.iter().cycle()) {
        *word = init ^ seed;
        seed = seed.rotate_left(1);
    }
}

fn step(seed: u64, data: &mut [u64]) {
    let mut seed = seed;
    for word in data.iter_mut() {
        *word = word.rotate_left(8) ^ seed;
        seed = seed.rotate_left(1);
    }
}

fn reduce_buckets(hash_vec: &[u32]) -> u64 {
    let (low, high) = hash_vec.split_at(hash_vec.len() / 2);
    let hash_low = low.iter().fold(0u32, |acc, &h| acc ^ h);
    let hash_high = high.iter().fold(0u32, |acc, &h| acc ^ h);
    ((hash_high as u64) << 32) | hash_low as u64
}

/// Resets `data` to the initial vector for `seed`.
///
/// The fixed init pattern is tiled across the vector, then word `i` is
/// XORed with `seed` rotated left by `i` bits.
pub fn gen_reset(seed: u64, data: &mut [u64]) -> Result<()> {
    check_words(data)?;
    fill_initial(seed, data);
    Ok(())
}

/// Advances `data` to the next vector, as the hardware does after a write.
///
/// Each word is rotated left by one byte and XORed with the seed, which
/// again rotates by one bit per word starting from `seed` at word 0.
pub fn gen_next(seed: u64, data: &mut [u64]) -> Result<()> {
    check_words(data)?;
    step(seed, data);
    Ok(())
}

/// Sets every bucket to the hash init value.
pub fn chk_reset(hash_vec: &mut [u32]) -> Result<()> {
    check_buckets(hash_vec)?;
    hash_vec.fill(HASH32_DEFAULT_INIT);
    Ok(())
}

/// Folds one data vector into the buckets.
///
/// The data is viewed as little-endian 32-bit words: bucket `2 * j` takes
/// the low half of data word `j` and bucket `2 * j + 1` the high half.
pub fn chk_next(hash_vec: &mut [u32], data: &[u64]) -> Result<()> {
    check_words(data)?;
    if hash_vec.len() != data.len() * 2 {
        return Err(TestDataError::BucketMismatch {
            expected: data.len() * 2,
            actual: hash_vec.len(),
        });
    }

    for (lanes, &word) in hash_vec.chunks_exact_mut(2).zip(data) {
        lanes[0] = hash32(lanes[0], word as u32);
        lanes[1] = hash32(lanes[1], (word >> 32) as u32);
    }
    Ok(())
}

/// Reduces the buckets to a single 64-bit check value.
///
/// The first half of the buckets is XORed into the low 32 bits of the
/// result and the second half into the high 32 bits.
pub fn chk_reduce(hash_vec: &[u32]) -> Result<u64> {
    check_buckets(hash_vec)?;
    Ok(reduce_buckets(hash_vec))
}

/// Computes the reduced hash the hardware reports after checking
/// `num_data_values` generated vectors of `byte_len` bytes.
///
/// Each round hashes the current vector before advancing the generator.
pub fn chk_gen(byte_len: usize, seed: u64, num_data_values: usize) -> Result<u64> {
    let mut data_gen = TestDataGen::new(byte_len, seed)?;
    let mut chk = TestDataChk::new(byte_len)?;

    for _ in 0..num_data_values {
        chk.update(data_gen.data())?;
        data_gen.advance();
    }

    Ok(chk.reduce())
}

/// Owned generator state: a seed and the current data vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDataGen {
    seed: u64,
    data: Vec<u64>,
}

impl TestDataGen {
    /// Creates a generator holding the initial vector for `seed`.
    pub fn new(byte_len: usize, seed: u64) -> Result<Self> {
        let words = validate_len(byte_len)?;
        let mut data_gen = Self {
            seed,
            data: vec![0; words],
        };
        data_gen.reset();
        Ok(data_gen)
    }

    /// Restarts the sequence from the initial vector.
    pub fn reset(&mut self) {
        fill_initial(self.seed, &mut self.data);
    }

    /// Moves to the next vector in the sequence.
    pub fn advance(&mut self) {
        step(self.seed, &mut self.data);
    }

    /// The current data vector.
    pub fn data(&self) -> &[u64] {
        &self.data
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn byte_len(&self) -> usize {
        self.data.len() * 8
    }
}

/// Owned checker state: one hash bucket per 32-bit data word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDataChk {
    buckets: Vec<u32>,
}

impl TestDataChk {
    /// Creates a checker for vectors of `byte_len` bytes, already reset.
    pub fn new(byte_len: usize) -> Result<Self> {
        let words = validate_len(byte_len)?;
        Ok(Self {
            buckets: vec![HASH32_DEFAULT_INIT; words * 2],
        })
    }

    pub fn reset(&mut self) {
        self.buckets.fill(HASH32_DEFAULT_INIT);
    }

    /// Folds one data vector into the buckets.
    pub fn update(&mut self, data: &[u64]) -> Result<()> {
        chk_next(&mut self.buckets, data)
    }

    pub fn reduce(&self) -> u64 {
        reduce_buckets(&self.buckets)
    }

    pub fn buckets(&self) -> &[u32] {
        &self.buckets
    }

    pub fn byte_len(&self) -> usize {
        self.buckets.len() * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_lengths() {
        for byte_len in [0, 1, 4, 7, 12, 65] {
            assert_eq!(
                validate_len(byte_len),
                Err(TestDataError::InvalidLength { byte_len })
            );
            assert!(TestDataGen::new(byte_len, 0).is_err());
            assert!(TestDataChk::new(byte_len).is_err());
            assert!(chk_gen(byte_len, 0, 1).is_err());
        }
        assert_eq!(validate_len(8), Ok(1));
        assert_eq!(validate_len(64), Ok(8));
    }

    #[test]
    fn empty_slices_are_rejected() {
        let mut empty: [u64; 0] = [];
        let mut no_buckets: [u32; 0] = [];
        assert!(gen_reset(0, &mut empty).is_err());
        assert!(gen_next(0, &mut empty).is_err());
        assert!(chk_reset(&mut no_buckets).is_err());
        assert!(chk_reduce(&no_buckets).is_err());
    }

    #[test]
    fn odd_bucket_count_is_rejected() {
        let buckets = [HASH32_DEFAULT_INIT; 3];
        assert_eq!(
            chk_reduce(&buckets),
            Err(TestDataError::InvalidLength { byte_len: 12 })
        );
    }

    #[test]
    fn bucket_mismatch_is_rejected() {
        let mut buckets = [0u32; 4];
        let data = [0u64; 1];
        assert_eq!(
            chk_next(&mut buckets, &data),
            Err(TestDataError::BucketMismatch {
                expected: 2,
                actual: 4
            })
        );
    }

    #[test]
    fn reset_tiles_init_pattern() {
        let mut data = [0u64; 10];
        gen_reset(0, &mut data).unwrap();
        assert_eq!(&data[..8], &GEN_INIT_PATTERN);
        assert_eq!(data[8], GEN_INIT_PATTERN[0]);
        assert_eq!(data[9], GEN_INIT_PATTERN[1]);
    }

    #[test]
    fn reset_rotates_seed_per_word() {
        let mut data = [0u64; 2];
        gen_reset(1, &mut data).unwrap();
        assert_eq!(data, [0x8607_6172_2b16_4a01, 0x54de_0dc9_7b56_4cbd]);

        let mut data = [0u64; 9];
        gen_reset(5, &mut data).unwrap();
        assert_eq!(data[8], 0x8607_6172_2b16_4f00);
    }

    #[test]
    fn next_rotates_each_word_by_one_byte() {
        let mut data = [0u64; 1];
        gen_reset(0, &mut data).unwrap();
        gen_next(0, &mut data).unwrap();
        assert_eq!(data[0], 0x0761_722b_164a_0086);
    }

    #[test]
    fn owned_generator_matches_slice_functions() {
        let seed = 0xf00;
        let mut data = [0u64; 8];
        gen_reset(seed, &mut data).unwrap();

        let mut data_gen = TestDataGen::new(64, seed).unwrap();
        assert_eq!(data_gen.data(), &data);
        for _ in 0..5 {
            gen_next(seed, &mut data).unwrap();
            data_gen.advance();
            assert_eq!(data_gen.data(), &data);
        }

        data_gen.reset();
        gen_reset(seed, &mut data).unwrap();
        assert_eq!(data_gen.data(), &data);
        assert_eq!(data_gen.byte_len(), 64);
    }

    #[test]
    fn chk_reset_fills_init() {
        let mut buckets = [0u32; 16];
        chk_reset(&mut buckets).unwrap();
        assert!(buckets.iter().all(|&b| b == HASH32_DEFAULT_INIT));
    }

    #[test]
    fn chk_next_uses_little_endian_halves() {
        let mut buckets = [HASH32_DEFAULT_INIT; 2];
        chk_next(&mut buckets, &[0x1111_2222_3333_4444]).unwrap();
        assert_eq!(buckets[0], hash32(HASH32_DEFAULT_INIT, 0x3333_4444));
        assert_eq!(buckets[1], hash32(HASH32_DEFAULT_INIT, 0x1111_2222));
    }

    #[test]
    fn reduce_splits_at_midpoint() {
        let buckets = [1u32, 2, 4, 8, 0x10, 0x20, 0x40, 0x80];
        assert_eq!(chk_reduce(&buckets).unwrap(), 0x0000_00f0_0000_000f);
    }

    #[test]
    fn known_reduced_hashes() {
        assert_eq!(chk_gen(64, 0, 1).unwrap(), 0x8152_e2cb_b869_1021);
        assert_eq!(chk_gen(8, 0, 1).unwrap(), 0x8607_6b19_2b16_406b);
        assert_eq!(chk_gen(64, 0xf00, 1).unwrap(), 0x8157_b2cb_b869_4521);
        assert_eq!(chk_gen(64, 0xf00, 5).unwrap(), 0xc46c_d878_b0b9_8ffd);
        assert_eq!(chk_gen(128, 0x1234, 3).unwrap(), 0x14d3_df89_f5a8_3ef2);
        assert_eq!(chk_gen(8, 0xf00, 7).unwrap(), 0x4a99_c9c9_d9b7_a99d);
        assert_eq!(chk_gen(64, 0xf01, 57).unwrap(), 0x50bc_5d76_c51e_be2e);
    }

    #[test]
    fn zero_values_reduce_the_init_buckets() {
        // Eight identical buckets per half cancel out.
        assert_eq!(chk_gen(64, 0xabc, 0).unwrap(), 0);
        // One bucket per half survives.
        let init = HASH32_DEFAULT_INIT as u64;
        assert_eq!(chk_gen(8, 0xabc, 0).unwrap(), (init << 32) | init);
    }

    #[test]
    fn owned_checker_matches_slice_functions() {
        let mut data_gen = TestDataGen::new(32, 9).unwrap();
        let mut chk = TestDataChk::new(32).unwrap();
        let mut buckets = [0u32; 8];
        chk_reset(&mut buckets).unwrap();

        for _ in 0..4 {
            chk.update(data_gen.data()).unwrap();
            chk_next(&mut buckets, data_gen.data()).unwrap();
            data_gen.advance();
        }
        assert_eq!(chk.buckets(), &buckets);
        assert_eq!(chk.reduce(), chk_reduce(&buckets).unwrap());

        chk.reset();
        assert!(chk.buckets().iter().all(|&b| b == HASH32_DEFAULT_INIT));
        assert_eq!(chk.byte_len(), 32);
    }
}
