//! Offline generation and checking of test data.
//!
//! `gen` reproduces the hash a test engine should report for a given
//! length, seed and vector count, and can dump the generated vectors for
//! loading into a buffer or a simulation. `check` hashes a readback dump
//! captured from hardware and compares it with the generator.

use anyhow::{Context, Result, bail};
use plat_core::atomic_check::{self, AtomicBuffer, AtomicWidth};
use plat_core::line_check::{self, LINE_WORDS, WriteCheck};
use plat_core::{TestDataChk, TestDataGen, chk_gen};
use plat_io::loader;
use tracing::debug;

/// Prints the reduced hash for `count` vectors and optionally dumps them.
///
/// # Arguments
///
/// * `byte_len` - Data vector length in bytes (non-zero multiple of 8)
/// * `seed` - Generator seed
/// * `count` - Number of vectors hashed by the engine
/// * `dump_path` - If set, the generated vectors are written here
///
/// # Returns
///
/// The reduced 64-bit hash.
pub fn generate(byte_len: usize, seed: u64, count: usize, dump_path: Option<&str>) -> Result<u64> {
    let hash = chk_gen(byte_len, seed, count)?;
    println!(
        "bytes={} seed=0x{:x} count={} hash=0x{:016x}",
        byte_len, seed, count, hash
    );

    if let Some(path) = dump_path {
        let mut data_gen = TestDataGen::new(byte_len, seed)?;
        let vectors = (0..count).map(|_| {
            let v = data_gen.data().to_vec();
            data_gen.advance();
            v
        });
        loader::write_dump(path, vectors)?;
        println!("Wrote {} vectors to {}", count, path);
    }

    Ok(hash)
}

/// Hashes every vector in a readback dump and compares the result with the
/// generator for `seed`.
///
/// # Returns
///
/// `true` if the dump matches the generated sequence.
pub fn check_dump(path: &str, byte_len: usize, seed: u64) -> Result<bool> {
    let vectors = loader::load_dump(path, byte_len)?;
    debug!(path, vectors = vectors.len(), "loaded dump");

    let mut chk = TestDataChk::new(byte_len)?;
    for v in &vectors {
        chk.update(v)?;
    }
    let actual = chk.reduce();
    let expected = chk_gen(byte_len, seed, vectors.len())?;

    println!("Vectors:  {}", vectors.len());
    println!("Hash:     0x{:016x}", actual);
    println!("Expected: 0x{:016x}", expected);

    if actual != expected {
        // Find the first vector that diverges from the generator.
        let mut data_gen = TestDataGen::new(byte_len, seed)?;
        for (idx, v) in vectors.iter().enumerate() {
            if v.as_slice() != data_gen.data() {
                println!("First mismatch at vector {}", idx);
                break;
            }
            data_gen.advance();
        }
    }

    Ok(actual == expected)
}

fn load_lines(path: &str) -> Result<Vec<u64>> {
    let lines = loader::load_dump(path, LINE_WORDS * 8)?;
    Ok(lines.into_iter().flatten().collect())
}

/// Prints the host channel read hash of a buffer dump.
///
/// Every line in the dump is read, in bursts of `burst_size` lines.
pub fn line_hash(path: &str, burst_size: usize) -> Result<u32> {
    if burst_size == 0 {
        bail!("burst size must be at least 1");
    }
    let buf = load_lines(path)?;
    let num_lines = buf.len() / LINE_WORDS;
    let num_bursts = num_lines / burst_size;

    let hash = line_check::expected_read_hash(&buf, num_bursts, burst_size)?;
    println!(
        "{} bursts of {} lines: read hash 0x{:08x}",
        num_bursts, burst_size, hash
    );
    Ok(hash)
}

/// Checks a buffer dump written by the host channel engine.
///
/// The dump must hold `num_lines` stamped lines followed by at least one
/// untouched line.
pub fn check_written(path: &str, base_iova: u64, num_lines: usize) -> Result<bool> {
    let buf = load_lines(path)?;
    let result = line_check::check_written_lines(&buf, base_iova, num_lines)
        .with_context(|| format!("{} is too short for {} lines", path, num_lines))?;

    match result {
        WriteCheck::Pass => {
            println!("{} lines from IOVA 0x{:x}: PASS", num_lines, base_iova);
            Ok(true)
        }
        WriteCheck::BadLine(idx) if idx == num_lines => {
            println!("FAIL: line {} past the end of the region was written", idx);
            Ok(false)
        }
        WriteCheck::BadLine(idx) => {
            println!("FAIL: line {} (IOVA 0x{:x})", idx, base_iova + idx as u64);
            Ok(false)
        }
    }
}

fn load_words(path: &str) -> Result<Vec<u64>> {
    let words = loader::load_dump(path, 8)?;
    Ok(words.into_iter().flatten().collect())
}

/// Checks the atomic and write-back buffer dumps of an atomic run.
///
/// # Returns
///
/// `true` if both buffers hold the expected results of `num_updates`
/// atomic requests.
pub fn check_atomic(
    atomic_path: &str,
    wb_path: &str,
    width: AtomicWidth,
    num_updates: usize,
) -> Result<bool> {
    let atomic_buf = load_words(atomic_path)?;
    let wb_buf = load_words(wb_path)?;
    debug!(atomic_path, wb_path, bits = width.bits(), "loaded atomic buffers");

    let mismatches = atomic_check::check_atomic_buffers(&atomic_buf, &wb_buf, width, num_updates)
        .with_context(|| format!("cannot check {} atomic updates", num_updates))?;

    for m in &mismatches {
        let name = match m.buffer {
            AtomicBuffer::Atomic => "atomic",
            AtomicBuffer::WriteBack => "write-back",
        };
        println!(
            "{} [{}]: 0x{:x}, expected 0x{:x}",
            name, m.idx, m.actual, m.expected
        );
    }

    let ok = mismatches.is_empty();
    println!(
        "{}-bit atomics, {} updates: {}",
        width.bits(),
        num_updates,
        if ok { "PASS" } else { "FAIL" }
    );
    Ok(ok)
}
