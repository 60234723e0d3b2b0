//! Re-validation of the software generator against recorded hardware
//! hashes.

use anyhow::Result;
use plat_core::chk_gen;
use plat_io::parser::{self, GoldenVector};
use rayon::prelude::*;
use std::time::Instant;

/// A golden vector whose recomputed hash differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub vector: GoldenVector,
    pub actual: u64,
}

/// Recomputes every golden vector in parallel.
///
/// Returns the mismatches in file order.
pub fn check_vectors(vectors: &[GoldenVector]) -> Result<Vec<Mismatch>> {
    let results: Vec<Option<Mismatch>> = vectors
        .par_iter()
        .map(|v| -> Result<Option<Mismatch>> {
            let actual = chk_gen(v.byte_len, v.seed, v.count)?;
            Ok((actual != v.hash).then_some(Mismatch { vector: *v, actual }))
        })
        .collect::<Result<_>>()?;

    Ok(results.into_iter().flatten().collect())
}

/// Loads a golden vector file and checks every entry.
///
/// Returns the number of mismatches.
pub fn run_verify(path: &str) -> Result<usize> {
    println!("Loading golden vectors from {}...", path);
    let vectors = parser::load_golden_file(path)?;
    println!("Loaded {} vectors.", vectors.len());

    let start = Instant::now();
    let mismatches = check_vectors(&vectors)?;

    for m in &mismatches {
        println!(
            "line {}: bytes={} seed=0x{:x} count={}: 0x{:016x}, expected 0x{:016x}",
            m.vector.line, m.vector.byte_len, m.vector.seed, m.vector.count, m.actual, m.vector.hash
        );
    }

    println!("Time: {:.4} s", start.elapsed().as_secs_f64());
    println!(
        "Matched: {}/{}",
        vectors.len() - mismatches.len(),
        vectors.len()
    );
    Ok(mismatches.len())
}
