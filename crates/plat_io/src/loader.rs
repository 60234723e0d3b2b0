use anyhow::{Context, Result, bail};
use plat_core::test_data::validate_len;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Loads a readback dump and splits it into data vectors of `byte_len` bytes.
pub fn load_dump<P: AsRef<Path>>(path: P, byte_len: usize) -> Result<Vec<Vec<u64>>> {
    let words_per_vector = validate_len(byte_len)?;

    let mut file = File::open(path.as_ref())
        .with_context(|| format!("Failed to open dump {}", path.as_ref().display()))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    if buffer.len() % byte_len != 0 {
        bail!(
            "dump holds {} bytes, not a whole number of {}-byte vectors",
            buffer.len(),
            byte_len
        );
    }

    let words: Vec<u64> = buffer
        .chunks_exact(8)
        .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect();

    Ok(words
        .chunks_exact(words_per_vector)
        .map(<[u64]>::to_vec)
        .collect())
}

/// Writes data vectors back to back as little-endian words.
pub fn write_dump<P, I, V>(path: P, vectors: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = V>,
    V: AsRef<[u64]>,
{
    let file = File::create(path.as_ref())
        .with_context(|| format!("Failed to create dump {}", path.as_ref().display()))?;
    let mut out = BufWriter::new(file);

    for vector in vectors {
        for word in vector.as_ref() {
            out.write_all(&word.to_le_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}
