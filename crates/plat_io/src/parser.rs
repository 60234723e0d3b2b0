//! Parsers for numeric literals and golden vector files.
//!
//! A golden vector file records reduced hashes observed on hardware so that
//! the software generator can be re-validated against them later:
//!
//! ```text
//! # local memory, engine 0
//! bytes=64 seed=0xf00 count=5 hash=0xc46cd878b0b98ffd
//! ```
//!
//! Fields may appear in any order; numbers are decimal or `0x` hex.

use anyhow::{Context, Result, anyhow, bail};
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::{alpha1, char, digit1, space0, space1};
use nom::combinator::{all_consuming, map_res};
use nom::multi::separated_list1;
use nom::sequence::{preceded, separated_pair, terminated};
use std::fs;
use std::path::Path;

/// One recorded hardware result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoldenVector {
    /// Data vector length in bytes.
    pub byte_len: usize,
    pub seed: u64,
    /// Number of data vectors the hardware checked.
    pub count: usize,
    /// Reduced hash the hardware reported.
    pub hash: u64,
    /// 1-based line in the source file.
    pub line: usize,
}

fn hex_u64(input: &str) -> IResult<&str, u64> {
    preceded(
        tag_no_case("0x"),
        map_res(
            take_while1(|c: char| c.is_ascii_hexdigit() || c == '_'),
            |s: &str| u64::from_str_radix(&s.replace('_', ""), 16),
        ),
    )(input)
}

fn dec_u64(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse::<u64>)(input)
}

/// Parses a decimal or `0x`-prefixed hex literal.
pub fn number(input: &str) -> IResult<&str, u64> {
    alt((hex_u64, dec_u64))(input)
}

/// Parses a complete numeric literal, as accepted on the command line.
pub fn parse_u64(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    all_consuming(number)(trimmed)
        .map(|(_, value)| value)
        .map_err(|_| anyhow!("invalid number '{}'", input))
}

fn field(input: &str) -> IResult<&str, (&str, u64)> {
    separated_pair(alpha1, char('='), number)(input)
}

fn record(input: &str) -> IResult<&str, Vec<(&str, u64)>> {
    terminated(separated_list1(space1, field), space0)(input)
}

/// Parses one golden vector line (without comments).
pub fn parse_golden_line(input: &str, line: usize) -> Result<GoldenVector> {
    let (_, fields) = all_consuming(preceded(space0, record))(input)
        .map_err(|e| anyhow!("line {}: malformed record: {:?}", line, e))?;

    let (mut byte_len, mut seed, mut count, mut hash) = (None, None, None, None);
    for (key, value) in fields {
        let slot = match key {
            "bytes" => &mut byte_len,
            "seed" => &mut seed,
            "count" => &mut count,
            "hash" => &mut hash,
            other => bail!("line {}: unknown field '{}'", line, other),
        };
        if slot.replace(value).is_some() {
            bail!("line {}: duplicate field '{}'", line, key);
        }
    }

    let missing = |name: &str| anyhow!("line {}: missing field '{}'", line, name);
    Ok(GoldenVector {
        byte_len: usize::try_from(byte_len.ok_or_else(|| missing("bytes"))?)?,
        seed: seed.ok_or_else(|| missing("seed"))?,
        count: usize::try_from(count.ok_or_else(|| missing("count"))?)?,
        hash: hash.ok_or_else(|| missing("hash"))?,
        line,
    })
}

/// Parses golden vectors from text, skipping blank lines and `#` comments.
pub fn parse_golden(text: &str) -> Result<Vec<GoldenVector>> {
    let mut vectors = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let body = raw.split('#').next().unwrap_or("").trim();
        if body.is_empty() {
            continue;
        }
        vectors.push(parse_golden_line(body, idx + 1)?);
    }
    Ok(vectors)
}

/// Loads a golden vector file.
pub fn load_golden_file<P: AsRef<Path>>(path: P) -> Result<Vec<GoldenVector>> {
    let text = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to open golden file {}", path.as_ref().display()))?;
    parse_golden(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_u64("42").unwrap(), 42);
        assert_eq!(parse_u64("0xf00").unwrap(), 0xf00);
        assert_eq!(parse_u64("0XF00").unwrap(), 0xf00);
        assert_eq!(parse_u64(" 0xdead_beef ").unwrap(), 0xdead_beef);
        assert_eq!(parse_u64("0xffffffffffffffff").unwrap(), u64::MAX);
        assert!(parse_u64("").is_err());
        assert!(parse_u64("0x").is_err());
        assert!(parse_u64("12ab").is_err());
        assert!(parse_u64("0x1_0000_0000_0000_0000").is_err());
    }

    #[test]
    fn golden_line_any_order() {
        let v = parse_golden_line("hash=0x10 count=3 seed=7 bytes=64", 4).unwrap();
        assert_eq!(
            v,
            GoldenVector {
                byte_len: 64,
                seed: 7,
                count: 3,
                hash: 0x10,
                line: 4
            }
        );
    }

    #[test]
    fn golden_line_errors() {
        assert!(parse_golden_line("bytes=64 seed=1 count=2", 1).is_err());
        assert!(parse_golden_line("bytes=64 seed=1 count=2 hash=3 lanes=4", 1).is_err());
        assert!(parse_golden_line("bytes=64 bytes=8 seed=1 count=2 hash=3", 1).is_err());
        assert!(parse_golden_line("bytes=64,seed=1", 1).is_err());
    }

    #[test]
    fn golden_text_skips_comments() {
        let text = "\n# header\nbytes=8 seed=0 count=1 hash=0x1  # trailing\n\n  bytes=64 seed=0xf00 count=5 hash=0xc46cd878b0b98ffd\n";
        let vectors = parse_golden(text).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].line, 3);
        assert_eq!(vectors[1].seed, 0xf00);
        assert_eq!(vectors[1].hash, 0xc46c_d878_b0b9_8ffd);
    }

    #[test]
    fn golden_text_reports_line() {
        let err = parse_golden("bytes=8 seed=0 count=1 hash=1\nbogus\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
