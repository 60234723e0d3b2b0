//! I/O utilities for test data captured from or destined for the AFUs.
//!
//! Provides functions for reading and writing raw data vector dumps (the
//! readback buffers captured from an engine) and for parsing the text files
//! that record golden reduced hashes. These utilities handle file access
//! and format parsing, leaving all hashing to `plat_core`.

/// Readback dump loading and writing.
///
/// A dump is a raw stream of little-endian 64-bit words, one data vector
/// after another, with no header.
pub mod loader;

/// Parsers for numeric literals and golden vector files.
///
/// Golden vector files list generator parameters together with the reduced
/// hash the hardware reported for them, one record per line.
pub mod parser;
