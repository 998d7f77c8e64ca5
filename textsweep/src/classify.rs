//! Content-based text/binary classification.
//!
//! Nothing here looks at file names or extensions. A file is judged only by
//! a bounded sample of its leading bytes, run through a fixed sequence of
//! heuristics that stops at the first confident signal:
//!
//! 1. guard: missing, directory or zero-length input is not text
//! 2. byte-order mark: a UTF-8/UTF-16 BOM is text
//! 3. null byte: any `0x00` in the sample is binary
//! 4. printable ratio: fewer than 95% printable ASCII/whitespace bytes is binary
//! 5. entropy: more than 7 bits/byte is binary, anything else is text
//!
//! Both the whole-file path (small files) and the sampled path (large files)
//! end in [`classify_bytes`], so the decision for a given sample never depends
//! on how it was read.
use memchr::memchr;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

/// Maximum number of leading bytes inspected per file
pub const SAMPLE_SIZE: usize = 4096;

/// Minimum share of printable bytes for a sample to count as text
pub const TEXT_RATIO_THRESHOLD: f64 = 0.95;

/// Entropy (bits/byte) above which a sample counts as binary
pub const ENTROPY_THRESHOLD: f64 = 7.0;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];
const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];

/// The heuristic that made the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionStage {
    /// Missing path, directory, empty input or unreadable file
    Guard,
    ByteOrderMark,
    NullByte,
    PrintableRatio,
    Entropy,
}

impl DecisionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStage::Guard => "guard",
            DecisionStage::ByteOrderMark => "bom",
            DecisionStage::NullByte => "null-byte",
            DecisionStage::PrintableRatio => "printable-ratio",
            DecisionStage::Entropy => "entropy",
        }
    }
}

/// Outcome of classifying one byte sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub is_text: bool,
    /// Number of bytes the decision was based on
    pub sampled_bytes: usize,
    pub stage: DecisionStage,
}

impl Classification {
    fn text(sampled_bytes: usize, stage: DecisionStage) -> Self {
        Self {
            is_text: true,
            sampled_bytes,
            stage,
        }
    }

    fn binary(sampled_bytes: usize, stage: DecisionStage) -> Self {
        Self {
            is_text: false,
            sampled_bytes,
            stage,
        }
    }
}

/// Classifies an in-memory byte slice. Only the first [`SAMPLE_SIZE`] bytes
/// are considered.
pub fn classify_bytes(bytes: &[u8]) -> Classification {
    let sample = &bytes[..bytes.len().min(SAMPLE_SIZE)];
    let len = sample.len();

    if len == 0 {
        return Classification::binary(0, DecisionStage::Guard);
    }

    if has_bom(sample) {
        return Classification::text(len, DecisionStage::ByteOrderMark);
    }

    if memchr(0, sample).is_some() {
        return Classification::binary(len, DecisionStage::NullByte);
    }

    if printable_ratio(sample) < TEXT_RATIO_THRESHOLD {
        return Classification::binary(len, DecisionStage::PrintableRatio);
    }

    if shannon_entropy(sample) > ENTROPY_THRESHOLD {
        Classification::binary(len, DecisionStage::Entropy)
    } else {
        Classification::text(len, DecisionStage::Entropy)
    }
}

/// Classifies the file at `path`. Never fails: anything that prevents reading
/// a sample classifies as not text.
pub fn classify_path(path: &Path) -> Classification {
    let metadata = match path.metadata() {
        Ok(metadata) => metadata,
        Err(e) => {
            trace!("Cannot stat {}: {}", path.display(), e);
            return Classification::binary(0, DecisionStage::Guard);
        }
    };

    if !metadata.is_file() || metadata.len() == 0 {
        return Classification::binary(0, DecisionStage::Guard);
    }

    match read_sample(path, metadata.len()) {
        Ok(sample) => classify_bytes(&sample),
        Err(e) => {
            trace!("Cannot sample {}: {}", path.display(), e);
            Classification::binary(0, DecisionStage::Guard)
        }
    }
}

/// Shorthand for `classify_path(path).is_text`
pub fn is_text_file(path: &Path) -> bool {
    classify_path(path).is_text
}

/// Reads the whole file when it is smaller than the sample, otherwise only the
/// first [`SAMPLE_SIZE`] bytes.
fn read_sample(path: &Path, file_len: u64) -> std::io::Result<Vec<u8>> {
    if file_len < SAMPLE_SIZE as u64 {
        return std::fs::read(path);
    }

    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

fn has_bom(sample: &[u8]) -> bool {
    sample.starts_with(&UTF8_BOM)
        || sample.starts_with(&UTF16_BE_BOM)
        || sample.starts_with(&UTF16_LE_BOM)
}

fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E | b'\t' | b'\n' | b'\r')
}

fn printable_ratio(sample: &[u8]) -> f64 {
    let printable = sample.iter().filter(|&&b| is_printable(b)).count();
    printable as f64 / sample.len() as f64
}

/// Shannon entropy of the byte histogram, in bits per byte (0.0 to 8.0)
pub fn shannon_entropy(sample: &[u8]) -> f64 {
    if sample.len() <= 1 {
        return 0.0;
    }

    let mut histogram = [0usize; 256];
    for &byte in sample {
        histogram[byte as usize] += 1;
    }

    let len = sample.len() as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}
