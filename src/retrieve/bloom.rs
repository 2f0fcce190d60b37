//! Bloom filter with key-split enhanced double-hashing.
//!
//! Keys are arbitrary vertex encodings: each key is blake3-hashed once,
//! the 128-bit prefix of the digest is split into two 64-bit halves
//! (h1, h2), and enhanced double-hashing derives the probe positions.
//! Build side and test side hash the same canonical vertex bytes, so a
//! member added on one side always tests positive on the other.
//!
//! Binary format (attached to scan requests as the push-down predicate):
//! ```text
//! [num_bits: u64 LE]           // 8 bytes
//! [num_hashes: u32 LE]         // 4 bytes
//! [padding: u32 LE = 0]        // 4 bytes
//! [bits: u64 LE x word_count]  // word_count = ceil(num_bits / 64)
//! ```

use std::io::Write;

use crate::error::{GraphError, Result};

/// Header size: num_bits(8) + num_hashes(4) + padding(4) = 16 bytes.
const BLOOM_HEADER_SIZE: usize = 16;

/// Bloom filter backed by a bit vector with key-split double-hashing.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: usize,
}

/// Optimal bit count for `n` members at false-positive rate `p`:
/// `ceil(-n * ln(p) / (ln 2)^2)`.
fn optimal_bits(n: usize, p: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    (-(n as f64) * p.ln() / (ln2 * ln2)).ceil() as usize
}

/// Optimal hash count for `m` bits over `n` members:
/// `max(1, round((m/n) * ln 2))`.
fn optimal_hashes(m: usize, n: usize) -> usize {
    let k = ((m as f64 / n as f64) * std::f64::consts::LN_2).round() as usize;
    k.max(1)
}

/// Hash a key into two 64-bit halves for double hashing.
///
/// h2 is forced odd (RocksDB technique) so it is coprime with any
/// power-of-two modulus, giving better bit distribution.
fn key_halves(key: &[u8]) -> (u64, u64) {
    let digest = blake3::hash(key);
    let bytes = digest.as_bytes();
    let h1 = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let h2 = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) | 1;
    (h1, h2)
}

fn probe_positions(
    key: &[u8],
    num_hashes: usize,
    num_bits: usize,
) -> impl Iterator<Item = usize> {
    let (h1, h2) = key_halves(key);
    (0..num_hashes as u64)
        .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % (num_bits as u64)) as usize)
}

impl BloomFilter {
    /// Create a filter sized for `expected_members` at `target_fpr`,
    /// capped at `max_bits`.
    ///
    /// The cap wins over the target rate: a capped filter realizes a
    /// worse false-positive rate than requested, which costs extra
    /// candidate work downstream but never correctness.
    ///
    /// The bit count is rounded up to a multiple of 64 (word-aligned)
    /// with a floor of 64, then held under the cap (itself rounded down
    /// to a word boundary, never below 64). `expected_members = 0` is
    /// valid and sizes as if for one member.
    pub fn sized_for(expected_members: usize, target_fpr: f64, max_bits: usize) -> Self {
        let n = expected_members.max(1);
        let aligned = (optimal_bits(n, target_fpr).max(64) + 63) & !63;
        let cap = (max_bits & !63).max(64);
        let num_bits = aligned.min(cap);
        let num_hashes = optimal_hashes(num_bits, n);
        let word_count = num_bits / 64;
        Self {
            bits: vec![0u64; word_count],
            num_bits,
            num_hashes,
        }
    }

    /// Add a key to the filter. Never removed; the filter only grows.
    pub fn insert(&mut self, key: &[u8]) {
        for pos in probe_positions(key, self.num_hashes, self.num_bits) {
            let word = pos / 64;
            let bit = pos % 64;
            self.bits[word] |= 1u64 << bit;
        }
    }

    /// Test whether a key might be a member.
    ///
    /// Returns `false` → definitely not present.
    /// Returns `true`  → probably present (subject to FPR).
    pub fn maybe_contains(&self, key: &[u8]) -> bool {
        for pos in probe_positions(key, self.num_hashes, self.num_bits) {
            let word = pos / 64;
            let bit = pos % 64;
            if self.bits[word] & (1u64 << bit) == 0 {
                return false;
            }
        }
        true
    }

    /// Number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of hash functions used.
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Serialize the filter into the writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.num_bits as u64).to_le_bytes())?;
        writer.write_all(&(self.num_hashes as u32).to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?; // padding
        for &word in &self.bits {
            writer.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    /// Serialize into a fresh byte vector (the scan-request snapshot).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        // Writing into a Vec cannot fail.
        self.write_to(&mut buf).expect("write to Vec");
        buf
    }

    /// Deserialize a filter from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < BLOOM_HEADER_SIZE {
            return Err(GraphError::InvalidFormat("Bloom filter too small".into()));
        }

        let num_bits = u64::from_le_bytes(bytes[0..8].try_into().unwrap()) as usize;
        let num_hashes = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        // bytes[12..16] is padding, ignored on read.

        if num_bits == 0 {
            return Err(GraphError::InvalidFormat("Bloom filter has zero bits".into()));
        }
        if num_hashes == 0 {
            return Err(GraphError::InvalidFormat(
                "Bloom filter has zero hash functions".into(),
            ));
        }

        let word_count = (num_bits + 63) / 64;
        let expected_size = BLOOM_HEADER_SIZE + word_count * 8;
        if bytes.len() < expected_size {
            return Err(GraphError::InvalidFormat(
                "Bloom filter data truncated".into(),
            ));
        }

        let mut bits = Vec::with_capacity(word_count);
        for i in 0..word_count {
            let offset = BLOOM_HEADER_SIZE + i * 8;
            let word = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
            bits.push(word);
        }

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
        })
    }

    /// Total serialized size in bytes.
    pub fn serialized_size(&self) -> usize {
        BLOOM_HEADER_SIZE + self.bits.len() * 8
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_matches_formula() {
        // n = 20, p = 1e-4: m = ceil(20 * 9.2103 / 0.4805) = 384,
        // k = round((384/20) * ln 2) = round(13.3) = 13.
        let bf = BloomFilter::sized_for(20, 1e-4, 1 << 20);
        assert_eq!(bf.num_bits(), optimal_bits(20, 1e-4));
        assert_eq!(bf.num_bits(), 384);
        assert_eq!(bf.num_hashes(), 13);
    }

    #[test]
    fn test_sizing_respects_cap() {
        let bf = BloomFilter::sized_for(1_000_000, 1e-4, 4096);
        assert_eq!(bf.num_bits(), 4096);
        // Cap makes m/n tiny; k floors at 1.
        assert_eq!(bf.num_hashes(), 1);
    }

    #[test]
    fn test_sizing_word_aligned_under_cap() {
        for n in [1, 3, 7, 20, 1000] {
            let bf = BloomFilter::sized_for(n, 1e-4, 1 << 20);
            assert_eq!(bf.num_bits() % 64, 0, "unaligned bits for n={n}");
            assert!(bf.num_bits() <= 1 << 20);
        }

        // An unaligned cap rounds down to the word boundary below it,
        // so the cap is never exceeded by alignment.
        let bf = BloomFilter::sized_for(1_000_000, 1e-4, 1000);
        assert_eq!(bf.num_bits(), 960);
    }

    #[test]
    fn test_sizing_zero_members() {
        let bf = BloomFilter::sized_for(0, 1e-4, 1 << 20);
        assert!(bf.num_bits() >= 64);
        assert!(bf.num_hashes() >= 1);
        assert!(!bf.maybe_contains(b"anything"));
    }

    #[test]
    fn test_insert_then_contains() {
        let mut bf = BloomFilter::sized_for(10, 1e-4, 1 << 20);
        assert!(!bf.maybe_contains(b"A0"));
        bf.insert(b"A0");
        assert!(bf.maybe_contains(b"A0"));
    }

    #[test]
    fn test_no_false_negatives() {
        let n = 1000;
        let mut bf = BloomFilter::sized_for(n, 1e-4, 1 << 24);
        let keys: Vec<String> = (0..n).map(|i| format!("vertex-{i}")).collect();

        for k in &keys {
            bf.insert(k.as_bytes());
        }
        for k in &keys {
            assert!(bf.maybe_contains(k.as_bytes()), "false negative for {k}");
        }
    }

    #[test]
    fn test_roundtrip() {
        let mut bf = BloomFilter::sized_for(500, 1e-4, 1 << 24);
        let keys: Vec<String> = (0..500).map(|i| format!("vertex-{i}")).collect();
        for k in &keys {
            bf.insert(k.as_bytes());
        }

        let buf = bf.to_bytes();
        assert_eq!(buf.len(), bf.serialized_size());

        let bf2 = BloomFilter::from_bytes(&buf).unwrap();
        assert_eq!(bf2.num_bits(), bf.num_bits());
        assert_eq!(bf2.num_hashes(), bf.num_hashes());
        for k in &keys {
            assert!(
                bf2.maybe_contains(k.as_bytes()),
                "false negative after roundtrip for {k}"
            );
        }
    }

    #[test]
    fn test_from_bytes_too_small() {
        let buf = vec![0u8; 12]; // less than 16-byte header
        let err = BloomFilter::from_bytes(&buf).unwrap_err();
        assert!(
            err.to_string().contains("Bloom filter too small"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_from_bytes_truncated() {
        // Header claims 128 bits (2 words) but only one word follows.
        let mut buf = Vec::new();
        buf.extend_from_slice(&128u64.to_le_bytes());
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());

        let err = BloomFilter::from_bytes(&buf).unwrap_err();
        assert!(
            err.to_string().contains("Bloom filter data truncated"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_from_bytes_zero_bits() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        let err = BloomFilter::from_bytes(&buf).unwrap_err();
        assert!(
            err.to_string().contains("Bloom filter has zero bits"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_fpr_close_to_target() {
        let n = 10_000;
        let mut bf = BloomFilter::sized_for(n, 0.01, 1 << 24);
        for i in 0..n {
            bf.insert(format!("member-{i}").as_bytes());
        }

        let probes = 100_000;
        let mut false_positives = 0u64;
        for i in 0..probes {
            if bf.maybe_contains(format!("outsider-{i}").as_bytes()) {
                false_positives += 1;
            }
        }

        let fpr = false_positives as f64 / probes as f64;
        assert!(
            fpr < 0.03,
            "FPR too high: {:.4}% ({false_positives} of {probes})",
            fpr * 100.0
        );
    }
}
