use std::sync::atomic::{AtomicU64, Ordering};

use crate::libs::seq::Sequence;
use crate::libs::{Ori, Pos};

/// Bloom filter over precomputed 64-bit sequence hashes.
///
/// See <http://en.wikipedia.org/wiki/Bloom_filter>.
///
/// The bit set is a slice of atomic words, so `test_and_add` can run from
/// many threads without ever producing a false negative; duplicate
/// `true` answers under races are benign.
pub struct BloomFilter {
    bits: Vec<AtomicU64>,
    n_bits: u64,
    multipliers: Vec<u64>,
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

impl BloomFilter {
    /// Build a filter for `members` expected insertions and the desired
    /// false positive probability.
    pub fn new(members: usize, error_prob: f64) -> Self {
        let n_bits = Self::optimal_bits(members, error_prob);
        let hashes = Self::optimal_hashes(members, n_bits);
        let words = (n_bits as usize + 63) / 64;
        let mut bits = Vec::with_capacity(words);
        bits.resize_with(words, || AtomicU64::new(0));
        // Odd multipliers decorrelate the derived hash functions.
        let multipliers = (0..hashes)
            .map(|i| splitmix64(i as u64) | 1)
            .collect();
        BloomFilter {
            bits,
            n_bits: n_bits as u64,
            multipliers,
        }
    }

    /// Optimal bits number: `m = -n * ln(p) / (ln 2)^2`, rounded up and
    /// then incremented if even. Odd cardinality reduces collisions of
    /// symmetric hashes.
    pub fn optimal_bits(members: usize, error_prob: f64) -> usize {
        let ln2 = std::f64::consts::LN_2;
        let m = (-(members as f64) * error_prob.ln() / (ln2 * ln2)).ceil() as usize;
        let m = m.max(1);
        if m % 2 == 0 {
            m + 1
        } else {
            m
        }
    }

    /// Optimal hash functions number: `k = (m / n) * ln 2`.
    pub fn optimal_hashes(members: usize, bits: usize) -> usize {
        let k = ((bits as f64 / members.max(1) as f64) * std::f64::consts::LN_2).ceil() as usize;
        k.max(1)
    }

    pub fn bits(&self) -> usize {
        self.n_bits as usize
    }

    pub fn hashes(&self) -> usize {
        self.multipliers.len()
    }

    fn index(&self, hash_index: usize, hash: u64) -> u64 {
        hash.wrapping_mul(self.multipliers[hash_index]) % self.n_bits
    }

    pub fn add(&self, hash: u64) {
        for i in 0..self.multipliers.len() {
            let idx = self.index(i, hash);
            self.bits[(idx / 64) as usize].fetch_or(1 << (idx % 64), Ordering::Relaxed);
        }
    }

    pub fn test(&self, hash: u64) -> bool {
        (0..self.multipliers.len()).all(|i| {
            let idx = self.index(i, hash);
            self.bits[(idx / 64) as usize].load(Ordering::Relaxed) & (1 << (idx % 64)) != 0
        })
    }

    /// Return whether the member is likely to have been added, and add it.
    /// Never returns a false `false` after a completed insertion.
    pub fn test_and_add(&self, hash: u64) -> bool {
        let mut seen = true;
        for i in 0..self.multipliers.len() {
            let idx = self.index(i, hash);
            let mask = 1 << (idx % 64);
            let prev = self.bits[(idx / 64) as usize].fetch_or(mask, Ordering::Relaxed);
            if prev & mask == 0 {
                seen = false;
            }
        }
        seen
    }

    /// Convenience overloads hashing an oriented substring directly.
    pub fn add_substr(&self, seq: &Sequence, begin: Pos, length: Pos, ori: Ori) {
        self.add(seq.hash(begin, length, ori));
    }

    pub fn test_substr(&self, seq: &Sequence, begin: Pos, length: Pos, ori: Ori) -> bool {
        self.test(seq.hash(begin, length, ori))
    }

    pub fn test_and_add_substr(&self, seq: &Sequence, begin: Pos, length: Pos, ori: Ori) -> bool {
        self.test_and_add(seq.hash(begin, length, ori))
    }

    /// Number of set bits (diagnostics).
    pub fn true_bits(&self) -> usize {
        self.bits
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_bits_are_odd() {
        for members in [1usize, 10, 100, 1000, 12345] {
            let bits = BloomFilter::optimal_bits(members, 0.01);
            assert_eq!(bits % 2, 1, "members {}", members);
        }
    }

    #[test]
    fn no_false_negatives() {
        let filter = BloomFilter::new(1000, 0.001);
        let hashes: Vec<u64> = (0..1000u64).map(splitmix64).collect();
        for &h in &hashes {
            filter.add(h);
        }
        for &h in &hashes {
            assert!(filter.test(h));
        }
    }

    #[test]
    fn test_and_add_reports_repeats() {
        let filter = BloomFilter::new(100, 0.001);
        assert!(!filter.test_and_add(42));
        assert!(filter.test_and_add(42));
        assert!(filter.test(42));
    }

    #[test]
    fn substr_overloads_agree() {
        let seq = Sequence::new("s", "TGGTCCGAGCGGACGGCC");
        let filter = BloomFilter::new(100, 0.001);
        filter.add_substr(&seq, 2, 5, 1);
        // same 5-mer in the opposite orientation
        assert!(filter.test_substr(&seq, 6, 5, -1));
    }

    #[test]
    fn parallel_insertions_never_undercount() {
        let filter = BloomFilter::new(10_000, 0.001);
        std::thread::scope(|s| {
            for t in 0..4 {
                let filter = &filter;
                s.spawn(move || {
                    for i in 0..1000u64 {
                        filter.test_and_add(splitmix64(i * 4 + t));
                    }
                });
            }
        });
        for t in 0..4u64 {
            for i in 0..1000u64 {
                assert!(filter.test(splitmix64(i * 4 + t)));
            }
        }
    }
}
