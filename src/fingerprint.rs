//! SimHash content fingerprints for near-duplicate detection.
//!
//! Articles get republished across outlets with small edits: a byline
//! swapped, an ad disclaimer inserted, a paragraph trimmed. Comparing full
//! bodies for every new article is too expensive, so each body is reduced to
//! a 64-bit fingerprint where similar token distributions land a small
//! Hamming distance apart.
//!
//! # Construction
//!
//! 1. Split on whitespace, keep tokens of 3+ characters, lowercase them.
//! 2. Hash every token with MD5 (128 bits, read big-endian).
//! 3. For each of the `width` low bits, add +1 to a per-bit accumulator when
//!    the bit is set and -1 otherwise.
//! 4. Bit `i` of the fingerprint is set iff accumulator `i` is positive.
//!
//! Text with no qualifying tokens yields `0`, which carries no signal and is
//! never treated as a duplicate of anything.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fingerprint width used everywhere unless configured otherwise.
pub const DEFAULT_WIDTH: u32 = 64;

/// Hamming distance at or below which two articles count as the same story.
pub const DEFAULT_DUPLICATE_THRESHOLD: u32 = 10;

/// Shortest token (in characters) that contributes to a fingerprint.
pub const MIN_TOKEN_CHARS: usize = 3;

/// A fixed-width SimHash fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// The "no signal" fingerprint produced by empty or all-short text.
    pub const EMPTY: Fingerprint = Fingerprint(0);

    pub fn value(self) -> u64 {
        self.0
    }

    /// `false` for the zero fingerprint, which must be kept out of duplicate
    /// comparison.
    pub fn is_informative(self) -> bool {
        self.0 != 0
    }

    /// Hamming distance over the full 64 bits.
    pub fn distance(self, other: Fingerprint) -> u32 {
        hamming_distance(self.0, other.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Fingerprint {
    fn from(v: u64) -> Self {
        Fingerprint(v)
    }
}

/// Computes fingerprints of a configurable width (at most 64 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimHasher {
    width: u32,
}

impl Default for SimHasher {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
        }
    }
}

impl SimHasher {
    /// Widths above 64 are clamped to 64.
    pub fn new(width: u32) -> Self {
        Self {
            width: width.min(DEFAULT_WIDTH),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    fn mask(&self) -> u64 {
        match self.width {
            0 => 0,
            w if w >= 64 => u64::MAX,
            w => (1u64 << w) - 1,
        }
    }

    /// Fingerprint `text`. Pure and order-insensitive over tokens.
    pub fn compute(&self, text: &str) -> Fingerprint {
        let width = self.width as usize;
        let mut acc = vec![0i64; width];
        let mut seen_any = false;

        for token in tokenize(text) {
            seen_any = true;
            let h = token_digest(&token);
            for (i, slot) in acc.iter_mut().enumerate() {
                if (h >> i) & 1 == 1 {
                    *slot += 1;
                } else {
                    *slot -= 1;
                }
            }
        }

        if !seen_any {
            return Fingerprint::EMPTY;
        }

        // Ties (exactly zero) leave the bit unset.
        let bits = acc
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0)
            .fold(0u64, |out, (i, _)| out | (1u64 << i));

        Fingerprint(bits)
    }

    /// Hamming distance between two fingerprints of this hasher's width.
    pub fn distance(&self, a: Fingerprint, b: Fingerprint) -> u32 {
        ((a.0 ^ b.0) & self.mask()).count_ones()
    }
}

/// Whitespace tokens of at least [`MIN_TOKEN_CHARS`] characters, lowercased.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_lowercase)
}

fn token_digest(token: &str) -> u128 {
    let digest = md5::compute(token.as_bytes());
    u128::from_be_bytes(digest.0)
}

/// 64-bit fingerprint of `text`.
pub fn fingerprint(text: &str) -> u64 {
    SimHasher::default().compute(text).0
}

/// Number of differing bits between `a` and `b`.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// `true` when both fingerprints carry signal and differ by at most
/// `threshold` bits.
pub fn is_near_duplicate(a: Fingerprint, b: Fingerprint, threshold: u32) -> bool {
    a.is_informative() && b.is_informative() && a.distance(b) <= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const PASSAGE: &str = "Federal regulators on Tuesday approved a sweeping overhaul of the \
        nation's electricity grid rules, clearing the way for thousands of new solar and wind \
        projects that have been stuck waiting for years to connect. The commission voted three \
        to two after months of contentious hearings in which utilities warned that the changes \
        would shift costs onto ratepayers while developers argued that the existing queue was \
        strangling investment. Under the new rules, grid operators must study interconnection \
        requests in clusters rather than one at a time, and developers must post larger deposits \
        to discourage speculative applications that clog the backlog. Analysts said the decision \
        could cut average wait times roughly in half within five years, though much depends on \
        how quickly regional operators rewrite their procedures. Several states have already \
        begun drafting companion legislation to speed permitting for transmission lines, which \
        remain the largest bottleneck for bringing renewable power from remote areas to cities. \
        Consumer advocates cautiously welcomed the ruling but said they would watch closely \
        for evidence that households end up paying for upgrades that mainly benefit private \
        developers. Industry groups representing utilities said they were still reviewing the \
        order and had not decided whether to seek a rehearing or challenge it in federal court.";

    #[test]
    fn test_deterministic() {
        assert_eq!(fingerprint(PASSAGE), fingerprint(PASSAGE));
        assert_eq!(hamming_distance(fingerprint(PASSAGE), fingerprint(PASSAGE)), 0);
    }

    #[test]
    fn test_degenerate_input_is_zero() {
        assert_eq!(fingerprint(""), 0);
        assert_eq!(fingerprint("ab cd"), 0);
        assert_eq!(fingerprint("   \n\t "), 0);
        assert!(!Fingerprint(fingerprint("a b c")).is_informative());
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            fingerprint("Hello World Today"),
            fingerprint("hello world today")
        );
    }

    #[test]
    fn test_order_insensitive() {
        assert_eq!(
            fingerprint("alpha beta gamma"),
            fingerprint("gamma alpha beta")
        );
    }

    #[test]
    fn test_short_tokens_ignored() {
        assert_eq!(fingerprint("alpha to beta"), fingerprint("alpha beta"));
    }

    #[test]
    fn test_single_token_matches_digest_bits() {
        // With one token every accumulator is +1 or -1, so the fingerprint is
        // exactly the low 64 bits of the digest.
        let expected = u128::from_be_bytes(md5::compute(b"hello").0) as u64;
        assert_eq!(fingerprint("Hello"), expected);
    }

    #[test]
    fn test_opposite_tokens_tie_to_unset() {
        // Two tokens cancel to exactly zero wherever their bits differ.
        let a = token_digest("alpha") as u64;
        let b = token_digest("bravo") as u64;
        assert_eq!(fingerprint("alpha bravo"), a & b);
    }

    #[test]
    fn test_one_word_edit_is_close() {
        let edited = PASSAGE.replacen("Tuesday", "Wednesday", 1);
        let d = hamming_distance(fingerprint(PASSAGE), fingerprint(&edited));
        assert!(d <= 15, "distance {d} too large for a one-word edit");
    }

    #[test]
    fn test_unrelated_texts_average_half_width() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut total = 0u64;
        let samples = 200;
        for _ in 0..samples {
            let a: String = (0..150)
                .map(|_| format!("a{:06}", rng.random_range(0..1_000_000u32)))
                .collect::<Vec<_>>()
                .join(" ");
            let b: String = (0..150)
                .map(|_| format!("b{:06}", rng.random_range(0..1_000_000u32)))
                .collect::<Vec<_>>()
                .join(" ");
            total += hamming_distance(fingerprint(&a), fingerprint(&b)) as u64;
        }
        let mean = total as f64 / samples as f64;
        assert!((26.0..=38.0).contains(&mean), "mean distance {mean}");
    }

    #[test]
    fn test_narrow_width_masks_high_bits() {
        let hasher = SimHasher::new(16);
        let fp = hasher.compute(PASSAGE);
        assert_eq!(fp.0 >> 16, 0);
        assert_eq!(fp.0, fingerprint(PASSAGE) & 0xffff);
        assert_eq!(hasher.distance(Fingerprint(u64::MAX), Fingerprint(0)), 16);
    }

    #[test]
    fn test_width_clamped_and_zero() {
        assert_eq!(SimHasher::new(128).width(), 64);
        assert_eq!(SimHasher::new(0).compute(PASSAGE), Fingerprint::EMPTY);
    }

    #[test]
    fn test_near_duplicate_rejects_zero() {
        assert!(!is_near_duplicate(Fingerprint(0), Fingerprint(0), 10));
        let fp = Fingerprint(fingerprint(PASSAGE));
        assert!(is_near_duplicate(fp, fp, 0));
        assert!(!is_near_duplicate(fp, Fingerprint(!fp.0), 10));
    }

    #[test]
    fn test_display_is_padded_hex() {
        assert_eq!(Fingerprint(0xab).to_string(), "00000000000000ab");
    }
}
