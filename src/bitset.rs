//! Compact bitset representation for taxon sets.
//!
//! # Overview
//! A bitset records which taxa of a [`TaxonSet`](crate::taxa::TaxonSet) belong
//! to a clade. Each bit position corresponds to a taxon index.
//!
//! # Example
//! For a universe with taxa [A, B, C, D] mapped to indices [0, 1, 2, 3]:
//! - Clade {A, C} → bitset `0b0101` (bits 0 and 2 set)
//! - Clade {B, C, D} → bitset `0b1110` (bits 1, 2, 3 set)
//!
//! # Width
//! The universe can still grow while trees are being read, so two bitsets built
//! at different moments may carry a different number of words. Equality, hashing
//! and ordering only look at the *significant* words (trailing zero words are
//! ignored), which keeps `{A}` built over 3 taxa equal to `{A}` built over 130.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Number of u64 words needed to hold `bits` bits.
#[inline]
pub fn words_for(bits: usize) -> usize {
    bits.div_ceil(64)
}

/// A compact bitset for representing which taxa belong to a clade.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily large universes.
/// Each u64 word holds 64 taxon indices.
///
/// # Memory efficiency
/// - Traditional HashSet<usize>: ~24 bytes per element + overhead
/// - Bitset: 1 bit per possible element (8 bytes per 64 taxa)
#[derive(Clone, Debug)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Creates a new bitset with all bits set to 0.
    ///
    /// # Parameters
    /// - `words`: Number of u64 words needed. Calculate with [`words_for`].
    ///
    /// # Example
    /// ```
    /// # use clade_extractor::bitset::Bitset;
    /// // For a universe of 100 taxa, need 2 words (128 bits)
    /// let bs = Bitset::zeros(2);
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Sets the bit at the given index to 1, growing the word vector if needed.
    ///
    /// # Example
    /// ```
    /// # use clade_extractor::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);  // Mark taxon 0 as present
    /// bs.set(5);  // Mark taxon 5 as present
    /// assert_eq!(bs.0[0], 0b00100001);
    /// ```
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;     // Equivalent to idx / 64
        let bit = idx & 63;      // Equivalent to idx % 64
        if word >= self.0.len() {
            self.0.resize(word + 1, 0);
        }
        self.0[word] |= 1u64 << bit;
    }

    /// Returns true if the bit at `idx` is set.
    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        self.0
            .get(idx >> 6)
            .is_some_and(|w| w & (1u64 << (idx & 63)) != 0)
    }

    /// Performs bitwise OR with another bitset (union operation).
    ///
    /// Merges two taxon sets: `self` becomes `self ∪ other`
    ///
    /// # Example
    /// ```
    /// # use clade_extractor::bitset::Bitset;
    /// let mut left = Bitset::zeros(1);
    /// left.set(0);   // {0}
    ///
    /// let mut right = Bitset::zeros(1);
    /// right.set(1);  // {1}
    ///
    /// left.or_assign(&right);  // {0} ∪ {1} = {0, 1}
    /// assert_eq!(left.0[0], 0b11);
    /// ```
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        if other.0.len() > self.0.len() {
            self.0.resize(other.0.len(), 0);
        }
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Asymmetric difference: bits set in `self` but not in `other`.
    ///
    /// # Example
    /// ```
    /// # use clade_extractor::bitset::Bitset;
    /// let mut abc = Bitset::zeros(1);
    /// abc.set(0); abc.set(1); abc.set(2);
    /// let mut b = Bitset::zeros(1);
    /// b.set(1);
    /// assert_eq!(abc.and_not(&b).0[0], 0b101);
    /// ```
    pub fn and_not(&self, other: &Bitset) -> Bitset {
        Bitset(
            self.0
                .iter()
                .enumerate()
                .map(|(i, w)| w & !other.0.get(i).copied().unwrap_or(0))
                .collect(),
        )
    }

    /// Returns true if every bit of `other` is also set in `self`.
    pub fn is_superset_of(&self, other: &Bitset) -> bool {
        other
            .0
            .iter()
            .enumerate()
            .all(|(i, b)| self.0.get(i).copied().unwrap_or(0) & b == *b)
    }

    /// Counts the number of set bits (population count).
    ///
    /// # Example
    /// ```
    /// # use clade_extractor::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(2);
    /// bs.set(5);
    /// assert_eq!(bs.count_ones(), 3);
    /// ```
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates over the indices of set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(i, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some((i << 6) + bit)
            })
        })
    }

    /// Words up to and including the last non-zero one.
    fn significant(&self) -> &[u64] {
        let len = self.0.iter().rposition(|&w| w != 0).map_or(0, |p| p + 1);
        &self.0[..len]
    }
}

impl PartialEq for Bitset {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for Bitset {}

impl Hash for Bitset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl Ord for Bitset {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significant().cmp(other.significant())
    }
}

impl PartialOrd for Bitset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
