//! A fixed-capacity bit vector for monotonic membership tracking.
//!
//! The annotation store keeps one [`BitSet`] per member kind for the marked, processed and
//! instantiated states. Member identifiers are dense arena indices, so a bit per member is the
//! most compact representation and makes `is_marked` a shift and a mask.
//!
//! There is deliberately no `remove`: mark state only ever moves from unset to set.
//!
//! # Example
//!
//! ```rust,ignore
//! use reachscope::utils::BitSet;
//!
//! let mut set = BitSet::new(100);
//! assert!(set.insert(50));
//! assert!(!set.insert(50));
//!
//! assert!(set.contains(50));
//! assert_eq!(set.count(), 1);
//! ```

/// A bit vector of fixed capacity whose bits can only be set.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    /// The bits, stored as a vector of words.
    words: Vec<u64>,
    /// The number of addressable bits.
    len: usize,
}

impl BitSet {
    /// Creates a new empty bit set with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            len: capacity,
        }
    }

    /// Returns the capacity of this bit set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets the bit at the given index.
    ///
    /// # Returns
    ///
    /// `true` if the bit was previously unset.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < self.len, "index out of bounds");
        let word = &mut self.words[index / 64];
        let mask = 1u64 << (index % 64);
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    /// Returns `true` if the bit at the given index is set.
    ///
    /// Indices beyond the capacity are reported as unset.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates the indices of all set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_idx, &word)| SetBits { word }.map(move |bit| word_idx * 64 + bit))
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Yields the positions of set bits in a single word, lowest first.
struct SetBits {
    word: u64,
}

impl Iterator for SetBits {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.word == 0 {
            return None;
        }
        let bit = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        Some(bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_first_set_only() {
        let mut bs = BitSet::new(100);
        assert!(bs.is_empty());

        assert!(bs.insert(0));
        assert!(bs.insert(99));
        assert!(!bs.insert(0));

        assert_eq!(bs.count(), 2);
        assert!(bs.contains(99));
        assert!(!bs.contains(98));
    }

    #[test]
    fn test_out_of_range_contains() {
        let bs = BitSet::new(10);
        assert!(!bs.contains(10));
        assert!(!bs.contains(1_000));
    }

    #[test]
    fn test_iter_crosses_words() {
        let mut bs = BitSet::new(200);
        for idx in [3, 63, 64, 130, 199] {
            bs.insert(idx);
        }
        let collected: Vec<usize> = bs.iter().collect();
        assert_eq!(collected, vec![3, 63, 64, 130, 199]);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_insert_out_of_bounds() {
        let mut bs = BitSet::new(8);
        bs.insert(8);
    }

    #[test]
    fn test_zero_capacity() {
        let bs = BitSet::new(0);
        assert_eq!(bs.len(), 0);
        assert_eq!(bs.iter().count(), 0);
    }
}
