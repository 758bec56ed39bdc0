use std::fmt;
use std::ops::Range;

/// Set of covered source positions, one bit per position.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Coverage {
    words: Box<[u64]>,
    len: usize,
}

impl Coverage {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(64)].into_boxed_slice(),
            len,
        }
    }

    /// Sentence length, not the number of covered positions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_covered(&self, pos: usize) -> bool {
        pos < self.len && self.words[pos / 64] & (1 << (pos % 64)) != 0
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_full(&self) -> bool {
        self.count() == self.len
    }

    /// True if no position in `range` is covered yet.
    pub fn is_free(&self, range: Range<usize>) -> bool {
        range.end <= self.len && range.into_iter().all(|p| !self.is_covered(p))
    }

    /// Copy with `range` marked covered.
    pub fn with(&self, range: Range<usize>) -> Self {
        let mut next = self.clone();
        for p in range {
            next.words[p / 64] |= 1 << (p % 64);
        }
        next
    }

    /// Uncovered positions in increasing order.
    pub fn uncovered(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&p| !self.is_covered(p))
    }

    pub fn is_subset(&self, other: &Coverage) -> bool {
        self.len == other.len && self.words.iter().zip(other.words.iter()).all(|(a, b)| a & !b == 0)
    }
}

/// `x` for covered positions, `.` for free ones.
impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in 0..self.len {
            f.write_str(if self.is_covered(p) { "x" } else { "." })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coverage({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_and_query() {
        let c = Coverage::new(5).with(1..3);
        assert!(!c.is_covered(0));
        assert!(c.is_covered(1) && c.is_covered(2));
        assert_eq!(c.count(), 2);
        assert!(c.is_free(3..5));
        assert!(!c.is_free(2..4));
        assert!(!c.is_free(4..6));
        assert_eq!(c.uncovered().collect::<Vec<_>>(), vec![0, 3, 4]);
        assert_eq!(c.to_string(), ".xx..");
    }

    #[test]
    fn spans_word_boundary() {
        let c = Coverage::new(130).with(60..70).with(128..130);
        assert_eq!(c.count(), 12);
        assert!(c.is_covered(64));
        assert!(!c.is_covered(127));
        assert!(Coverage::new(130).with(60..70).is_subset(&c));
        assert!(!c.is_subset(&Coverage::new(130).with(60..70)));
    }

    #[test]
    fn full() {
        let c = Coverage::new(3).with(0..1).with(1..3);
        assert!(c.is_full());
        assert_eq!(c.uncovered().count(), 0);
        assert!(Coverage::new(0).is_full());
    }
}
