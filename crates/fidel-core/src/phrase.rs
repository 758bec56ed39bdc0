//! Word ids, output tokens and views over runs of ids.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Dense integer id of a word within one `Vocabulary`. Never 0.
pub type WordId = u32;

/// A token emitted into the translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    /// A target-vocabulary word.
    Target(WordId),
    /// An untranslated source word copied through verbatim
    /// (id in the source vocabulary).
    PassThrough(WordId),
}

impl Token {
    /// Signed encoding: target ids positive, pass-through ids negated.
    /// Defines the lexicographic tie-break order between outputs.
    pub fn signed(self) -> i64 {
        match self {
            Token::Target(id) => id as i64,
            Token::PassThrough(id) => -(id as i64),
        }
    }

    pub fn is_pass_through(self) -> bool {
        matches!(self, Token::PassThrough(_))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.signed()
            .cmp(&other.signed())
            .then_with(|| other.is_pass_through().cmp(&self.is_pass_through()))
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A contiguous run of ids inside a backing sentence.
///
/// Equality and hashing look at the covered ids only, so two spans at
/// different offsets (or over different sentences) with the same words
/// are interchangeable as lookup keys.
#[derive(Clone, Copy)]
pub struct Span<'a> {
    backing: &'a [WordId],
    start: usize,
    len: usize,
}

impl<'a> Span<'a> {
    /// Panics if `range` is out of bounds for `backing`.
    pub fn new(backing: &'a [WordId], range: Range<usize>) -> Self {
        assert!(
            range.start <= range.end && range.end <= backing.len(),
            "span {range:?} out of bounds for length {}",
            backing.len()
        );
        Self {
            backing,
            start: range.start,
            len: range.end - range.start,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ids(&self) -> &'a [WordId] {
        &self.backing[self.start..self.start + self.len]
    }
}

impl PartialEq for Span<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ids() == other.ids()
    }
}

impl Eq for Span<'_> {}

impl Hash for Span<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ids().hash(state);
    }
}

impl fmt::Debug for Span<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span[{}..{}]{:?}", self.start, self.end(), self.ids())
    }
}

/// An owned run of ids, used as a map key.
///
/// `Borrow<[WordId]>` lets maps keyed by `Phrase` be queried with a
/// `Span`'s ids without allocating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Phrase(Box<[WordId]>);

impl Phrase {
    pub fn new(ids: impl Into<Box<[WordId]>>) -> Self {
        Self(ids.into())
    }

    pub fn ids(&self) -> &[WordId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[WordId]> for Phrase {
    fn borrow(&self) -> &[WordId] {
        &self.0
    }
}

impl From<Span<'_>> for Phrase {
    fn from(span: Span<'_>) -> Self {
        Self(span.ids().into())
    }
}

impl From<Vec<WordId>> for Phrase {
    fn from(ids: Vec<WordId>) -> Self {
        Self(ids.into_boxed_slice())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn span_equality_is_by_content() {
        let sentence = [5, 6, 5, 6];
        let a = Span::new(&sentence, 0..2);
        let b = Span::new(&sentence, 2..4);
        assert_eq!(a, b);
        assert_ne!(a, Span::new(&sentence, 1..3));
        assert_eq!(a.start(), 0);
        assert_eq!(b.start(), 2);
        assert_eq!(b.end(), 4);
    }

    #[test]
    fn phrase_map_lookup_by_span() {
        let mut map: HashMap<Phrase, &str> = HashMap::new();
        map.insert(Phrase::from(vec![1, 2]), "x");
        let other_sentence = [9, 1, 2];
        let span = Span::new(&other_sentence, 1..3);
        assert_eq!(map.get(span.ids()), Some(&"x"));
        assert_eq!(map.get(Span::new(&other_sentence, 0..2).ids()), None);
    }

    #[test]
    fn token_order_puts_pass_through_first() {
        let mut tokens = vec![Token::Target(2), Token::PassThrough(1), Token::Target(1)];
        tokens.sort();
        assert_eq!(
            tokens,
            vec![Token::PassThrough(1), Token::Target(1), Token::Target(2)]
        );
        assert!(Token::PassThrough(3) < Token::PassThrough(1));
    }

    #[test]
    #[should_panic]
    fn span_out_of_bounds() {
        let sentence = [1, 2];
        let _ = Span::new(&sentence, 1..3);
    }
}
