//! Word ↔ id mapping for one side of the translation.
//!
//! Uses `RwLock` for interior mutability so that sentences decoded on
//! different threads can register unseen words while others only read.
//! Ids are dense and start at 1; id 0 is never assigned, so it can stand
//! in for "no such word" in language-model queries.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::phrase::WordId;

#[derive(Default)]
struct VocabInner {
    ids: HashMap<String, WordId>,
    /// words[id - 1] is the surface form of `id`.
    words: Vec<String>,
}

#[derive(Default)]
pub struct Vocabulary {
    inner: RwLock<VocabInner>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vocabulary whose ids follow the order of `words`.
    /// Duplicates keep their first id.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vocab = Self::new();
        for w in words {
            vocab.intern(w.as_ref());
        }
        vocab
    }

    pub fn get(&self, word: &str) -> Option<WordId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.ids.get(word).copied()
    }

    pub fn word(&self, id: WordId) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let idx = (id as usize).checked_sub(1)?;
        inner.words.get(idx).cloned()
    }

    /// Return the id of `word`, assigning the next free id if unseen.
    pub fn intern(&self, word: &str) -> WordId {
        if let Some(id) = self.get(word) {
            return id;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have registered it between the two locks.
        if let Some(&id) = inner.ids.get(word) {
            return id;
        }
        inner.words.push(word.to_string());
        let id = inner.words.len() as WordId;
        inner.ids.insert(word.to_string(), id);
        id
    }

    pub fn intern_all<I, S>(&self, words: I) -> Vec<WordId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        words.into_iter().map(|w| self.intern(w.as_ref())).collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All words in id order (index 0 holds id 1).
    pub fn snapshot(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.words.clone()
    }
}

impl std::fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vocabulary")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn ids_start_at_one() {
        let v = Vocabulary::new();
        assert_eq!(v.intern("house"), 1);
        assert_eq!(v.intern("haus"), 2);
        assert_eq!(v.intern("house"), 1);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn bijection() {
        let v = Vocabulary::from_words(["a", "b", "c"]);
        for w in ["a", "b", "c"] {
            let id = v.get(w).unwrap();
            assert_eq!(v.word(id).as_deref(), Some(w));
        }
        assert_eq!(v.word(0), None);
        assert_eq!(v.word(4), None);
        assert_eq!(v.get("d"), None);
    }

    #[test]
    fn from_words_keeps_first_id_for_duplicates() {
        let v = Vocabulary::from_words(["x", "y", "x"]);
        assert_eq!(v.len(), 2);
        assert_eq!(v.snapshot(), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn concurrent_intern_is_consistent() {
        let v = Arc::new(Vocabulary::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let v = Arc::clone(&v);
                thread::spawn(move || {
                    (0..100)
                        .map(|i| v.intern(&format!("w{}", (i + t * 7) % 50)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(v.len(), 50);
        for i in 0..50 {
            let w = format!("w{i}");
            let id = v.get(&w).unwrap();
            assert_eq!(v.word(id), Some(w));
        }
    }
}
