//! Sequence Equality Module
//!
//! Structural equality and hashing for ordered sequences, and the key wrapper
//! built on top of them.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Multiplier for the order-sensitive hash fold (64-bit FNV prime).
const HASH_MULTIPLIER: u64 = 0x0000_0100_0000_01b3;

// == Sequence Comparer ==
/// Compares ordered sequences by content.
///
/// A missing sequence (`None`) only equals another missing sequence. Elements
/// are compared in order with `==`, so `Option::None` elements only equal
/// other `None` elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceComparer;

impl SequenceComparer {
    // == Equals ==
    /// Returns true if both sequences are missing, or both are present with
    /// the same length and equal elements in the same order.
    pub fn equals<T: PartialEq>(x: Option<&[T]>, y: Option<&[T]>) -> bool {
        match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => x.len() == y.len() && x.iter().zip(y).all(|(a, b)| a == b),
            _ => false,
        }
    }

    // == Hash Code ==
    /// Combines the element hashes of a sequence.
    ///
    /// Missing and empty sequences hash to 0. The fold is order-sensitive:
    /// `[1, 2]` and `[2, 1]` compare unequal and usually hash apart too.
    pub fn hash_code<T: Hash>(items: Option<&[T]>) -> u64 {
        match items {
            None | Some([]) => 0,
            Some(items) => items.iter().fold(0, |acc, item| {
                (acc.rotate_left(5) ^ element_hash(item)).wrapping_mul(HASH_MULTIPLIER)
            }),
        }
    }
}

fn element_hash<T: Hash>(item: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    item.hash(&mut hasher);
    hasher.finish()
}

// == Sequence Key ==
/// An immutable ordered sequence usable as a map key with content semantics.
///
/// Two keys built from `[1, 2, 3]` land in the same bucket of a
/// [`KeyedCache`](crate::cache::KeyedCache); `[3, 2, 1]` lands in another.
/// Cloning shares the underlying items.
pub struct SequenceKey<T> {
    items: Arc<[T]>,
}

/// Caller-supplied partition of a cache slot.
pub type ContextKey = SequenceKey<String>;

impl<T> SequenceKey<T> {
    /// Wraps the given items.
    pub fn new(items: impl Into<Arc<[T]>>) -> Self {
        Self {
            items: items.into(),
        }
    }

    /// The wrapped items, in order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ContextKey {
    /// The canonical empty context key.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> Clone for SequenceKey<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T: PartialEq> PartialEq for SequenceKey<T> {
    fn eq(&self, other: &Self) -> bool {
        SequenceComparer::equals(Some(self.items()), Some(other.items()))
    }
}

impl<T: Eq> Eq for SequenceKey<T> {}

impl<T: Hash> Hash for SequenceKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(SequenceComparer::hash_code(Some(self.items())));
    }
}

impl<T: fmt::Debug> fmt::Debug for SequenceKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T> AsRef<[T]> for SequenceKey<T> {
    fn as_ref(&self) -> &[T] {
        self.items()
    }
}

// == Conversions ==
impl<T> From<Vec<T>> for SequenceKey<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Clone> From<&[T]> for SequenceKey<T> {
    fn from(items: &[T]) -> Self {
        Self::new(items)
    }
}

impl<T, const N: usize> From<[T; N]> for SequenceKey<T> {
    fn from(items: [T; N]) -> Self {
        Self::new(Vec::from(items))
    }
}

impl<T> From<&SequenceKey<T>> for SequenceKey<T> {
    fn from(key: &SequenceKey<T>) -> Self {
        key.clone()
    }
}

impl<T> FromIterator<T> for SequenceKey<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect::<Vec<_>>())
    }
}

impl From<&[&str]> for ContextKey {
    fn from(items: &[&str]) -> Self {
        items.iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> From<[&str; N]> for ContextKey {
    fn from(items: [&str; N]) -> Self {
        Self::from(&items[..])
    }
}

impl<const N: usize> From<&[&str; N]> for ContextKey {
    fn from(items: &[&str; N]) -> Self {
        Self::from(&items[..])
    }
}

impl From<Vec<&str>> for ContextKey {
    fn from(items: Vec<&str>) -> Self {
        Self::from(items.as_slice())
    }
}

/// A missing context key is the empty context key.
impl<K: Into<ContextKey>> From<Option<K>> for ContextKey {
    fn from(key: Option<K>) -> Self {
        key.map(Into::into).unwrap_or_else(ContextKey::empty)
    }
}

impl From<()> for ContextKey {
    fn from(_: ()) -> Self {
        ContextKey::empty()
    }
}
