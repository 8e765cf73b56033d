use std::marker::PhantomData;
use std::ops::Index;
use std::ops::IndexMut;

/// An arena which hands out typed handles instead of raw indices.
///
/// The log-potentials of a [`FactorGraph`](crate::FactorGraph) are keyed by
/// [`BinaryVariable`](crate::BinaryVariable) and its factors by [`FactorId`](crate::FactorId);
/// a handle of one arena cannot be used to index the other.
#[derive(Debug)]
pub struct KeyedVec<Key, Value> {
    values: Vec<Value>,
    key: PhantomData<Key>,
}

impl<Key, Value: Clone> Clone for KeyedVec<Key, Value> {
    fn clone(&self) -> Self {
        KeyedVec {
            values: self.values.clone(),
            key: PhantomData,
        }
    }
}

impl<Key, Value> Default for KeyedVec<Key, Value> {
    fn default() -> Self {
        KeyedVec {
            values: Vec::new(),
            key: PhantomData,
        }
    }
}

impl<Key: StorageKey, Value> KeyedVec<Key, Value> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stores `value` and returns its handle.
    pub fn push(&mut self, value: Value) -> Key {
        let key = self.next_key();
        self.values.push(value);
        key
    }

    /// The handle which the next call to [`KeyedVec::push`] returns.
    pub fn next_key(&self) -> Key {
        Key::create_from_index(self.values.len())
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        key.index() < self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'_ Value> {
        self.values.iter()
    }

    /// The values in the order in which they were pushed; position `i` belongs to the key with
    /// index `i`.
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [Value] {
        &mut self.values
    }
}

impl<Key: StorageKey, Value> Index<Key> for KeyedVec<Key, Value> {
    type Output = Value;

    fn index(&self, key: Key) -> &Value {
        &self.values[key.index()]
    }
}

impl<Key: StorageKey, Value> IndexMut<Key> for KeyedVec<Key, Value> {
    fn index_mut(&mut self, key: Key) -> &mut Value {
        &mut self.values[key.index()]
    }
}

/// A handle which is a thin wrapper around a position in a [`KeyedVec`].
pub trait StorageKey: Clone {
    fn index(&self) -> usize;

    fn create_from_index(index: usize) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Handle(usize);

    impl StorageKey for Handle {
        fn index(&self) -> usize {
            self.0
        }

        fn create_from_index(index: usize) -> Self {
            Handle(index)
        }
    }

    #[test]
    fn pushed_values_are_retrieved_by_their_handle() {
        let mut arena: KeyedVec<Handle, &str> = KeyedVec::default();

        assert_eq!(arena.next_key(), Handle(0));
        let first = arena.push("first");
        let second = arena.push("second");

        assert_eq!(arena[first], "first");
        assert_eq!(arena[second], "second");
        assert!(arena.contains_key(&second));
        assert!(!arena.contains_key(&Handle(2)));
        assert_eq!(arena.as_slice(), &["first", "second"]);
    }

    #[test]
    fn values_can_be_updated_in_place() {
        let mut arena: KeyedVec<Handle, f64> = KeyedVec::default();
        let handle = arena.push(1.0);

        arena[handle] += 0.5;
        arena.as_mut_slice()[0] *= 2.0;

        assert_eq!(arena[handle], 3.0);
        assert_eq!(arena.len(), 1);
        assert!(!arena.is_empty());
    }
}
