use std::borrow::Borrow;
use std::hash::Hash;

pub use indexmap::{IndexMap as IndexedMap, IndexSet as IndexedSet};

pub type IntMap<V> = IndexedMap<i32, V>;
pub type IntSet = IndexedSet<i32>;

pub trait MapDefaultExt<K, V> {
    fn get_with_default<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;

    /// Stores `value` under `key`, or drops the entry when `value` equals
    /// `default`. Returns the previous value, `default` if there was none.
    fn put_with_default(&mut self, key: K, value: V, default: V) -> V;
}

impl<K, V> MapDefaultExt<K, V> for IndexedMap<K, V>
where
    K: Hash + Eq,
    V: Copy + PartialEq,
{
    fn get_with_default<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).copied().unwrap_or(default)
    }

    fn put_with_default(&mut self, key: K, value: V, default: V) -> V {
        let old = if value == default {
            self.shift_remove(&key)
        } else {
            self.insert(key, value)
        };
        old.unwrap_or(default)
    }
}

pub trait OptionMapDefaultExt<K, V> {
    fn get_with_default<Q>(self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;
}

impl<K, V> OptionMapDefaultExt<K, V> for Option<&IndexedMap<K, V>>
where
    K: Hash + Eq,
    V: Copy + PartialEq,
{
    fn get_with_default<Q>(self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map_or(default, |map| map.get_with_default(key, default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_with_default_returns_explicit_value() {
        let mut map = IndexedMap::new();
        map.insert("CAMERA".to_string(), 1);

        assert_eq!(map.get_with_default("CAMERA", 3), 1);
    }

    #[test]
    fn get_with_default_falls_back_when_absent() {
        let map: IndexedMap<String, i32> = IndexedMap::new();

        assert_eq!(map.get_with_default("CAMERA", 3), 3);
    }

    #[test]
    fn absent_nested_map_reads_as_default() {
        let outer: IndexedMap<String, IndexedMap<String, i32>> = IndexedMap::new();

        assert_eq!(outer.get("com.example").get_with_default("CAMERA", 0), 0);
    }

    #[test]
    fn put_with_default_stores_non_default_value() {
        let mut map = IndexedMap::new();

        let old = map.put_with_default("CAMERA".to_string(), 1, 0);

        assert_eq!(old, 0);
        assert_eq!(map.get("CAMERA"), Some(&1));
    }

    #[test]
    fn put_with_default_removes_entry_for_default_value() {
        let mut map = IndexedMap::new();
        map.insert("CAMERA".to_string(), 1);

        let old = map.put_with_default("CAMERA".to_string(), 0, 0);

        assert_eq!(old, 1);
        assert!(map.is_empty());
    }

    #[test]
    fn put_with_default_keeps_insertion_order_of_survivors() {
        let mut map = IndexedMap::new();
        map.insert("a".to_string(), 1);
        map.insert("b".to_string(), 1);
        map.insert("c".to_string(), 1);

        map.put_with_default("a".to_string(), 0, 0);

        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
    }
}
