//! Insertion-ordered map with O(1) move-to-tail.
//!
//! A hash index over a slab of doubly-linked nodes. Entries keep insertion
//! order; [`OrderedMap::touch`] moves an entry to the tail in constant time
//! and [`OrderedMap::peek_head`] exposes the least-recently-touched entry.
//! Together these make head-anchored expiry scans cheap: only a prefix of
//! the order can be stale, so an eviction loop stops at the first live head.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A map preserving least-recently-touched to most-recently-touched order.
pub struct OrderedMap<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Eq + Hash + Clone, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.index.contains_key(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_ref().map(|node| &node.value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_mut().map(|node| &mut node.value)
    }

    /// Insert a new entry at the tail, or replace the value of an existing
    /// one and move it to the tail. Returns the previous value, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            self.unlink(slot);
            self.link_tail(slot);
            let node = self.slots[slot]
                .as_mut()
                .unwrap_or_else(|| unreachable!("indexed slot is occupied"));
            return Some(std::mem::replace(&mut node.value, value));
        }

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.link_tail(slot);
        None
    }

    /// Move an existing entry to the tail of the order. Returns a mutable
    /// reference to its value, or `None` if the key is absent.
    pub fn touch<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.unlink(slot);
        self.link_tail(slot);
        self.slots[slot].as_mut().map(|node| &mut node.value)
    }

    /// The least-recently-touched entry.
    pub fn peek_head(&self) -> Option<(&K, &V)> {
        let slot = self.head?;
        self.slots[slot].as_ref().map(|node| (&node.key, &node.value))
    }

    /// Remove and return the least-recently-touched entry.
    pub fn pop_head(&mut self) -> Option<(K, V)> {
        let slot = self.head?;
        self.unlink(slot);
        let node = self.slots[slot].take()?;
        self.index.remove(&node.key);
        self.free.push(slot);
        Some((node.key, node.value))
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        let node = self.slots[slot].take()?;
        self.free.push(slot);
        Some(node.value)
    }

    /// Iterate values in least-recently-touched to most-recently-touched
    /// order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        OrderedIter {
            map: self,
            next: self.head,
        }
        .map(|(_, value)| value)
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        OrderedIter {
            map: self,
            next: self.head,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match &self.slots[slot] {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(prev) => {
                if let Some(node) = self.slots[prev].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Some(node) = self.slots[next].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(node) = self.slots[slot].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn link_tail(&mut self, slot: usize) {
        let old_tail = self.tail;
        if let Some(node) = self.slots[slot].as_mut() {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(tail) => {
                if let Some(node) = self.slots[tail].as_mut() {
                    node.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }
}

impl<K: Eq + Hash + Clone, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

struct OrderedIter<'a, K, V> {
    map: &'a OrderedMap<K, V>,
    next: Option<usize>,
}

impl<'a, K, V> Iterator for OrderedIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.next?;
        let node = self.map.slots[slot].as_ref()?;
        self.next = node.next;
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(map: &OrderedMap<&'static str, u32>) -> Vec<&'static str> {
        map.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        assert_eq!(keys(&map), vec!["a", "b", "c"]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("b"), Some(&2));
    }

    #[test]
    fn test_touch_moves_to_tail() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);

        *map.touch("a").unwrap() += 10;
        assert_eq!(keys(&map), vec!["b", "c", "a"]);
        assert_eq!(map.get("a"), Some(&11));
        assert_eq!(map.peek_head(), Some((&"b", &2)));
    }

    #[test]
    fn test_touch_missing_is_none() {
        let mut map: OrderedMap<&str, u32> = OrderedMap::new();
        assert!(map.touch("a").is_none());
    }

    #[test]
    fn test_insert_existing_replaces_and_moves() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.insert("a", 9), Some(1));
        assert_eq!(keys(&map), vec!["b", "a"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_pop_head() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.pop_head(), Some(("a", 1)));
        assert_eq!(map.pop_head(), Some(("b", 2)));
        assert_eq!(map.pop_head(), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove_middle_relinks() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        assert_eq!(map.remove("b"), Some(2));
        assert_eq!(keys(&map), vec!["a", "c"]);
        assert!(!map.contains_key("b"));
    }

    #[test]
    fn test_slot_reuse_after_removal() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.remove("a");
        map.insert("c", 3);
        map.insert("d", 4);
        assert_eq!(keys(&map), vec!["b", "c", "d"]);
        // One slot was recycled, only one new one allocated.
        assert_eq!(map.slots.len(), 3);
    }
}
