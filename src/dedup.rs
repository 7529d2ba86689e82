//! Content-addressed shader deduplication.
//!
//! Pipelines that differ only in fixed-function state routinely share
//! shaders. The archiver keeps one [`ShaderDedupTable`] per backend so each
//! distinct serialized shader record is stored exactly once per backend;
//! pipelines reference shaders by the stable index this table assigns.
//!
//! Keys are hashed with XxHash64 and compared by the full record bytes, so
//! two shaders collide only when stage, entry point, source language,
//! compiler and every bytecode byte agree.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use twox_hash::XxHash64;

type ShaderKey = Arc<[u8]>;

/// Insertion-ordered shader store with value-based deduplication.
///
/// Lives for one archiving session; there is no eviction.
#[derive(Debug, Default)]
pub struct ShaderDedupTable {
    list: Vec<ShaderKey>,
    index: HashMap<ShaderKey, u32, BuildHasherDefault<XxHash64>>,
}

impl ShaderDedupTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `record`, appending it if no identical record
    /// was inserted before.
    pub fn add_or_find(&mut self, record: Vec<u8>) -> u32 {
        let key: ShaderKey = record.into();
        if let Some(&index) = self.index.get(&key) {
            return index;
        }
        let index = self.list.len() as u32;
        self.list.push(key.clone());
        self.index.insert(key, index);
        index
    }

    /// Number of distinct shader records stored.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True when no shader has been recorded.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// The stored records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.list.iter().map(|r| r.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_records_share_an_index() {
        let mut table = ShaderDedupTable::new();
        let a = table.add_or_find(vec![1, 2, 3]);
        let b = table.add_or_find(vec![9, 9]);
        let a_again = table.add_or_find(vec![1, 2, 3]);
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn one_differing_byte_is_a_new_record() {
        let mut table = ShaderDedupTable::new();
        let a = table.add_or_find(vec![0; 64]);
        let mut other = vec![0; 64];
        other[63] = 1;
        let b = table.add_or_find(other);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn indices_follow_insertion_order() {
        let mut table = ShaderDedupTable::new();
        for i in 0..5u8 {
            assert_eq!(table.add_or_find(vec![i]), u32::from(i));
        }
        let collected: Vec<_> = table.records().map(|r| r[0]).collect();
        assert_eq!(collected, [0, 1, 2, 3, 4]);
    }
}
