use serde_json::Value;
use std::collections::BTreeMap;

/// In-memory buffer of mapped pairs awaiting a spill.
///
/// Values are grouped per key in the order they were pushed. Keys iterate in
/// ascending byte order, which is the order spill files are written in.
#[derive(Debug)]
pub struct Batch {
    map: BTreeMap<String, Vec<Value>>,
    value_count: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            value_count: 0,
        }
    }

    /// Appends `value` to the group for `key`, creating the group if absent.
    /// Returns the total number of buffered values afterwards.
    pub fn push(&mut self, key: String, value: Value) -> usize {
        self.map.entry(key).or_default().push(value);
        self.value_count += 1;
        self.value_count
    }

    /// Value group for `key`, if any values were pushed for it.
    pub fn get(&self, key: &str) -> Option<&[Value]> {
        self.map.get(key).map(|v| v.as_slice())
    }

    /// Ordered iterator over `(key, values)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Total number of buffered values across all keys.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.value_count = 0;
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}
