use crate::Value;

/// Opaque keyed store backing one lane's state.
///
/// `iterate` defines the lane's own iteration order, which is also the replay
/// order uplinks use when answering a `Sync`.
pub trait MapStore: Send {
    fn iterate(&self) -> Vec<(String, Value)>;
    fn get(&self, key: &str) -> Option<&Value>;
    fn put(&mut self, key: String, value: Value) -> Option<Value>;
    fn remove(&mut self, key: &str) -> Option<Value>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&mut self);
}

/// Insertion-ordered in-memory store: the default lane state for processes
/// that bring no storage engine of their own.
pub struct MemoryStore {
    entries: Vec<(String, Value)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MapStore for MemoryStore {
    fn iterate(&self) -> Vec<(String, Value)> {
        self.entries.clone()
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(entry_key, _)| entry_key == key)
            .map(|(_, value)| value)
    }

    fn put(&mut self, key: String, value: Value) -> Option<Value> {
        for (entry_key, entry_value) in &mut self.entries {
            if *entry_key == key {
                // Updates keep the entry's original position.
                return Some(std::mem::replace(entry_value, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self
            .entries
            .iter()
            .position(|(entry_key, _)| entry_key == key)?;
        Some(self.entries.remove(index).1)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}
