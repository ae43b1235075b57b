//! Shared identifier -> value table with prefix-scoped allocation.
//!
//! Identifiers are `prefix + counter`, counting from 1 per prefix. Within a
//! prefix a value is bound at most once; seeing it again returns the
//! identifier it already has. The counter bump and the insert happen under
//! one write lock. Nothing orders a binder's insert against a replacer's
//! lookup: a reader sees whatever has been bound when it looks.

use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct PrefixScope {
    counter: u64,
    ids_by_value: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Bindings {
    values: HashMap<String, String>,
    scopes: HashMap<String, PrefixScope>,
}

/// Concurrency-safe binding table shared by binder and replacer stages
#[derive(Debug, Default)]
pub struct BindingTable {
    inner: RwLock<Bindings>,
}

impl BindingTable {
    /// Create an empty binding table
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the identifier bound to `value` under `prefix`, allocating
    /// the next unused one if the value is new to that prefix.
    ///
    /// A counter value whose identifier is already bound to a different
    /// value (e.g. pre-seeded with [`insert_if_absent`](Self::insert_if_absent))
    /// is skipped.
    pub fn allocate_or_get(&self, prefix: &str, value: &str) -> String {
        let mut guard = self.inner.write();
        let Bindings { values, scopes } = &mut *guard;
        let scope = scopes.entry(prefix.to_string()).or_default();

        if let Some(id) = scope.ids_by_value.get(value) {
            return id.clone();
        }

        loop {
            scope.counter += 1;
            let id = format!("{prefix}{}", scope.counter);
            match values.get(&id) {
                Some(existing) if existing != value => continue,
                Some(_) => {}
                None => {
                    values.insert(id.clone(), value.to_string());
                }
            }
            scope.ids_by_value.insert(value.to_string(), id.clone());
            return id;
        }
    }

    /// Point-in-time read; never waits for a pending write
    pub fn lookup(&self, id: &str) -> Option<String> {
        self.inner.read().values.get(id).cloned()
    }

    /// Alias for [`BindingTable::lookup`]
    pub fn get(&self, id: &str) -> Option<String> {
        self.lookup(id)
    }

    /// Bind `id` unless it is already bound. Returns whether it was inserted.
    pub fn insert_if_absent(&self, id: impl Into<String>, value: impl Into<String>) -> bool {
        let mut guard = self.inner.write();
        let id = id.into();
        if guard.values.contains_key(&id) {
            return false;
        }
        guard.values.insert(id, value.into());
        true
    }

    /// Currently bound identifiers, in no particular order
    pub fn snapshot_ids(&self) -> Vec<String> {
        self.inner.read().values.keys().cloned().collect()
    }

    /// All bindings sorted by identifier
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .inner
            .read()
            .values
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Number of bound identifiers
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
