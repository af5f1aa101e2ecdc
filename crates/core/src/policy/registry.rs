use std::collections::{HashMap, HashSet};

use super::ExpireAfter;

/// Per-key TTL directives with change tracking.
///
/// Keys are either canonical URLs or derived cache keys; the registry does
/// not distinguish them. A key joins the changed-set whenever `set` stores a
/// directive different from the previous one (including the first one), and
/// leaves it when a consumer takes or clears the mark.
#[derive(Debug, Default, Clone)]
pub struct ExpirationRegistry {
    directives: HashMap<String, ExpireAfter>,
    changed: HashSet<String>,
}

impl ExpirationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `directive` for `key`, returning whether it differs from the
    /// previously stored directive.
    pub fn set(&mut self, key: impl Into<String>, directive: ExpireAfter) -> bool {
        let key = key.into();
        let changed = self.directives.get(&key) != Some(&directive);
        if changed {
            self.changed.insert(key.clone());
        }
        self.directives.insert(key, directive);
        changed
    }

    pub fn get(&self, key: &str) -> Option<ExpireAfter> {
        self.directives.get(key).copied()
    }

    pub fn get_or(&self, key: &str, fallback: ExpireAfter) -> ExpireAfter {
        self.get(key).unwrap_or(fallback)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.directives.contains_key(key)
    }

    pub fn is_changed(&self, key: &str) -> bool {
        self.changed.contains(key)
    }

    /// Consume the changed mark for `key`. Returns true exactly once per change.
    pub fn take_changed(&mut self, key: &str) -> bool {
        self.changed.remove(key)
    }

    /// Drop the changed mark for `key`, if any.
    pub fn clear_changed(&mut self, key: &str) {
        self.changed.remove(key);
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Number of keys still waiting for their change to be observed.
    pub fn pending_changes(&self) -> usize {
        self.changed.len()
    }
}
