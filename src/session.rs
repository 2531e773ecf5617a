//! Session contract.
//!
//! Session storage is owned by the host; the routing core only attaches a
//! session to the request, lets [`SessionMiddleware`](crate::middleware::SessionMiddleware)
//! start and persist it, and hands it to actions as opaque key/value access.

use std::collections::HashMap;
use std::fmt::Debug;

/// Opaque per-visitor key/value store.
pub trait Session: Debug {
    /// Start the session for this request (load persisted state, etc.)
    fn init(&mut self);

    /// Persist any changes made during the request
    fn save(&mut self);

    fn get(&self, key: &str) -> Option<&str>;

    fn set(&mut self, key: &str, value: String);

    fn clear(&mut self, key: &str);

    fn is_started(&self) -> bool;
}

/// In-memory session used when the host supplies none.
#[derive(Debug, Default, Clone)]
pub struct MemorySession {
    data: HashMap<String, String>,
    started: bool,
    changed: bool,
    saves: usize,
}

impl MemorySession {
    /// Number of times changes were persisted
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl Session for MemorySession {
    fn init(&mut self) {
        self.started = true;
    }

    fn save(&mut self) {
        if self.changed {
            self.saves += 1;
            self.changed = false;
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    fn set(&mut self, key: &str, value: String) {
        self.data.insert(key.to_string(), value);
        self.changed = true;
    }

    fn clear(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            self.changed = true;
        }
    }

    fn is_started(&self) -> bool {
        self.started
    }
}
