use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

/// Maximum number of bindings before heap allocation.
/// Most rules bind ≤4 variables (e.g. `$Action//$ID/$OtherID`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated binding storage.
///
/// Names come from parsed rules and are shared as `Arc<str>`; a `None` value
/// records a variable the rule declared but the path did not populate.
pub type ParamVec = SmallVec<[(Arc<str>, Option<String>); MAX_INLINE_PARAMS]>;

/// Ordered variable bindings produced by matching a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    entries: ParamVec,
}

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `name`, if the variable was populated.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Whether `name` is present at all, populated or not.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.as_ref() == name)
    }

    /// Insert or overwrite a binding, keeping first-insertion order.
    pub fn set(&mut self, name: impl Into<Arc<str>>, value: Option<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Merge `other` into `self` without ever replacing a populated value
    /// with an empty one.
    pub fn merge(&mut self, other: &Bindings) {
        for (name, value) in &other.entries {
            let populated = value.as_deref().is_some_and(|v| !v.is_empty());
            if populated || !self.contains(name) {
                self.set(Arc::clone(name), value.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_deref()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Populated bindings as an owned map.
    /// Note: This allocates - use [`Bindings::get`] in dispatch paths
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Bindings
where
    K: Into<Arc<str>>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bindings = Bindings::new();
        for (k, v) in iter {
            bindings.set(k, Some(v.into()));
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_populated_values() {
        let mut all: Bindings = [("Action", "show"), ("ID", "42")].into_iter().collect();
        let mut latest = Bindings::new();
        latest.set("ID", None);
        latest.set("Action", Some(String::new()));
        latest.set("OtherID", None);
        all.merge(&latest);

        assert_eq!(all.get("Action"), Some("show"));
        assert_eq!(all.get("ID"), Some("42"));
        assert!(all.contains("OtherID"));
        assert_eq!(all.get("OtherID"), None);
    }

    #[test]
    fn merge_overwrites_with_populated_values() {
        let mut all: Bindings = [("ID", "1")].into_iter().collect();
        let latest: Bindings = [("ID", "2")].into_iter().collect();
        all.merge(&latest);
        assert_eq!(all.get("ID"), Some("2"));
    }

    #[test]
    fn set_preserves_insertion_order() {
        let mut b = Bindings::new();
        b.set("B", Some("1".into()));
        b.set("A", Some("2".into()));
        b.set("B", Some("3".into()));
        let names: Vec<&str> = b.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(b.get("B"), Some("3"));
    }
}
