//! # Opaque per-event property bag.
//!
//! Producers and listeners can attach arbitrary typed values to an event
//! under string keys. Values are stored type-erased and read back with a
//! typed lookup; a lookup with the wrong type yields `None`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

type Value = Arc<dyn Any + Send + Sync>;

/// Mutable, thread-safe key/value bag attached to an [`Event`](crate::Event).
#[derive(Default)]
pub struct Properties {
    inner: RwLock<HashMap<Arc<str>, Value>>,
}

impl Properties {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning true if a previous value was replaced.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<Arc<str>>, value: T) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value))
            .is_some()
    }

    /// Returns the value under `key` if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        value.downcast::<T>().ok()
    }

    /// Removes `key`; returns true if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// True if `key` is present (whatever its type).
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Sorted list of keys.
    pub fn keys(&self) -> Vec<Arc<str>> {
        let mut keys: Vec<Arc<str>> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Properties")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_roundtrip_and_wrong_type() {
        let props = Properties::new();
        assert!(!props.set("attempt", 3u32));
        assert_eq!(props.get::<u32>("attempt").as_deref(), Some(&3));
        assert!(props.get::<String>("attempt").is_none());
        assert!(props.get::<u32>("missing").is_none());
    }

    #[test]
    fn test_replace_and_remove() {
        let props = Properties::new();
        props.set("user", String::from("ann"));
        assert!(props.set("user", String::from("bob")));
        assert_eq!(props.get::<String>("user").as_deref().map(String::as_str), Some("bob"));
        assert!(props.remove("user"));
        assert!(!props.remove("user"));
        assert!(!props.contains("user"));
    }
}
