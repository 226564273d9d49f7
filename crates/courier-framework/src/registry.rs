//! Concurrency-safe ordered registries.
//!
//! A [`Registry`] keeps entries in insertion order behind a single lock.
//! Mutations are linearized by that lock; readers take a snapshot of
//! `Arc`ed entries and work on it unlocked, so a dispatch in flight is never
//! affected by concurrent registration.

use std::fmt;
use std::sync::Arc;

use courier_core::{RegistryError, RegistryResult, Script, ScriptKind, SlashCommand};
use parking_lot::Mutex;
use tracing::debug;

/// An entry that can live in a [`Registry`].
pub trait RegistryEntry: Send + Sync + 'static {
    /// Uniqueness key.
    type Key: PartialEq + fmt::Debug;

    /// Entry kind, used in errors and logs.
    const KIND: &'static str;

    fn key(&self) -> Self::Key;

    /// Human-readable name, used in errors and logs.
    fn label(&self) -> &str;

    /// Validates the entry and fills in defaults.
    fn prepare(&mut self) -> RegistryResult<()>;
}

impl RegistryEntry for Script {
    type Key = (String, String, ScriptKind);
    const KIND: &'static str = "script";

    fn key(&self) -> Self::Key {
        (self.name.clone(), self.matcher.clone(), self.kind)
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self) -> RegistryResult<()> {
        Script::prepare(self)
    }
}

impl RegistryEntry for SlashCommand {
    type Key = (String, String);
    const KIND: &'static str = "slash command";

    fn key(&self) -> Self::Key {
        (self.title.clone(), self.trigger.clone())
    }

    fn label(&self) -> &str {
        &self.title
    }

    fn prepare(&mut self) -> RegistryResult<()> {
        SlashCommand::prepare(self)
    }
}

/// An ordered collection of unique entries.
pub struct Registry<T: RegistryEntry> {
    entries: Mutex<Vec<Arc<T>>>,
}

impl<T: RegistryEntry> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Validates and appends `entry`.
    ///
    /// Fails without side effects if validation fails or an entry with the
    /// same key exists.
    pub fn register(&self, mut entry: T) -> RegistryResult<()> {
        entry.prepare()?;
        let key = entry.key();
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.key() == key) {
            return Err(RegistryError::AlreadyRegistered {
                kind: T::KIND,
                name: entry.label().to_string(),
            });
        }
        debug!(kind = T::KIND, name = %entry.label(), "Registered entry");
        entries.push(Arc::new(entry));
        Ok(())
    }

    /// Registers every entry, stopping at the first failure.
    pub fn register_all(&self, entries: impl IntoIterator<Item = T>) -> RegistryResult<()> {
        entries.into_iter().try_for_each(|entry| self.register(entry))
    }

    /// Removes the entry with `key`. Returns whether one was removed.
    pub fn unregister(&self, key: &T::Key) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| &e.key() != key);
        let removed = entries.len() != before;
        if removed {
            debug!(kind = T::KIND, key = ?key, "Unregistered entry");
        }
        removed
    }

    /// Replaces the entry sharing `entry`'s key, keeping its position.
    /// Returns whether one was replaced.
    pub fn update(&self, mut entry: T) -> RegistryResult<bool> {
        entry.prepare()?;
        let key = entry.key();
        let mut entries = self.entries.lock();
        match entries.iter().position(|e| e.key() == key) {
            Some(index) => {
                entries[index] = Arc::new(entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns every entry in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.lock().clone()
    }

    /// Returns the entries matching `predicate`, in insertion order.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<Arc<T>> {
        self.entries
            .lock()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Returns the first entry matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<Arc<T>> {
        self.entries.lock().iter().find(|e| predicate(e)).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Registry<Script> {
    /// Returns the scripts of `kind`, in insertion order.
    pub fn list_by_kind(&self, kind: ScriptKind) -> Vec<Arc<Script>> {
        self.filter(|s| s.kind == kind)
    }
}

impl Registry<SlashCommand> {
    /// Returns the command with `trigger`.
    pub fn find_by_trigger(&self, trigger: &str) -> Option<Arc<SlashCommand>> {
        self.find(|c| c.trigger == trigger)
    }
}

impl<T: RegistryEntry> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RegistryEntry> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn script(name: &str, matcher: &str, kind: ScriptKind) -> Script {
        Script::new(name, matcher, kind).handler(|_, _| async { Ok(vec!["ok".to_string()]) })
    }

    #[test]
    fn test_duplicate_key_rejected_and_registry_unchanged() {
        let registry = Registry::new();
        assert_ok!(registry.register(script("badger", "(?i)badger", ScriptKind::Send)));

        let err = registry
            .register(script("badger", "(?i)badger", ScriptKind::Send).description("other"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
        assert_eq!(registry.len(), 1);
        assert!(registry.snapshot()[0].description.is_empty());
    }

    #[test]
    fn test_same_name_different_key_allowed() {
        let registry = Registry::new();
        assert_ok!(registry.register(script("badger", "badger", ScriptKind::Send)));
        assert_ok!(registry.register(script("badger", "badger", ScriptKind::Respond)));
        assert_ok!(registry.register(script("badger", "badgers?", ScriptKind::Send)));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_invalid_entry_not_inserted() {
        let registry: Registry<Script> = Registry::new();
        assert_err!(registry.register(Script::new("x", "x", ScriptKind::Send)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_by_kind_preserves_order() {
        let registry = Registry::new();
        registry
            .register_all([
                script("a", "a", ScriptKind::Send),
                script("b", "b", ScriptKind::Respond),
                script("c", "c", ScriptKind::Send),
            ])
            .unwrap();
        let names: Vec<_> = registry
            .list_by_kind(ScriptKind::Send)
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn test_unregister_and_update_noop_when_absent() {
        let registry = Registry::new();
        registry.register(script("a", "a", ScriptKind::Send)).unwrap();

        let missing = ("zzz".to_string(), "a".to_string(), ScriptKind::Send);
        assert!(!registry.unregister(&missing));
        assert!(!registry.update(script("zzz", "a", ScriptKind::Send)).unwrap());
        assert_eq!(registry.len(), 1);

        assert!(registry.update(script("a", "a", ScriptKind::Send).description("new")).unwrap());
        assert_eq!(registry.snapshot()[0].description, "new");

        assert!(registry.unregister(&("a".to_string(), "a".to_string(), ScriptKind::Send)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let registry = Registry::new();
        registry.register(script("a", "a", ScriptKind::Send)).unwrap();
        let snapshot = registry.snapshot();
        registry.register(script("b", "b", ScriptKind::Send)).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_commands_keyed_by_title_and_trigger() {
        let registry = Registry::new();
        let ping = || SlashCommand::new("ping", "ping").handler(|_| async { Ok(String::new()) });
        assert_ok!(registry.register(ping()));
        assert_err!(registry.register(ping()));
        assert!(registry.find_by_trigger("ping").is_some());
        assert!(registry.find_by_trigger("pong").is_none());
    }
}
