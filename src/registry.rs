//! Action registry.
//!
//! MaxScript cannot hold references to Rust closures, so every menu action is
//! stored here under its [`ActionId`] and the generated macroScript only
//! carries the id. When the user clicks the item the host shim hands the id
//! back through [`crate::ffi`] and the engine resolves it here.
//!
//! # Generations
//!
//! Each menu build opens a new generation. Opening one drops every entry left
//! over from older builds, so the registry only ever holds the actions of the
//! menu the user can currently see (plus persistent entries such as the
//! menu-reload hook). A click on a stale item therefore reports a miss
//! instead of running a callback bound to a discarded menu.

use crate::allocator::ActionId;
use crate::command::Callback;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What an action id resolves to.
#[derive(Clone)]
pub struct ActionTarget {
    /// The label the action was created with. Used in log messages.
    pub display_name: String,
    pub callback: Callback,
}

impl ActionTarget {
    pub fn new<F>(display_name: impl Into<String>, callback: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            display_name: display_name.into(),
            callback: Arc::new(callback),
        }
    }

    pub fn from_callback(display_name: impl Into<String>, callback: Callback) -> Self {
        Self {
            display_name: display_name.into(),
            callback,
        }
    }

    pub fn invoke(&self) -> anyhow::Result<()> {
        (self.callback)()
    }
}

impl fmt::Debug for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTarget")
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

struct Entry {
    target: ActionTarget,
    /// `None` for persistent entries.
    generation: Option<u64>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ActionId, Entry>,
    generation: u64,
}

/// Process-wide map from action id to callable. Owned by the engine.
#[derive(Default)]
pub struct ActionRegistry {
    inner: Mutex<Inner>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation and prunes the entries of all older ones.
    /// Returns the new generation number.
    pub fn begin_generation(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let current = inner.generation;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| entry.generation.map_or(true, |g| g == current));
        let pruned = before - inner.entries.len();
        if pruned > 0 {
            log::debug!("Pruned {} menu action(s) from previous menu builds", pruned);
        }
        current
    }

    /// Registers `target` under `id` in the current generation. Registering
    /// an id again overwrites the previous target.
    pub fn register(&self, id: ActionId, target: ActionTarget) {
        let mut inner = self.inner.lock();
        let generation = Some(inner.generation);
        inner.entries.insert(id, Entry { target, generation });
    }

    /// Registers an entry that survives generation changes.
    pub fn register_persistent(&self, id: ActionId, target: ActionTarget) {
        self.inner.lock().entries.insert(
            id,
            Entry {
                target,
                generation: None,
            },
        );
    }

    /// Looks an id up. The target is cloned out so no lock is held while the
    /// caller runs it.
    pub fn resolve(&self, id: &str) -> Option<ActionTarget> {
        self.inner
            .lock()
            .entries
            .get(id)
            .map(|entry| entry.target.clone())
    }

    pub fn contains(&self, id: &ActionId) -> bool {
        self.inner.lock().entries.contains_key(id)
    }

    /// True if `id` is taken by a persistent entry or one of the current
    /// generation.
    pub fn contains_live(&self, id: &ActionId) -> bool {
        let inner = self.inner.lock();
        let current = inner.generation;
        inner
            .entries
            .get(id)
            .map_or(false, |entry| entry.generation.map_or(true, |g| g == current))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry, persistent ones included. Called at engine shutdown.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(raw: &str) -> ActionId {
        ActionId::parse(raw).unwrap()
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ActionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        registry.register(
            id("sg_one"),
            ActionTarget::new("One", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let target = registry.resolve("sg_one").expect("registered");
        assert_eq!(target.display_name, "One");
        target.invoke().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.resolve("sg_two").is_none());
    }

    #[test]
    fn test_register_same_id_overwrites() {
        let registry = ActionRegistry::new();
        registry.register(id("sg_a"), ActionTarget::new("First", || Ok(())));
        registry.register(id("sg_a"), ActionTarget::new("Second", || Ok(())));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("sg_a").unwrap().display_name, "Second");
    }

    #[test]
    fn test_new_generation_prunes_old_entries() {
        let registry = ActionRegistry::new();
        registry.begin_generation();
        registry.register(id("sg_old"), ActionTarget::new("Old", || Ok(())));
        registry.register_persistent(id("sg_keep"), ActionTarget::new("Keep", || Ok(())));

        registry.begin_generation();
        registry.register(id("sg_new"), ActionTarget::new("New", || Ok(())));

        assert!(registry.resolve("sg_old").is_none());
        assert!(registry.resolve("sg_keep").is_some());
        assert!(registry.resolve("sg_new").is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_many_rebuilds_stay_bounded() {
        let registry = ActionRegistry::new();
        for build in 0..50 {
            registry.begin_generation();
            registry.register(
                id(&format!("sg_action_{}", build)),
                ActionTarget::new("Action", || Ok(())),
            );
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_drops_persistent_entries() {
        let registry = ActionRegistry::new();
        registry.register_persistent(id("sg_keep"), ActionTarget::new("Keep", || Ok(())));
        registry.clear();
        assert!(registry.is_empty());
    }
}
