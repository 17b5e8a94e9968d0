//! Modal guard.
//!
//! Calling into the bridge while a modal dialog runs its nested event loop
//! crashes 3ds Max, so menu callbacks are gated on a shared "menu enabled"
//! flag. The flag is cleared for as long as any modal dialog is open and is
//! mirrored into the host as the MaxScript global `sgtk_main_menu_enabled`,
//! which the generated macroScripts test before calling back into us.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

type Observer = Box<dyn Fn(bool) + Send + Sync>;

/// Shared enabled/disabled flag. Enabled while no modal scope is active.
#[derive(Default)]
pub struct ModalGuard {
    depth: AtomicUsize,
    observer: Mutex<Option<Observer>>,
}

impl ModalGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a callback fired on every Enabled/Disabled transition.
    pub fn set_observer<F>(&self, observer: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        *self.observer.lock() = Some(Box::new(observer));
    }

    pub fn clear_observer(&self) {
        *self.observer.lock() = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.depth.load(Ordering::SeqCst) == 0
    }

    /// Enters a modal section. Nested calls keep the guard disabled until
    /// the matching number of [`enable`](Self::enable) calls.
    pub fn disable(&self) {
        if self.depth.fetch_add(1, Ordering::SeqCst) == 0 {
            self.notify(false);
        }
    }

    /// Leaves a modal section. Extra calls while already enabled are ignored.
    pub fn enable(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
        if previous == Ok(1) {
            self.notify(true);
        }
    }

    /// Disables the guard until the returned scope is dropped.
    pub fn scope(&self) -> ModalScope<'_> {
        self.disable();
        ModalScope { guard: self }
    }

    /// Runs `f` with the guard disabled. The guard is re-enabled on every
    /// exit path, including an `Err` return or a panic inside `f`.
    pub fn run_modal<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _scope = self.scope();
        f()
    }

    fn notify(&self, enabled: bool) {
        if let Some(observer) = self.observer.lock().as_ref() {
            observer(enabled);
        }
    }
}

/// Re-enables its [`ModalGuard`] when dropped.
#[must_use = "the guard is re-enabled as soon as the scope is dropped"]
pub struct ModalScope<'a> {
    guard: &'a ModalGuard,
}

impl Drop for ModalScope<'_> {
    fn drop(&mut self) {
        self.guard.enable();
    }
}
