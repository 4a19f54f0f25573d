use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::view::ViewId;

/// Host-side handler for a script-to-host call. Receives the single string
/// argument passed from the page.
pub type ScriptCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registry of host callbacks reachable from page scripts, keyed by
/// `(view, name)`. Registration is the capability: dispatch looks the pair
/// up at call time, so a callback removed here is unreachable immediately
/// even if the page still holds a proxy function for it.
pub struct CallbackRegistry {
    inner: Mutex<HashMap<(ViewId, String), ScriptCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or replace) the handler for `(view, name)`.
    pub fn register(&self, view: ViewId, name: &str, callback: ScriptCallback) {
        self.inner
            .lock()
            .unwrap()
            .insert((view, name.to_string()), callback);
    }

    /// Names currently registered for a view, for proxy re-binding after a
    /// page load.
    pub fn names_for(&self, view: ViewId) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .keys()
            .filter(|(id, _)| *id == view)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Drop every callback registered for a view. Returns how many were
    /// removed.
    pub fn remove_view(&self, view: ViewId) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.len();
        inner.retain(|(id, _), _| *id != view);
        before - inner.len()
    }

    /// Invoke the handler for `(view, name)` with `argument`. Unknown pairs
    /// and panicking handlers both come back as `Err`; a fault in one
    /// handler never propagates past this call.
    pub fn dispatch(&self, view: ViewId, name: &str, argument: &str) -> Result<(), String> {
        let callback = self
            .inner
            .lock()
            .unwrap()
            .get(&(view, name.to_string()))
            .cloned();

        let Some(callback) = callback else {
            return Err(format!("no listener '{name}' registered for view {view}"));
        };

        catch_unwind(AssertUnwindSafe(|| callback(argument)))
            .map_err(|_| format!("listener '{name}' for view {view} panicked"))
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_reaches_the_latest_registration() {
        let registry = CallbackRegistry::new();
        let view = ViewId(1);
        let hits = Arc::new(AtomicUsize::new(0));

        let first = hits.clone();
        registry.register(view, "onSelect", Arc::new(move |_| {
            first.fetch_add(1, Ordering::SeqCst);
        }));

        let second = hits.clone();
        registry.register(view, "onSelect", Arc::new(move |_| {
            second.fetch_add(10, Ordering::SeqCst);
        }));

        registry.dispatch(view, "onSelect", "{}").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn removed_views_are_unreachable() {
        let registry = CallbackRegistry::new();
        let view = ViewId(2);
        registry.register(view, "a", Arc::new(|_| {}));
        registry.register(view, "b", Arc::new(|_| {}));
        registry.register(ViewId(3), "a", Arc::new(|_| {}));

        assert_eq!(registry.remove_view(view), 2);
        assert!(registry.dispatch(view, "a", "").is_err());
        assert!(registry.dispatch(ViewId(3), "a", "").is_ok());
    }

    #[test]
    fn panicking_callback_becomes_an_error() {
        let registry = CallbackRegistry::new();
        let view = ViewId(4);
        registry.register(view, "boom", Arc::new(|_| panic!("handler died")));

        let err = registry.dispatch(view, "boom", "").unwrap_err();
        assert!(err.contains("panicked"));

        // The registry stays usable afterwards.
        registry.register(view, "ok", Arc::new(|_| {}));
        assert!(registry.dispatch(view, "ok", "").is_ok());
    }

    #[test]
    fn names_for_lists_only_that_view() {
        let registry = CallbackRegistry::new();
        registry.register(ViewId(5), "x", Arc::new(|_| {}));
        registry.register(ViewId(5), "y", Arc::new(|_| {}));
        registry.register(ViewId(6), "z", Arc::new(|_| {}));

        let mut names = registry.names_for(ViewId(5));
        names.sort();
        assert_eq!(names, vec!["x", "y"]);
    }
}
