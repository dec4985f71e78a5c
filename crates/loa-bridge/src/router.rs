//! Publish/subscribe over address patterns.
//!
//! Every subscription whose pattern matches an emitted address fires, in the
//! order subscriptions were created; handlers of one subscription fire in the
//! order they were added.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::error::PatternError;
use crate::lock;
use crate::pattern::{Params, PathPattern};

type Handler<T> = Arc<dyn Fn(&T, &Params) + Send + Sync>;

/// Token identifying one registered handler, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Subscription<T> {
    matcher: PathPattern,
    handlers: Vec<(HandlerId, Handler<T>)>,
}

struct Registry<T> {
    subscriptions: Vec<Subscription<T>>,
    next_handler: u64,
}

/// A cheaply cloneable handle to a shared pattern registry.
pub struct PatternRouter<T> {
    inner: Arc<Mutex<Registry<T>>>,
}

/// A non-owning router handle, for handlers that refer back to their router.
pub struct WeakRouter<T> {
    inner: Weak<Mutex<Registry<T>>>,
}

impl<T: 'static> PatternRouter<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                subscriptions: Vec::new(),
                next_handler: 0,
            })),
        }
    }

    /// Add `handler` for every address matching `pattern`.
    pub fn on<F>(&self, pattern: &str, handler: F) -> Result<HandlerId, PatternError>
    where
        F: Fn(&T, &Params) + Send + Sync + 'static,
    {
        self.add(pattern, |_| {
            let handler: Handler<T> = Arc::new(handler);
            handler
        })
    }

    /// Add `handler` for the next matching address only.
    ///
    /// The handler is wrapped so that it removes itself before running.
    pub fn once<F>(&self, pattern: &str, handler: F) -> Result<HandlerId, PatternError>
    where
        F: FnOnce(&T, &Params) + Send + 'static,
    {
        let router = self.downgrade();
        let owned = pattern.to_string();
        let slot = Mutex::new(Some(handler));
        self.add(pattern, move |id| {
            let wrapper: Handler<T> = Arc::new(move |payload: &T, params: &Params| {
                let Some(handler) = lock(&slot).take() else {
                    return;
                };
                if let Some(router) = router.upgrade() {
                    router.off(&owned, id);
                }
                handler(payload, params);
            });
            wrapper
        })
    }

    /// Remove one handler. The subscription for `pattern` stays registered.
    ///
    /// Returns `false` when no such handler exists.
    pub fn off(&self, pattern: &str, id: HandlerId) -> bool {
        let mut registry = lock(&self.inner);
        let Some(subscription) = registry
            .subscriptions
            .iter_mut()
            .find(|s| s.matcher.as_str() == pattern)
        else {
            return false;
        };
        let before = subscription.handlers.len();
        subscription.handlers.retain(|(handler_id, _)| *handler_id != id);
        subscription.handlers.len() != before
    }

    /// Run every handler whose pattern matches `address`.
    ///
    /// Handlers run after the registry lock is released, so they may call
    /// `on`, `once` and `off`. Returns the number of handlers invoked.
    pub fn emit(&self, address: &str, payload: &T) -> usize {
        let matched: Vec<(Handler<T>, Params)> = {
            let registry = lock(&self.inner);
            registry
                .subscriptions
                .iter()
                .filter(|s| !s.handlers.is_empty())
                .filter_map(|s| s.matcher.matches(address).map(|params| (s, params)))
                .flat_map(|(s, params)| {
                    s.handlers
                        .iter()
                        .map(move |(_, handler)| (Arc::clone(handler), params.clone()))
                })
                .collect()
        };

        for (handler, params) in &matched {
            handler(payload, params);
        }
        matched.len()
    }

    /// Number of distinct patterns registered.
    pub fn subscription_count(&self) -> usize {
        lock(&self.inner).subscriptions.len()
    }

    /// Number of live handlers on `pattern`.
    pub fn handler_count(&self, pattern: &str) -> usize {
        lock(&self.inner)
            .subscriptions
            .iter()
            .find(|s| s.matcher.as_str() == pattern)
            .map_or(0, |s| s.handlers.len())
    }

    pub fn downgrade(&self) -> WeakRouter<T> {
        WeakRouter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn add(
        &self,
        pattern: &str,
        make: impl FnOnce(HandlerId) -> Handler<T>,
    ) -> Result<HandlerId, PatternError> {
        let mut registry = lock(&self.inner);
        let id = HandlerId(registry.next_handler);
        registry.next_handler += 1;
        let handler = make(id);

        match registry
            .subscriptions
            .iter_mut()
            .find(|s| s.matcher.as_str() == pattern)
        {
            Some(subscription) => subscription.handlers.push((id, handler)),
            None => {
                let matcher = PathPattern::parse(pattern)?;
                registry.subscriptions.push(Subscription {
                    matcher,
                    handlers: vec![(id, handler)],
                });
            }
        }
        Ok(id)
    }
}

impl<T: 'static> Default for PatternRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for PatternRouter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for PatternRouter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = lock(&self.inner);
        f.debug_struct("PatternRouter")
            .field(
                "patterns",
                &registry
                    .subscriptions
                    .iter()
                    .map(|s| s.matcher.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T> WeakRouter<T> {
    pub fn upgrade(&self) -> Option<PatternRouter<T>> {
        self.inner.upgrade().map(|inner| PatternRouter { inner })
    }
}

impl<T> Clone for WeakRouter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}
