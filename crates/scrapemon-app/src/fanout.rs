//! Subscription fan-out: handlers keyed by signal, invoked in registration order
//!
//! A handler that returns an error or panics is logged and skipped; the rest
//! of the handlers for the same envelope still run. Registrations are removed
//! through the [`Subscription`] handle, explicitly or when it is dropped.
//!
//! Dispatch may run on several threads at once. Each handler runs on one
//! thread at a time; other threads wait for it rather than skip it.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use scrapemon_core::prelude::*;
use scrapemon_core::{Envelope, SignalName};

/// Boxed envelope handler
pub type Handler = Box<dyn FnMut(&Envelope) -> Result<()> + Send>;

type SharedHandler = Arc<Mutex<Handler>>;

thread_local! {
    /// Handlers currently running on this thread, keyed by allocation
    static RUNNING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Marks a handler as running on this thread until dropped
struct RunningMark(usize);

impl RunningMark {
    /// `None` if the handler is already running further up this thread's stack
    fn enter(handler: &SharedHandler) -> Option<Self> {
        let key = Arc::as_ptr(handler) as usize;
        RUNNING
            .with(|running| running.borrow_mut().insert(key))
            .then_some(Self(key))
    }
}

impl Drop for RunningMark {
    fn drop(&mut self) {
        RUNNING.with(|running| {
            running.borrow_mut().remove(&self.0);
        });
    }
}

/// Identifier of one registration within a [`Dispatcher`]
pub type SubscriptionId = u64;

/// What a handler listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Envelopes with this logical name only
    Signal(SignalName),
    /// Every envelope
    All,
}

impl Topic {
    pub fn matches(&self, signal: &SignalName) -> bool {
        match self {
            Topic::Signal(wanted) => wanted == signal,
            Topic::All => true,
        }
    }
}

impl From<SignalName> for Topic {
    fn from(signal: SignalName) -> Self {
        Topic::Signal(signal)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Topic::Signal(SignalName::parse(name))
    }
}

struct Registration {
    id: SubscriptionId,
    topic: Topic,
    handler: SharedHandler,
}

#[derive(Default)]
struct Registry {
    next_id: SubscriptionId,
    entries: Vec<Registration>,
}

impl Registry {
    fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of envelope handlers
///
/// Cloning yields another handle onto the same registry.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped
    #[must_use = "dropping the Subscription unregisters the handler"]
    pub fn add_handler<F>(&self, topic: impl Into<Topic>, handler: F) -> Subscription
    where
        F: FnMut(&Envelope) -> Result<()> + Send + 'static,
    {
        let topic = topic.into();
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        trace!("Registered handler {} for {:?}", id, topic);
        registry.entries.push(Registration {
            id,
            topic,
            handler: Arc::new(Mutex::new(Box::new(handler))),
        });

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: true,
        }
    }

    /// Deliver an envelope to every matching handler
    ///
    /// Handlers run outside the registry lock, so they may register or
    /// unsubscribe. A handler unsubscribed by an earlier one is skipped; a
    /// handler that re-enters dispatch does not run recursively. Returns the
    /// number of handlers invoked.
    pub fn dispatch(&self, envelope: &Envelope) -> usize {
        let matching: Vec<(SubscriptionId, SharedHandler)> = self
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.topic.matches(&envelope.signal))
            .map(|entry| (entry.id, Arc::clone(&entry.handler)))
            .collect();

        let mut invoked = 0;
        for (id, handler) in matching {
            if !self.lock().contains(id) {
                continue;
            }

            let Some(_mark) = RunningMark::enter(&handler) else {
                warn!(
                    "Handler {} re-entered while handling {}, skipping",
                    id,
                    envelope.logical_name()
                );
                continue;
            };
            let mut handler = handler.lock().unwrap_or_else(PoisonError::into_inner);

            match catch_unwind(AssertUnwindSafe(|| (handler)(envelope))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    "Handler {} failed on {} ({}): {}",
                    id,
                    envelope.logical_name(),
                    envelope.message_id,
                    e
                ),
                Err(_) => warn!(
                    "Handler {} panicked on {} ({}); continuing",
                    id,
                    envelope.logical_name(),
                    envelope.message_id
                ),
            }
            invoked += 1;
        }

        trace!(
            "Dispatched {} ({}) to {} handler(s)",
            envelope.logical_name(),
            envelope.message_id,
            invoked
        );
        invoked
    }

    pub fn handler_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to one registration
///
/// Unsubscribes on drop. Outliving the dispatcher is harmless.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Mutex<Registry>>,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Remove exactly this registration; safe to call repeatedly
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let removed = {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            let position = registry.entries.iter().position(|entry| entry.id == self.id);
            position.map(|index| registry.entries.remove(index))
        };
        // Dropped outside the lock: the handler may own other subscriptions
        drop(removed);
        trace!("Unregistered handler {}", self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl FnMut(&Envelope) -> Result<()> + Send + 'static {
        let log = Arc::clone(log);
        move |env: &Envelope| {
            log.lock().unwrap().push(format!("{tag}:{}", env.logical_name()));
            Ok(())
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let _a = dispatcher.add_handler("show_log_text", recorder(&log, "a"));
        let _b = dispatcher.add_handler(Topic::All, recorder(&log, "b"));
        let _c = dispatcher.add_handler("show_log_text", recorder(&log, "c"));

        assert_eq!(dispatcher.dispatch(&Envelope::new("show_log_text", "x")), 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:show_log_text", "b:show_log_text", "c:show_log_text"]
        );
    }

    #[test]
    fn test_only_matching_topics_receive() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _progress = dispatcher.add_handler(SignalName::Progress, recorder(&log, "p"));

        assert_eq!(dispatcher.dispatch(&Envelope::new("detail_log", "x")), 0);
        assert_eq!(dispatcher.dispatch(&Envelope::new("progress", "x")), 1);
        assert_eq!(*log.lock().unwrap(), vec!["p:progress"]);
    }

    #[test]
    fn test_unknown_signals_are_routable() {
        let dispatcher = Dispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = dispatcher.add_handler("brand_new_signal", move |_: &Envelope| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher.dispatch(&Envelope::new("brand_new_signal", "x"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_handler_is_isolated() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let _bad = dispatcher.add_handler("show_log_text", |_: &Envelope| {
            Err(Error::config("broken view"))
        });
        let _panics = dispatcher.add_handler("show_log_text", |_: &Envelope| -> Result<()> {
            panic!("view exploded")
        });
        let _good = dispatcher.add_handler("show_log_text", recorder(&log, "good"));
        let _other = dispatcher.add_handler("detail_log", recorder(&log, "other"));

        assert_eq!(dispatcher.dispatch(&Envelope::new("show_log_text", "x")), 3);
        dispatcher.dispatch(&Envelope::new("detail_log", "y"));
        // The panicking handler keeps its registration and is invoked again
        assert_eq!(dispatcher.dispatch(&Envelope::new("show_log_text", "z")), 3);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["good:show_log_text", "other:detail_log", "good:show_log_text"]
        );
    }

    #[test]
    fn test_unsubscribe_is_idempotent_and_exact() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut first = dispatcher.add_handler("scrape_info", recorder(&log, "first"));
        let _second = dispatcher.add_handler("scrape_info", recorder(&log, "second"));
        assert_eq!(dispatcher.handler_count(), 2);

        first.unsubscribe();
        first.unsubscribe();
        assert!(!first.is_active());
        assert_eq!(dispatcher.handler_count(), 1);

        dispatcher.dispatch(&Envelope::new("scrape_info", "x"));
        assert_eq!(*log.lock().unwrap(), vec!["second:scrape_info"]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let dispatcher = Dispatcher::new();
        {
            let _sub = dispatcher.add_handler(Topic::All, |_: &Envelope| Ok(()));
            assert_eq!(dispatcher.handler_count(), 1);
        }
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_dispatcher() {
        let dispatcher = Dispatcher::new();
        let mut sub = dispatcher.add_handler(Topic::All, |_: &Envelope| Ok(()));
        drop(dispatcher);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_handler_unsubscribed_mid_dispatch_is_skipped() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&victim);
        let _killer = dispatcher.add_handler(Topic::All, move |_: &Envelope| {
            if let Some(mut sub) = slot.lock().unwrap().take() {
                sub.unsubscribe();
            }
            Ok(())
        });
        let doomed = dispatcher.add_handler(Topic::All, recorder(&log, "victim"));
        *victim.lock().unwrap() = Some(doomed);

        assert_eq!(dispatcher.dispatch(&Envelope::new("show_log_text", "x")), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reentrant_dispatch_does_not_recurse() {
        let dispatcher = Dispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let inner = dispatcher.clone();
        let counter = Arc::clone(&hits);
        let _sub = dispatcher.add_handler(Topic::All, move |env: &Envelope| {
            counter.fetch_add(1, Ordering::SeqCst);
            inner.dispatch(env);
            Ok(())
        });

        dispatcher.dispatch(&Envelope::new("show_log_text", "x"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_dispatch_reaches_every_handler() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 5_000;

        let dispatcher = Dispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _slow = dispatcher.add_handler(Topic::All, move |_: &Envelope| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::yield_now();
            Ok(())
        });

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..PER_THREAD {
                        assert_eq!(dispatcher.dispatch(&Envelope::new("show_log_text", "x")), 1);
                    }
                });
            }
        });

        assert_eq!(hits.load(Ordering::SeqCst), THREADS * PER_THREAD);
    }

    #[test]
    fn test_same_handler_on_other_thread_is_not_reentry() {
        let dispatcher = Dispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let inner = dispatcher.clone();
        let counter = Arc::clone(&hits);
        let _sub = dispatcher.add_handler(Topic::All, move |env: &Envelope| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                // Handing the envelope to another thread waits for this
                // handler instead of skipping it
                let inner = inner.clone();
                let env = env.clone();
                std::thread::spawn(move || inner.dispatch(&env));
            }
            Ok(())
        });

        dispatcher.dispatch(&Envelope::new("show_log_text", "x"));
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while hits.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
