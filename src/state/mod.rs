// Shared engine state
//
// Single-writer / many-reader cell for the state an engine owns across calls
// (pattern table, conflict model, compatibility matrix). Readers grab the
// current `Arc<T>` and work on it without holding any lock; writers build a
// complete replacement and swap it in, so a reader sees either the old or the
// new version and never a mix.

use crate::models::ModId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted whenever engine-owned state is replaced
///
/// The orchestrator hands one sender to every engine so a single
/// subscription observes all of them.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The pattern table was rebuilt from history
    PatternsTrained { patterns: usize },

    /// The conflict classifier finished a training run
    ModelTrained { training_size: usize, accuracy: f64 },

    /// The compatibility matrix was rebuilt from its evidence log
    MatrixRebuilt { mods: usize, data_points: usize },

    /// A single pair of the compatibility matrix was updated
    MatrixUpdated { mod_a: ModId, mod_b: ModId },
}

/// Create the event channel shared by a set of engines
pub fn channel() -> broadcast::Sender<StateChange> {
    let (tx, _) = broadcast::channel(100);
    tx
}

/// Thread-safe, copy-on-replace state cell with event emission
///
/// # Usage
///
/// - [`snapshot()`](Self::snapshot) to take a consistent read view
/// - [`read()`](Self::read) to inspect without cloning the `Arc`
/// - [`replace()`](Self::replace) / [`update()`](Self::update) to publish a new version
/// - [`subscribe()`](Self::subscribe) for change notifications
pub struct SharedState<T> {
    current: RwLock<Arc<T>>,

    /// Serialises writers so read-modify-write updates never interleave
    writer: Mutex<()>,

    version: AtomicU64,

    events: broadcast::Sender<StateChange>,
}

impl<T> SharedState<T> {
    /// Create a cell with its own private event channel
    pub fn new(initial: T) -> Self {
        Self::with_events(initial, channel())
    }

    /// Create a cell that reports on an existing channel
    pub fn with_events(initial: T, events: broadcast::Sender<StateChange>) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
            version: AtomicU64::new(0),
            events,
        }
    }

    /// Current version; stays valid even if a writer replaces it afterwards
    pub fn snapshot(&self) -> Arc<T> {
        // Writers only ever swap a whole Arc, so a poisoned lock still holds a complete value
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Execute a function with read access to the current version
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let snapshot = self.snapshot();
        f(&snapshot)
    }

    /// Number of replacements published so far
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Publish a complete replacement and emit the given events
    ///
    /// Returns the version this call published, even if another writer has
    /// already replaced it.
    pub fn replace(&self, next: T, changes: Vec<StateChange>) -> Arc<T> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(next);
        self.publish(Arc::clone(&next), changes);
        next
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Sender shared with sibling engines
    pub fn events(&self) -> broadcast::Sender<StateChange> {
        self.events.clone()
    }

    fn publish(&self, next: Arc<T>, changes: Vec<StateChange>) {
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = next;
        }
        self.version.fetch_add(1, Ordering::AcqRel);

        for change in changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.events.send(change);
        }
    }
}

impl<T: Clone> SharedState<T> {
    /// Clone the current version, mutate the copy, then swap it in
    ///
    /// The closure returns the events describing what it changed. Readers
    /// never observe the copy while it is being modified.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut T) -> Vec<StateChange>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = (*self.snapshot()).clone();
        let changes = update_fn(&mut next);
        self.publish(Arc::new(next), changes.clone());
        changes
    }
}

impl<T: Default> Default for SharedState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SharedState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("version", &self.version())
            .field("current", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_replace() {
        let state = SharedState::new(vec![1, 2, 3]);
        let before = state.snapshot();

        state.replace(vec![4], Vec::new());

        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*state.snapshot(), vec![4]);
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn test_replace_returns_its_own_version() {
        let state = SharedState::new(0u32);
        let mine = state.replace(1, Vec::new());
        state.replace(2, Vec::new());

        assert_eq!(*mine, 1);
        assert_eq!(*state.snapshot(), 2);
    }

    #[test]
    fn test_update_emits_events() {
        let state = SharedState::new(0usize);
        let mut rx = state.subscribe();

        let changes = state.update(|value| {
            *value += 5;
            vec![StateChange::PatternsTrained { patterns: *value }]
        });

        assert_eq!(changes.len(), 1);
        assert_eq!(state.read(|value| *value), 5);
        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::PatternsTrained { patterns: 5 }
        );
    }

    #[test]
    fn test_shared_channel() {
        let events = channel();
        let a = SharedState::with_events(1u8, events.clone());
        let b = SharedState::with_events(2u8, events);
        let mut rx = a.subscribe();

        b.replace(
            3,
            vec![StateChange::MatrixUpdated {
                mod_a: "A".to_string(),
                mod_b: "B".to_string(),
            }],
        );

        assert!(matches!(
            rx.try_recv().unwrap(),
            StateChange::MatrixUpdated { .. }
        ));
    }

    #[test]
    fn test_concurrent_updates_are_serialised() {
        let state = Arc::new(SharedState::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        state.update(|value| {
                            *value += 1;
                            Vec::new()
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*state.snapshot(), 800);
        assert_eq!(state.version(), 800);
    }
}
