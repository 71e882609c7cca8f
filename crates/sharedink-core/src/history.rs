//! The authoritative, append-only action history of one board.
//!
//! Storage is copy-on-write: a [`Snapshot`] shares the current buffer, and the
//! next mutation clones it only while that snapshot is still alive. Append,
//! clear and snapshot each run under the same lock, so every snapshot is a
//! state the log was actually in.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Serialize, Serializer};

use crate::action::Action;

/// An unbounded log warns each time its length crosses a multiple of this.
pub const GROWTH_WARN_INTERVAL: usize = 10_000;

/// Length policy for the action log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryLimit {
    /// Keep everything until the next clear.
    #[default]
    Unbounded,
    /// Keep at most this many actions, evicting the oldest first.
    MaxActions(usize),
}

impl HistoryLimit {
    pub fn from_option(max: Option<usize>) -> Self {
        max.map_or(Self::Unbounded, Self::MaxActions)
    }
}

#[derive(Debug, Default)]
struct Inner {
    actions: Arc<VecDeque<Action>>,
    revision: u64,
}

/// Ordered record of every non-clear action since the last clear.
#[derive(Debug, Default)]
pub struct ActionLog {
    inner: RwLock<Inner>,
    limit: HistoryLimit,
}

impl ActionLog {
    /// Create an empty, unbounded log.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: HistoryLimit) -> Self {
        if matches!(limit, HistoryLimit::MaxActions(0)) {
            log::warn!("History limit of 0 keeps no actions; late joiners will see an empty board");
        }
        Self {
            inner: RwLock::default(),
            limit,
        }
    }

    pub fn limit(&self) -> HistoryLimit {
        self.limit
    }

    /// Add an action to the end of the log.
    pub fn append(&self, action: Action) {
        let mut inner = self.write();
        inner.revision += 1;
        let actions = Arc::make_mut(&mut inner.actions);
        actions.push_back(action);

        match self.limit {
            HistoryLimit::MaxActions(max) => {
                while actions.len() > max {
                    if let Some(evicted) = actions.pop_front() {
                        log::debug!("History full ({max}); evicted oldest `{}` action", evicted.type_tag());
                    }
                }
            }
            HistoryLimit::Unbounded => {
                let len = actions.len();
                if len % GROWTH_WARN_INTERVAL == 0 {
                    log::warn!("Action history holds {len} entries and is unbounded; consider clearing or setting a history limit");
                }
            }
        }
    }

    /// Reset the log to empty.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.revision += 1;
        let dropped = inner.actions.len();
        inner.actions = Arc::default();
        log::debug!("History cleared ({dropped} actions dropped)");
    }

    /// Point-in-time copy of the log, safe to hold while the log keeps changing.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.read();
        Snapshot {
            actions: Arc::clone(&inner.actions),
            revision: inner.revision,
        }
    }

    pub fn len(&self) -> usize {
        self.read().actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic inside a critical section cannot leave the deque half-updated,
    // so a poisoned lock still guards a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Immutable view of the log at one instant. Serializes as a JSON array.
///
/// Taking a snapshot is O(1), but while one is alive the next append or
/// eviction copies the whole buffer. Drop snapshots promptly.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    actions: Arc<VecDeque<Action>>,
    revision: u64,
}

impl Snapshot {
    /// Number of mutations (appends and clears) the log had seen when taken.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn to_vec(&self) -> Vec<Action> {
        self.actions.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Action;
    type IntoIter = std::collections::vec_deque::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.actions.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn action(tag: &str, n: u64) -> Action {
        Action::try_from(serde_json::json!({ "type": tag, "n": n })).unwrap()
    }

    #[test]
    fn test_append_preserves_order() {
        let log = ActionLog::new();
        let actions: Vec<Action> = (0..20).map(|n| action("draw", n)).collect();
        for a in &actions {
            log.append(a.clone());
        }

        let snapshot = log.snapshot();
        assert_eq!(snapshot.to_vec(), actions);
        assert_eq!(snapshot.revision(), 20);
    }

    #[test]
    fn test_clear_empties() {
        let log = ActionLog::new();
        for n in 0..5 {
            log.append(action("rect", n));
        }
        log.clear();

        assert!(log.snapshot().is_empty());
        assert!(log.is_empty());
        assert_eq!(log.snapshot().revision(), 6);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutation() {
        let log = ActionLog::new();
        log.append(action("draw", 1));
        let before = log.snapshot();

        log.append(action("draw", 2));
        log.clear();
        log.append(action("math", 3));

        assert_eq!(before.to_vec(), vec![action("draw", 1)]);
        assert_eq!(log.snapshot().to_vec(), vec![action("math", 3)]);
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let log = ActionLog::with_limit(HistoryLimit::MaxActions(3));
        for n in 0..5 {
            log.append(action("draw", n));
        }

        let kept: Vec<Action> = log.snapshot().iter().cloned().collect();
        assert_eq!(kept, vec![action("draw", 2), action("draw", 3), action("draw", 4)]);
    }

    #[test]
    fn test_limit_zero_keeps_nothing() {
        let log = ActionLog::with_limit(HistoryLimit::MaxActions(0));
        log.append(action("draw", 0));
        assert!(log.is_empty());
    }

    #[test]
    fn test_unbounded_log_past_growth_interval() {
        let log = ActionLog::new();
        let total = GROWTH_WARN_INTERVAL as u64 + 2;
        for n in 0..total {
            log.append(action("draw", n));
        }

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len() as u64, total);
        let around: Vec<Action> = snapshot
            .iter()
            .skip(GROWTH_WARN_INTERVAL - 2)
            .cloned()
            .collect();
        let expected: Vec<Action> = (GROWTH_WARN_INTERVAL as u64 - 2..total)
            .map(|n| action("draw", n))
            .collect();
        assert_eq!(around, expected);
        assert_eq!(log.limit(), HistoryLimit::Unbounded);
    }

    #[test]
    fn test_limit_from_option() {
        assert_eq!(HistoryLimit::from_option(None), HistoryLimit::Unbounded);
        assert_eq!(HistoryLimit::from_option(Some(8)), HistoryLimit::MaxActions(8));
    }

    #[test]
    fn test_snapshot_serializes_as_array() {
        let log = ActionLog::new();
        assert_eq!(serde_json::to_string(&log.snapshot()).unwrap(), "[]");

        log.append(action("draw", 1));
        assert_eq!(
            serde_json::to_string(&log.snapshot()).unwrap(),
            r#"[{"type":"draw","n":1}]"#
        );
    }

    #[test]
    fn test_concurrent_appends_and_snapshots() {
        let log = Arc::new(ActionLog::new());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for n in 0..250 {
                        log.append(action(&format!("w{w}"), n));
                    }
                })
            })
            .collect();

        let reader = {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for _ in 0..100 {
                    let snapshot = log.snapshot();
                    assert_eq!(snapshot.len() as u64, snapshot.revision());
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 1000);
        // Per-writer order survives interleaving.
        for w in 0..4 {
            let tag = format!("w{w}");
            let seen: Vec<u64> = snapshot
                .iter()
                .filter(|a| a.type_tag() == tag)
                .filter_map(|a| a.get("n").and_then(|n| n.as_u64()))
                .collect();
            assert_eq!(seen, (0..250).collect::<Vec<_>>());
        }
    }
}
