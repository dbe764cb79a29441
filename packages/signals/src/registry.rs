use std::rc::Rc;

use smallvec::SmallVec;

use crate::pool::{Callback, ConnectionPool};

/// Number of scheduled callbacks a dispatch pass can hold without a heap allocation.
const INLINE_SNAPSHOT_LEN: usize = 8;

/// Position of one live connection in the dispatch order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Ranked {
    pub(crate) priority: i32,
    pub(crate) sequence: u64,
    pub(crate) index: usize,
}

impl Ranked {
    /// Whether `self` dispatches before a connection with the given priority and sequence.
    fn precedes(&self, priority: i32, sequence: u64) -> bool {
        self.priority > priority || (self.priority == priority && self.sequence < sequence)
    }
}

/// The live connections of one signal in dispatch order:
/// descending priority, then ascending sequence.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: Vec<Ranked>,
}

/// One callback scheduled by a dispatch pass.
///
/// The `(index, sequence)` stamp is rechecked against the pool right before invocation,
/// so a connection removed (or replaced) after the snapshot was taken is skipped.
pub(crate) struct Scheduled<A> {
    pub(crate) index: usize,
    pub(crate) sequence: u64,
    pub(crate) callback: Callback<A>,
}

pub(crate) type Snapshot<A> = SmallVec<[Scheduled<A>; INLINE_SNAPSHOT_LEN]>;

impl Registry {
    #[cfg(test)]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn insert(&mut self, ranked: Ranked) {
        let position = self
            .entries
            .partition_point(|existing| existing.precedes(ranked.priority, ranked.sequence));

        self.entries.insert(position, ranked);
    }

    /// Removes the connection with the given priority and sequence.
    /// Returns `false` if it was not registered.
    pub(crate) fn remove(&mut self, priority: i32, sequence: u64) -> bool {
        let position = self
            .entries
            .partition_point(|existing| existing.precedes(priority, sequence));

        match self.entries.get(position) {
            Some(found) if found.priority == priority && found.sequence == sequence => {
                self.entries.remove(position);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Ranked> {
        self.entries.iter()
    }

    /// Captures the callbacks to invoke for one dispatch pass, in dispatch order.
    #[must_use]
    pub(crate) fn snapshot<A>(&self, pool: &ConnectionPool<A>) -> Snapshot<A> {
        self.entries
            .iter()
            .map(|ranked| {
                let record = pool
                    .get(ranked.index, ranked.sequence)
                    .expect("every registered connection occupies its pool slot");

                Scheduled {
                    index: ranked.index,
                    sequence: ranked.sequence,
                    callback: Rc::clone(&record.callback),
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::pool::Record;

    fn ranked(priority: i32, sequence: u64) -> Ranked {
        Ranked {
            priority,
            sequence,
            index: usize::try_from(sequence).unwrap(),
        }
    }

    fn order(registry: &Registry) -> Vec<(i32, u64)> {
        registry
            .iter()
            .map(|ranked| (ranked.priority, ranked.sequence))
            .collect()
    }

    #[test]
    fn insert_keeps_descending_priority_then_sequence() {
        let mut registry = Registry::default();

        registry.insert(ranked(10, 0));
        registry.insert(ranked(5, 1));
        registry.insert(ranked(10, 2));
        registry.insert(ranked(-3, 3));
        registry.insert(ranked(5, 4));

        assert_eq!(
            order(&registry),
            vec![(10, 0), (10, 2), (5, 1), (5, 4), (-3, 3)]
        );
    }

    #[test]
    fn reinsert_with_fresh_sequence_goes_after_peers() {
        let mut registry = Registry::default();

        registry.insert(ranked(0, 0));
        registry.insert(ranked(0, 1));
        registry.insert(ranked(0, 2));

        assert!(registry.remove(0, 0));
        registry.insert(ranked(0, 3));

        assert_eq!(order(&registry), vec![(0, 1), (0, 2), (0, 3)]);
    }

    #[test]
    fn remove_unknown_is_false() {
        let mut registry = Registry::default();
        registry.insert(ranked(1, 0));

        assert!(!registry.remove(1, 7));
        assert!(!registry.remove(2, 0));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(1, 0));
        assert!(!registry.remove(1, 0));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn snapshot_follows_registry_order() {
        let mut pool = ConnectionPool::<()>::new(8);
        let mut registry = Registry::default();

        for (priority, sequence) in [(1, 0), (7, 1), (1, 2)] {
            let (index, _) = pool
                .acquire(Record {
                    callback: Rc::new(|_: &()| {}),
                    priority,
                    once: false,
                    sequence,
                })
                .unwrap();

            registry.insert(Ranked {
                priority,
                sequence,
                index,
            });
        }

        let sequences: Vec<u64> = registry
            .snapshot(&pool)
            .iter()
            .map(|scheduled| scheduled.sequence)
            .collect();

        assert_eq!(sequences, vec![1, 0, 2]);
    }
}
