use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::{Error, Result};

/// The listener function stored in a connection slot.
///
/// Shared so that a dispatch pass can hold on to the callback without keeping the signal
/// state borrowed while the callback runs.
pub(crate) type Callback<A> = Rc<dyn Fn(&A)>;

/// Everything the signal knows about one connection.
pub(crate) struct Record<A> {
    pub(crate) callback: Callback<A>,
    pub(crate) priority: i32,
    pub(crate) once: bool,

    /// Identifies this particular (re)insertion of the slot. Two records never share a
    /// sequence number within one signal, so `(index, sequence)` is a unique stamp.
    pub(crate) sequence: u64,
}

impl<A> fmt::Debug for Record<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) enum Entry<A> {
    Occupied(Record<A>),

    /// A free slot. If the previous occupant was disconnected (rather than cleared), its record
    /// stays parked here until the slot is handed out again, so the owner can still reconnect.
    Vacant { parked: Option<Record<A>> },
}

/// Fixed-capacity arena of connection slots with a stack of free indexes.
///
/// Slots are allocated lazily, so a signal with few listeners never pays for the full capacity.
/// The most recently freed slot is handed out first, which keeps the working set small under
/// connect/disconnect churn.
pub(crate) struct ConnectionPool<A> {
    entries: Vec<Entry<A>>,

    /// Indexes of vacant entries. The top of the stack is the most recently released slot.
    free: Vec<usize>,

    live: usize,
    capacity: usize,
}

impl<A> ConnectionPool<A> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "connection pool must have non-zero capacity");

        Self {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
            capacity,
        }
    }

    /// Number of occupied slots.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Places `record` into a slot and returns the slot index, together with any record that
    /// was parked in a reused slot. The caller is expected to drop the evicted record only after
    /// it has released any borrow of the signal state, as dropping a callback runs user code.
    pub(crate) fn acquire(&mut self, record: Record<A>) -> Result<(usize, Option<Record<A>>)> {
        if let Some(index) = self.free.pop() {
            let entry = self
                .entries
                .get_mut(index)
                .expect("free list only contains indexes of existing entries");

            let previous = mem::replace(entry, Entry::Occupied(record));

            let Entry::Vacant { parked } = previous else {
                panic!("free list pointed at occupied connection slot {index}");
            };

            self.live = self
                .live
                .checked_add(1)
                .expect("live count is bounded by capacity");

            return Ok((index, parked));
        }

        if self.entries.len() >= self.capacity {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let index = self.entries.len();
        self.entries.push(Entry::Occupied(record));

        self.live = self
            .live
            .checked_add(1)
            .expect("live count is bounded by capacity");

        Ok((index, None))
    }

    /// Returns the record in the slot if the slot is occupied by the record with `sequence`.
    #[must_use]
    pub(crate) fn get(&self, index: usize, sequence: u64) -> Option<&Record<A>> {
        match self.entries.get(index) {
            Some(Entry::Occupied(record)) if record.sequence == sequence => Some(record),
            _ => None,
        }
    }

    #[must_use]
    pub(crate) fn is_live(&self, index: usize, sequence: u64) -> bool {
        self.get(index, sequence).is_some()
    }

    /// Vacates the slot if it is occupied by the record with `sequence`, parking the record for
    /// a potential reconnect. Returns the priority of the released record so the caller can find
    /// it in the registry, or `None` if there was nothing to release.
    pub(crate) fn release(&mut self, index: usize, sequence: u64) -> Option<i32> {
        let entry = self.entries.get_mut(index)?;

        if !matches!(&*entry, Entry::Occupied(record) if record.sequence == sequence) {
            return None;
        }

        let Entry::Occupied(record) = mem::replace(entry, Entry::Vacant { parked: None }) else {
            unreachable!("occupancy was checked above");
        };

        let priority = record.priority;
        *entry = Entry::Vacant {
            parked: Some(record),
        };

        self.free.push(index);
        self.live = self
            .live
            .checked_sub(1)
            .expect("released a slot while no slots were live");

        Some(priority)
    }

    /// Takes a vacant slot back into use for the record parked there with `sequence`, assigning
    /// it `new_sequence`. Returns the priority of the reclaimed record, or `None` if the slot has
    /// since been reused (or cleared) and the parked record is gone.
    pub(crate) fn reclaim(&mut self, index: usize, sequence: u64, new_sequence: u64) -> Option<i32> {
        let entry = self.entries.get_mut(index)?;

        let parked_sequence = match &*entry {
            Entry::Vacant {
                parked: Some(record),
            } => record.sequence,
            _ => return None,
        };

        if parked_sequence != sequence {
            return None;
        }

        let free_position = self
            .free
            .iter()
            .rposition(|free_index| *free_index == index)
            .expect("vacant slot must be on the free list");
        self.free.remove(free_position);

        let Entry::Vacant {
            parked: Some(mut record),
        } = mem::replace(entry, Entry::Vacant { parked: None })
        else {
            unreachable!("parked record was checked above");
        };

        record.sequence = new_sequence;
        let priority = record.priority;
        *entry = Entry::Occupied(record);

        self.live = self
            .live
            .checked_add(1)
            .expect("live count is bounded by capacity");

        Some(priority)
    }

    /// Empties the pool, returning every entry (live or parked) so the caller can drop the
    /// callbacks after releasing its borrow of the signal state.
    #[must_use]
    pub(crate) fn clear(&mut self) -> Vec<Entry<A>> {
        self.free.clear();
        self.live = 0;
        mem::take(&mut self.entries)
    }
}

impl<A> fmt::Debug for ConnectionPool<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("allocated", &self.entries.len())
            .field("free", &self.free.len())
            .field("live", &self.live)
            .field("capacity", &self.capacity)
            .finish()
    }
}
