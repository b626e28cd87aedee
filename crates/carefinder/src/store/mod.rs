//! The single owner of [`FilterState`].
//!
//! Every mutation goes through [`FilterStore`]. Updates from form controls are
//! debounced per field: an update is held until no newer value for the same
//! field has arrived for the settle interval, and only the last value is
//! committed. Resets bypass the queue.

mod clock;

use std::time::{Duration, Instant};

use ahash::AHashMap;
pub use clock::{Clock, ManualClock, SystemClock};
use itertools::Itertools;
use tracing::{debug, trace};

use crate::filter::{FilterChange, FilterField, FilterState};

pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy)]
struct Pending {
    change: FilterChange,
    /// Issue order of the most recent value for this field
    seq: u64,
    settles_at: Instant,
}

/// Filter state plus the queue of not-yet-settled updates.
#[derive(Debug)]
pub struct FilterStore {
    state: FilterState,
    pending: AHashMap<FilterField, Pending>,
    interval: Duration,
    clock: Box<dyn Clock>,
    next_seq: u64,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_INTERVAL)
    }
}

impl FilterStore {
    /// A store reading time from the system clock.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, SystemClock)
    }

    pub fn with_clock(interval: Duration, clock: impl Clock + 'static) -> Self {
        Self {
            state: FilterState::default(),
            pending: AHashMap::new(),
            interval,
            clock: Box::new(clock),
            next_seq: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &FilterState {
        &self.state
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Fields with an uncommitted update, in issue order.
    #[must_use]
    pub fn pending_fields(&self) -> Vec<FilterField> {
        self.pending
            .iter()
            .sorted_by_key(|(_, pending)| pending.seq)
            .map(|(field, _)| *field)
            .collect()
    }

    /// When the earliest pending update settles, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.settles_at).min()
    }

    /// Queue a new value for one field, replacing any unsettled value for it.
    ///
    /// With a zero interval the change commits immediately and the changed
    /// field (if any) is returned; otherwise nothing commits until [`tick`] or
    /// [`flush`].
    ///
    /// [`tick`]: Self::tick
    /// [`flush`]: Self::flush
    pub fn update(&mut self, change: FilterChange) -> Vec<FilterField> {
        let field = change.field();
        if self.interval.is_zero() {
            self.pending.remove(&field);
            return self.commit(vec![change]);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let settles_at = self.clock.now() + self.interval;
        if let Some(replaced) = self.pending.insert(
            field,
            Pending {
                change,
                seq,
                settles_at,
            },
        ) {
            trace!(%field, previous = ?replaced.change, "Coalesced pending update");
        }
        Vec::new()
    }

    /// Commit every update whose settle interval has elapsed.
    pub fn tick(&mut self) -> Vec<FilterField> {
        let now = self.clock.now();
        let settled = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.settles_at <= now)
            .map(|(field, _)| *field)
            .collect_vec();
        self.take_and_commit(&settled)
    }

    /// Commit everything pending, settled or not.
    pub fn flush(&mut self) -> Vec<FilterField> {
        let fields = self.pending.keys().copied().collect_vec();
        self.take_and_commit(&fields)
    }

    /// Restore one field's default, dropping any pending update for it.
    pub fn reset_field(&mut self, field: FilterField) -> bool {
        self.pending.remove(&field);
        let changed = self.state.reset_field(field);
        debug!(%field, changed, "Reset filter field");
        changed
    }

    /// Restore every default and drop the whole queue. Returns the fields that changed.
    pub fn reset_all(&mut self) -> Vec<FilterField> {
        self.pending.clear();
        let changed = self.state.active_fields();
        self.state = FilterState::default();
        debug!(changed = changed.len(), "Reset all filters");
        changed
    }

    fn take_and_commit(&mut self, fields: &[FilterField]) -> Vec<FilterField> {
        let changes = fields
            .iter()
            .filter_map(|field| self.pending.remove(field))
            .sorted_by_key(|pending| pending.seq)
            .map(|pending| pending.change)
            .collect_vec();
        self.commit(changes)
    }

    fn commit(&mut self, changes: Vec<FilterChange>) -> Vec<FilterField> {
        let mut changed = Vec::with_capacity(changes.len());
        for change in changes {
            let field = change.field();
            if self.state.apply(change) {
                debug!(%field, ?change, "Committed filter update");
                changed.push(field);
            } else {
                trace!(%field, "Update left filter unchanged");
            }
        }
        changed
    }
}
