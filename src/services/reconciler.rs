//! Diff of freshly fetched events against the stored ledger.
//!
//! The reconciler is fed one property's events at a time, in feed order, and
//! accumulates a [`ReconciliationPlan`]. It never touches the store itself.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::db::models::{BookingRecord, StoredBooking};
use crate::ics::CalendarEvent;
use crate::ledger::{AbsentMark, LedgerSchema, PlannedUpdate, ReconciliationPlan, UpdateKind};

pub struct Reconciler<'a, L> {
    schema: &'a LedgerSchema,
    existing: &'a HashMap<String, StoredBooking<L>>,
    now: DateTime<Utc>,
    staleness: Duration,
    seen: HashSet<String>,
    inserts: Vec<BookingRecord>,
    queued_inserts: HashSet<String>,
    updates: Vec<PlannedUpdate<L>>,
    queued_updates: HashMap<String, usize>,
}

impl<'a, L: Clone> Reconciler<'a, L> {
    pub fn new(
        schema: &'a LedgerSchema,
        existing: &'a HashMap<String, StoredBooking<L>>,
        now: DateTime<Utc>,
        staleness: Duration,
    ) -> Self {
        Self {
            schema,
            existing,
            now,
            staleness,
            seen: HashSet::new(),
            inserts: Vec::new(),
            queued_inserts: HashSet::new(),
            updates: Vec::new(),
            queued_updates: HashMap::new(),
        }
    }

    /// Merge the valid events of one feed into the plan.
    pub fn ingest(&mut self, property_name: &str, events: &[CalendarEvent]) {
        let existing = self.existing;
        for event in events {
            self.seen.insert(event.uid.clone());
            let record = BookingRecord::from_event(event, property_name, self.schema, self.now);

            match existing.get(&event.uid) {
                None => self.queue_insert(record),
                Some(stored) => self.queue_update(stored, record),
            }
        }
    }

    fn queue_insert(&mut self, record: BookingRecord) {
        if !self.queued_inserts.insert(record.uid.clone()) {
            debug!(
                "UID {} already queued for insert this run, ignoring copy from {}",
                record.uid, record.property_name
            );
            return;
        }
        self.inserts.push(record);
    }

    fn queue_update(&mut self, stored: &StoredBooking<L>, record: BookingRecord) {
        // A later feed carrying the same UID replaces what an earlier one queued.
        if let Some(&idx) = self.queued_updates.get(&record.uid) {
            debug!(
                "UID {} seen again in {}, replacing queued update",
                record.uid, record.property_name
            );
            let kind = if record.differs_from(&stored.row, self.schema) {
                UpdateKind::Changed
            } else {
                self.updates[idx].kind
            };
            self.updates[idx].record = record;
            self.updates[idx].kind = kind;
            return;
        }

        let kind = if record.differs_from(&stored.row, self.schema) {
            UpdateKind::Changed
        } else if self.is_stale(&stored.row.last_updated) {
            UpdateKind::Refresh
        } else {
            return;
        };

        self.queued_updates
            .insert(record.uid.clone(), self.updates.len());
        self.updates.push(PlannedUpdate {
            location: stored.location.clone(),
            record,
            kind,
        });
    }

    /// Stored timestamps older than the staleness window, or unreadable, are stale.
    fn is_stale(&self, last_updated: &str) -> bool {
        match self.schema.parse_timestamp(last_updated) {
            Some(at) => self.now - at > self.staleness,
            None => true,
        }
    }

    /// Close the run: known bookings missing from every feed are marked absent,
    /// unless they are already cancelled.
    pub fn finish(self) -> ReconciliationPlan<L> {
        let mut to_mark_absent: Vec<AbsentMark<L>> = self
            .existing
            .iter()
            .filter(|(uid, _)| !self.seen.contains(*uid))
            .filter(|(_, stored)| !self.schema.is_terminal_status(&stored.row.status))
            .map(|(uid, stored)| AbsentMark {
                uid: uid.clone(),
                location: stored.location.clone(),
            })
            .collect();
        to_mark_absent.sort_by(|a, b| a.uid.cmp(&b.uid));

        info!(
            "Reconciliation planned {} inserts, {} updates, {} absence marks",
            self.inserts.len(),
            self.updates.len(),
            to_mark_absent.len()
        );

        ReconciliationPlan {
            to_insert: self.inserts,
            to_update: self.updates,
            to_mark_absent,
            marked_at: self.now,
        }
    }
}
