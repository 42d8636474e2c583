//! Durable log contract and the in-memory implementation.
//!
//! A store keeps two kinds of rows:
//! - [`EventRecord`]s, one per sequenced event, contiguous from id 1
//! - [`UniqueEventRecord`]s, one per consumed idempotency key
//!
//! [`EventStore::append_batch`] writes both kinds as one all-or-nothing unit.

use std::collections::HashMap;

use exchange_types::{EventRecord, ExchangeError, Result, SequenceId, UniqueEventRecord};

/// Append-only event log with idempotency-key lookup.
pub trait EventStore: Send {
    /// Persist a batch atomically: either every record is stored or none is.
    ///
    /// `events` must continue the chain: the first record's `previous_id`
    /// is the current last sequence id and each following record links to
    /// the one before it.
    fn append_batch(
        &mut self,
        events: &[EventRecord],
        uniques: &[UniqueEventRecord],
    ) -> Result<()>;

    /// Point lookup of a consumed idempotency key.
    fn unique_event(&self, unique_id: &str) -> Result<Option<UniqueEventRecord>>;

    /// The record with the highest sequence id.
    fn last_event(&self) -> Result<Option<EventRecord>>;

    /// Up to `limit` records with `sequence_id > after`, ascending.
    fn read_after(&self, after: SequenceId, limit: usize) -> Result<Vec<EventRecord>>;
}

/// Check that `events` extends a log whose last id is `last`.
pub(crate) fn check_chain(last: SequenceId, events: &[EventRecord]) -> Result<()> {
    let mut expected = last;
    for record in events {
        if record.previous_id != expected || record.sequence_id != expected.next() {
            return Err(ExchangeError::SequenceGap {
                expected,
                actual: record.previous_id,
            });
        }
        expected = record.sequence_id;
    }
    Ok(())
}

/// Event store held entirely in memory.
///
/// Also serves as the index behind [`crate::JournalEventStore`].
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Vec<EventRecord>,
    uniques: HashMap<String, UniqueEventRecord>,
    fail_next_append: bool,
}

impl MemoryEventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next [`EventStore::append_batch`] fail without storing anything.
    pub fn fail_next_append(&mut self) {
        self.fail_next_append = true;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn last_sequence_id(&self) -> SequenceId {
        self.events
            .last()
            .map_or(SequenceId::ZERO, |record| record.sequence_id)
    }

    /// Validate a batch against this log without storing it.
    pub(crate) fn check_batch(
        &self,
        events: &[EventRecord],
        uniques: &[UniqueEventRecord],
    ) -> Result<()> {
        check_chain(self.last_sequence_id(), events)?;
        if let Some(dup) = uniques.iter().find(|u| self.uniques.contains_key(&u.unique_id)) {
            return Err(ExchangeError::Storage(format!(
                "unique id {} already consumed",
                dup.unique_id
            )));
        }
        Ok(())
    }

    /// Store an already validated batch.
    pub(crate) fn commit(&mut self, events: &[EventRecord], uniques: &[UniqueEventRecord]) {
        self.events.extend_from_slice(events);
        for unique in uniques {
            self.uniques.insert(unique.unique_id.clone(), unique.clone());
        }
    }
}

impl EventStore for MemoryEventStore {
    fn append_batch(
        &mut self,
        events: &[EventRecord],
        uniques: &[UniqueEventRecord],
    ) -> Result<()> {
        if std::mem::take(&mut self.fail_next_append) {
            return Err(ExchangeError::Storage("injected append failure".into()));
        }
        self.check_batch(events, uniques)?;
        self.commit(events, uniques);
        Ok(())
    }

    fn unique_event(&self, unique_id: &str) -> Result<Option<UniqueEventRecord>> {
        Ok(self.uniques.get(unique_id).cloned())
    }

    fn last_event(&self) -> Result<Option<EventRecord>> {
        Ok(self.events.last().cloned())
    }

    fn read_after(&self, after: SequenceId, limit: usize) -> Result<Vec<EventRecord>> {
        let start = self.events.partition_point(|r| r.sequence_id <= after);
        Ok(self.events.iter().skip(start).take(limit).cloned().collect())
    }
}
