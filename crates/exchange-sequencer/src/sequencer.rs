//! Assigns the total order.
//!
//! ```text
//! sequence(Vec<PendingEvent>) -> Vec<SequencedEvent>
//! ```
//!
//! For each candidate, in submission order:
//! 1. A `unique_id` already seen in this batch or in the store drops the
//!    event: no id, no record, absent from the output.
//! 2. Otherwise it gets `previous_id = counter` and `sequence_id = counter + 1`.
//!
//! All records of a batch share one timestamp, and the whole batch is
//! persisted with a single [`EventStore::append_batch`]. The counter and
//! the last timestamp only move after that call succeeds, so a failed batch
//! leaves the sequencer exactly as it was.
//!
//! Not thread-safe by contract: one coordinator drives it.

use std::collections::HashSet;

use exchange_types::{
    EventRecord, PendingEvent, Result, SequenceId, SequencedEvent, UniqueEventRecord,
};

use crate::clock::{Clock, SystemClock};
use crate::store::EventStore;

pub struct Sequencer<S, C = SystemClock> {
    store: S,
    clock: C,
    sequence_id: SequenceId,
    last_timestamp: i64,
}

impl<S: EventStore> Sequencer<S, SystemClock> {
    /// Sequencer on the system clock, resumed from `store`.
    pub fn new(store: S) -> Result<Self> {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: EventStore, C: Clock> Sequencer<S, C> {
    /// Sequencer on `clock`, resumed from whatever `store` already holds.
    pub fn with_clock(store: S, clock: C) -> Result<Self> {
        let mut sequencer = Self {
            store,
            clock,
            sequence_id: SequenceId::ZERO,
            last_timestamp: 0,
        };
        sequencer.recover()?;
        Ok(sequencer)
    }

    /// Highest persisted sequence id, zero for an empty store.
    pub fn max_sequence_id(&self) -> Result<SequenceId> {
        Ok(self
            .store
            .last_event()?
            .map_or(SequenceId::ZERO, |record| record.sequence_id))
    }

    /// Reset the counter and last timestamp from the store.
    pub fn recover(&mut self) -> Result<SequenceId> {
        match self.store.last_event()? {
            Some(record) => {
                self.sequence_id = record.sequence_id;
                self.last_timestamp = record.created_at;
            }
            None => {
                self.sequence_id = SequenceId::ZERO;
                self.last_timestamp = 0;
            }
        }
        tracing::info!(
            sequence_id = %self.sequence_id,
            last_timestamp = self.last_timestamp,
            "sequencer recovered"
        );
        Ok(self.sequence_id)
    }

    /// Last assigned sequence id.
    #[must_use]
    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    #[must_use]
    pub fn last_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Wall-clock time, never earlier than the last batch.
    fn batch_timestamp(&self) -> i64 {
        let now = self.clock.now_millis();
        if now < self.last_timestamp {
            tracing::warn!(
                now,
                last = self.last_timestamp,
                "clock moved backwards, reusing last timestamp"
            );
            self.last_timestamp
        } else {
            now
        }
    }

    /// Sequence and persist one batch.
    ///
    /// # Errors
    /// Any store failure rejects the whole batch; nothing is persisted and
    /// the counter is unchanged. Encoding errors are reported the same way.
    pub fn sequence(&mut self, batch: Vec<PendingEvent>) -> Result<Vec<SequencedEvent>> {
        let created_at = self.batch_timestamp();
        let mut seen: HashSet<String> = HashSet::new();
        let mut sequence_id = self.sequence_id;
        let mut admitted = Vec::with_capacity(batch.len());
        let mut records = Vec::with_capacity(batch.len());
        let mut uniques = Vec::new();

        for pending in batch {
            if let Some(unique_id) = &pending.unique_id {
                if seen.contains(unique_id) || self.store.unique_event(unique_id)?.is_some() {
                    tracing::warn!(
                        unique_id = %unique_id,
                        kind = pending.payload.kind(),
                        "duplicate event dropped"
                    );
                    continue;
                }
                seen.insert(unique_id.clone());
            }

            let previous_id = sequence_id;
            sequence_id = sequence_id.next();
            let event = SequencedEvent {
                sequence_id,
                previous_id,
                unique_id: pending.unique_id,
                created_at,
                payload: pending.payload,
            };
            records.push(EventRecord::encode(&event)?);
            if let Some(unique_id) = &event.unique_id {
                uniques.push(UniqueEventRecord {
                    unique_id: unique_id.clone(),
                    sequence_id,
                    created_at,
                });
            }
            admitted.push(event);
        }

        if admitted.is_empty() {
            return Ok(admitted);
        }

        if let Err(err) = self.store.append_batch(&records, &uniques) {
            tracing::error!(
                %err,
                first = %self.sequence_id.next(),
                count = admitted.len(),
                "batch rejected by event store"
            );
            return Err(err);
        }
        tracing::info!(
            first = %self.sequence_id.next(),
            last = %sequence_id,
            count = admitted.len(),
            "batch sequenced"
        );
        self.sequence_id = sequence_id;
        self.last_timestamp = created_at;
        Ok(admitted)
    }
}
