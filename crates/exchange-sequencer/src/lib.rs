//! # exchange-sequencer
//!
//! Turns an unordered stream of candidate events into a gap-free, durable,
//! deduplicated sequence.
//!
//! - [`Sequencer`]: assigns `sequence_id`/`previous_id`, drops repeated
//!   idempotency keys, stamps a non-decreasing timestamp
//! - [`EventStore`]: the durable log contract
//! - [`MemoryEventStore`] / [`JournalEventStore`]: in-memory and file-backed
//!   stores
//! - [`Clock`]: the timestamp source
//!
//! ## Recovery
//!
//! ```text
//! JournalEventStore::open(path) -> Sequencer::new(store) -> recover() from last_event()
//! ```

pub mod clock;
pub mod journal;
pub mod sequencer;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use journal::JournalEventStore;
pub use sequencer::Sequencer;
pub use store::{EventStore, MemoryEventStore};
