//! Restart behaviour of a sequencer backed by a journal file.

use exchange_sequencer::{EventStore, JournalEventStore, ManualClock, Sequencer};
use exchange_types::*;
use rust_decimal::Decimal;

fn order(user: u64, price: i64) -> EventPayload {
    EventPayload::OrderRequest(OrderRequest {
        user_id: UserId(user),
        direction: Direction::Buy,
        price: Decimal::new(price, 0),
        quantity: Decimal::ONE,
        ref_id: Some(format!("ref-{user}-{price}")),
        created_at: 0,
    })
}

#[test]
fn restart_resumes_sequence_and_dedup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.journal");

    let first_batch = {
        let store = JournalEventStore::open(&path).unwrap();
        let mut seq = Sequencer::with_clock(store, ManualClock::new(10_000)).unwrap();
        let out = seq
            .sequence(vec![
                PendingEvent::new(order(2, 100)).with_unique_id("req-1"),
                PendingEvent::new(order(3, 101)),
            ])
            .unwrap();
        assert_eq!(out.len(), 2);
        out
    };

    // The clock is behind the journal after the restart.
    let store = JournalEventStore::open(&path).unwrap();
    let mut seq = Sequencer::with_clock(store, ManualClock::new(9_000)).unwrap();
    assert_eq!(seq.max_sequence_id().unwrap(), SequenceId(2));
    assert_eq!(seq.last_timestamp(), 10_000);

    let out = seq
        .sequence(vec![
            PendingEvent::new(order(2, 100)).with_unique_id("req-1"),
            PendingEvent::new(order(4, 102)).with_unique_id("req-2"),
        ])
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].sequence_id, SequenceId(3));
    assert_eq!(out[0].previous_id, SequenceId(2));
    assert_eq!(out[0].created_at, 10_000);

    let records = seq.store().read_after(SequenceId::ZERO, 100).unwrap();
    let decoded: Vec<SequencedEvent> = records.iter().map(|r| r.decode().unwrap()).collect();
    assert_eq!(&decoded[..2], &first_batch[..]);
    assert_eq!(decoded[2], out[0]);
    for pair in decoded.windows(2) {
        assert_eq!(pair[1].previous_id, pair[0].sequence_id);
    }
}

#[test]
fn read_after_pages_through_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = JournalEventStore::open(dir.path().join("events.journal")).unwrap();
    let mut seq = Sequencer::with_clock(store, ManualClock::new(1)).unwrap();
    for batch in 0..5 {
        let events = (0..4)
            .map(|i| PendingEvent::new(order(2, 100 + batch * 4 + i)))
            .collect();
        seq.sequence(events).unwrap();
    }

    let mut cursor = SequenceId::ZERO;
    let mut seen = 0;
    loop {
        let page = seq.store().read_after(cursor, 3).unwrap();
        let Some(last) = page.last() else { break };
        cursor = last.sequence_id;
        seen += page.len();
    }
    assert_eq!(seen, 20);
    assert_eq!(cursor, SequenceId(20));
}
