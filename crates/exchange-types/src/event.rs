//! Event model: what enters the sequencer, what leaves it, and what is
//! written to the durable log.
//!
//! ```text
//! PendingEvent --sequence()--> SequencedEvent --encode()--> EventRecord (+ UniqueEventRecord)
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Asset, Direction, OrderId, Result, SequenceId, UserId};

/// Request to place a limit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub direction: Direction,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Correlates the eventual result with the originating request.
    pub ref_id: Option<String>,
    /// Client-side submission time (ms).
    pub created_at: i64,
}

/// Request to cancel one of the user's open orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancel {
    pub user_id: UserId,
    pub ref_order_id: OrderId,
    pub ref_id: Option<String>,
    pub created_at: i64,
}

/// Request to move available funds between two users.
///
/// With `sufficient = false` the source may go negative; this is how the
/// debt account funds deposits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_user: UserId,
    pub to_user: UserId,
    pub asset: Asset,
    pub amount: Decimal,
    pub sufficient: bool,
    pub ref_id: Option<String>,
    pub created_at: i64,
}

/// The logical content of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    OrderRequest(OrderRequest),
    OrderCancel(OrderCancel),
    Transfer(TransferRequest),
}

impl EventPayload {
    #[must_use]
    pub fn ref_id(&self) -> Option<&str> {
        match self {
            Self::OrderRequest(e) => e.ref_id.as_deref(),
            Self::OrderCancel(e) => e.ref_id.as_deref(),
            Self::Transfer(e) => e.ref_id.as_deref(),
        }
    }

    /// Attach the correlation id the result will be published under.
    pub fn set_ref_id(&mut self, ref_id: impl Into<String>) {
        let slot = match self {
            Self::OrderRequest(e) => &mut e.ref_id,
            Self::OrderCancel(e) => &mut e.ref_id,
            Self::Transfer(e) => &mut e.ref_id,
        };
        *slot = Some(ref_id.into());
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderRequest(_) => "ORDER_REQUEST",
            Self::OrderCancel(_) => "ORDER_CANCEL",
            Self::Transfer(_) => "TRANSFER",
        }
    }
}

/// A candidate event waiting to be sequenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Optional idempotency key; a key seen before drops the event.
    pub unique_id: Option<String>,
    pub payload: EventPayload,
}

impl PendingEvent {
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            unique_id: None,
            payload,
        }
    }

    #[must_use]
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }
}

/// An event admitted by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub sequence_id: SequenceId,
    /// The sequence id immediately preceding this one.
    pub previous_id: SequenceId,
    pub unique_id: Option<String>,
    /// Sequencer timestamp (ms), non-decreasing across the sequencer's life.
    pub created_at: i64,
    pub payload: EventPayload,
}

#[derive(Serialize)]
struct EventBodyRef<'a> {
    unique_id: Option<&'a str>,
    #[serde(flatten)]
    payload: &'a EventPayload,
}

#[derive(Deserialize)]
struct EventBody {
    unique_id: Option<String>,
    #[serde(flatten)]
    payload: EventPayload,
}

/// Durable form of a sequenced event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence_id: SequenceId,
    pub previous_id: SequenceId,
    pub created_at: i64,
    /// Opaque serialized type tag + payload.
    pub data: String,
}

impl EventRecord {
    /// Serialize a sequenced event into its durable record.
    pub fn encode(event: &SequencedEvent) -> Result<Self> {
        let body = EventBodyRef {
            unique_id: event.unique_id.as_deref(),
            payload: &event.payload,
        };
        Ok(Self {
            sequence_id: event.sequence_id,
            previous_id: event.previous_id,
            created_at: event.created_at,
            data: serde_json::to_string(&body)?,
        })
    }

    /// Rebuild the sequenced event held by this record.
    pub fn decode(&self) -> Result<SequencedEvent> {
        let body: EventBody = serde_json::from_str(&self.data)?;
        Ok(SequencedEvent {
            sequence_id: self.sequence_id,
            previous_id: self.previous_id,
            unique_id: body.unique_id,
            created_at: self.created_at,
            payload: body.payload,
        })
    }
}

/// Durable marker that an idempotency key has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueEventRecord {
    pub unique_id: String,
    pub sequence_id: SequenceId,
    pub created_at: i64,
}
