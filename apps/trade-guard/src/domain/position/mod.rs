//! Position Bounded Context
//!
//! The position aggregate, its lifecycle transition table and the
//! append-only trade journal entries produced by every transition.
//!
//! ```text
//! PENDING_OPEN ──fill──▶ OPEN ──close accepted──▶ PENDING_CLOSE ──fill──▶ CLOSED
//!      │                   ▲                            │
//!      └─fail/timeout─▶ discarded                       └─fail/timeout─▶ OPEN
//! ```

mod aggregate;
mod errors;
mod state_machine;
mod trade_record;
mod value_objects;

pub use aggregate::{ExchangePosition, Position};
pub use errors::PositionError;
pub use state_machine::PositionStateMachine;
pub use trade_record::{TradeAction, TradeRecord, TradeSource};
pub use value_objects::{OrderSide, PositionSide, PositionState};
