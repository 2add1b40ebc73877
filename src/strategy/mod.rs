//! Hedged straddle strategy
//!
//! One group = two bought hedge wings plus a sold ATM call and put. Entries
//! are limit orders priced with market protection; each short leg gets a
//! stop-limit from the time-of-day stop-loss table. When one short exits, the
//! other short's stop is moved to its entry price.
//!
//! The phase machine:
//!
//! ```text
//! LIVE ──bar──▶ PLACING_ORDERS ──tracker drained──▶ ENTERED / LIVE
//!                     ▲                                  │
//!                     └──────── stop sync / re-exit ─────┘
//! any ──exit time──▶ SQUARING_OFF ──tracker drained──▶ EXITED
//! ```

mod entry;
mod exit;
pub mod session;
mod straddle;
mod sync;

pub use session::{LegRole, Phase, SessionContext, StraddleGroup};
pub use straddle::StraddleStrategy;
