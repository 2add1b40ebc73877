//! Order Management System (OMS)
//!
//! Leg bookkeeping for the straddle engine:
//! - Broker and feed capabilities the strategy consumes
//! - Pending-order tracker gating phase transitions
//! - Paper venue with tick-level fill detection

pub mod broker;
pub mod execution;
pub mod paper;
pub mod tracker;
pub mod types;

// Re-export core types
pub use broker::{
    Broker, BrokerError, BrokerEvent, BrokerResult, MarketFeed, UnderlyingDetails, Venue,
};
pub use paper::PaperVenue;
pub use tracker::{PendingOrderTracker, PendingSet, TrackerError};
pub use types::{ExitKind, ExitOrder, Leg, LegId, OrderState};
