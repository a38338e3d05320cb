//! Hostel Core Library
//!
//! Payment ledger, resident billing, calendar-year rollover and storage for
//! the hostel platform.

pub mod archive;
pub mod billing;
pub mod error;
pub mod gateway;
pub mod invariants;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod rollover;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use billing::{BillingPolicy, Removal};
pub use error::{Error, ErrorKind, GatewayError, Result};
pub use gateway::{PaymentGateway, Verification};
pub use ledger::{Ledger, PaymentRequest, WebhookOutcome};
pub use models::*;
pub use notify::{DisabledNotifier, Email, Notifier};
pub use rollover::RolloverSummary;
pub use storage::{
    CalendarYearRepository, Database, HostelRepository, PaymentRepository, ResidentRepository,
    RoomRepository, Storage, Stores,
};
