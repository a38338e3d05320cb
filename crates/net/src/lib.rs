//! Hostel Network Library
//!
//! Outbound HTTP collaborators for the hostel core: the Paystack payment
//! gateway and a transactional mailer.
//!
//! # Usage
//!
//! ```ignore
//! let gateway = PaystackClient::new(PaystackConfig::new(secret_key))?;
//! let ledger = Ledger::new(&gateway, &DisabledNotifier, BillingPolicy::default());
//! let checkout = ledger.initiate_payment(&mut db, &request)?;
//! ```

pub mod error;
pub mod mailer;
pub mod paystack;
pub mod protocol;
pub mod signature;

pub use error::{Error, Result};
pub use mailer::{HttpMailer, MailConfig};
pub use paystack::{PaystackClient, PaystackConfig};
pub use signature::SIGNATURE_HEADER;
