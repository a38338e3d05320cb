//! Payment gateway port
//!
//! The ledger talks to the provider only through [`PaymentGateway`]. The
//! HTTP implementation lives in `hostel-net`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, GatewayError, Result};
use crate::models::Checkout;

/// Provider status string for a settled charge
pub const STATUS_SUCCESS: &str = "success";

/// The provider's authoritative view of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub status: String,
    /// Payment channel (card, mobile_money, bank, ...)
    pub channel: Option<String>,
}

impl Verification {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

pub trait PaymentGateway: Send + Sync {
    /// Create a checkout for `amount_minor` (minor currency units) billed to `email`
    fn initialize_transaction(
        &self,
        email: &str,
        amount_minor: i64,
    ) -> std::result::Result<Checkout, GatewayError>;

    fn verify_transaction(&self, reference: &str) -> std::result::Result<Verification, GatewayError>;

    /// Check the HMAC signature the provider attached to a webhook body
    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool;
}

/// Convert a major-unit amount into the provider's minor unit.
///
/// Sub-cent amounts are rejected rather than rounded.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    let minor = amount * Decimal::ONE_HUNDRED;
    if !minor.fract().is_zero() {
        return Err(Error::Validation(format!(
            "Amount {amount} has more than two decimal places"
        )));
    }
    minor
        .to_i64()
        .ok_or_else(|| Error::Validation(format!("Amount {amount} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(dec!(700)).unwrap(), 70_000);
        assert_eq!(to_minor_units(dec!(700.5)).unwrap(), 70_050);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
        assert!(matches!(
            to_minor_units(dec!(10.005)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_only_success_counts() {
        let v = Verification {
            status: "abandoned".into(),
            channel: None,
        };
        assert!(!v.is_success());
        let v = Verification {
            status: STATUS_SUCCESS.into(),
            channel: Some("card".into()),
        };
        assert!(v.is_success());
    }
}
