//! Paystack wire types
//!
//! Every Paystack response is wrapped in a `{status, message, data}`
//! envelope. Only the fields the ledger reads are modelled.

use serde::{Deserialize, Serialize};

use hostel_core::{Checkout, Verification};

/// Response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// The payload of a successful envelope, or the provider's message
    pub fn into_data(self) -> std::result::Result<T, String> {
        match (self.status, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) if self.message.is_empty() => Err("missing data".to_string()),
            _ => Err(self.message),
        }
    }
}

/// Body of `POST /transaction/initialize`
#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest<'a> {
    pub email: &'a str,
    /// Minor units
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeData {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

impl From<InitializeData> for Checkout {
    fn from(data: InitializeData) -> Self {
        Checkout {
            checkout_url: data.authorization_url,
            reference: data.reference,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyData {
    pub status: String,
    pub reference: String,
    #[serde(default)]
    pub amount: i64,
    pub channel: Option<String>,
    pub gateway_response: Option<String>,
}

impl From<VerifyData> for Verification {
    fn from(data: VerifyData) -> Self {
        Verification {
            status: data.status,
            channel: data.channel,
        }
    }
}

/// Error body; Paystack omits `data` on failures
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_envelope() {
        let json = r#"{
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/abc",
                "access_code": "abc",
                "reference": "T123"
            }
        }"#;
        let envelope: Envelope<InitializeData> = serde_json::from_str(json).unwrap();
        let checkout: Checkout = envelope.into_data().unwrap().into();
        assert_eq!(checkout.checkout_url, "https://checkout.paystack.com/abc");
        assert_eq!(checkout.reference, "T123");
    }

    #[test]
    fn test_verify_envelope_keeps_channel() {
        let json = r#"{
            "status": true,
            "message": "Verification successful",
            "data": {
                "status": "success",
                "reference": "T123",
                "amount": 70000,
                "channel": "mobile_money",
                "gateway_response": "Approved",
                "customer": {"email": "a@b.co"}
            }
        }"#;
        let envelope: Envelope<VerifyData> = serde_json::from_str(json).unwrap();
        let verification: Verification = envelope.into_data().unwrap().into();
        assert!(verification.is_success());
        assert_eq!(verification.channel.as_deref(), Some("mobile_money"));
    }

    #[test]
    fn test_failed_envelope_surfaces_message() {
        let json = r#"{"status": false, "message": "Transaction reference not found"}"#;
        let envelope: Envelope<VerifyData> = serde_json::from_str(json).unwrap();
        assert_eq!(
            envelope.into_data().unwrap_err(),
            "Transaction reference not found"
        );
    }

    #[test]
    fn test_initialize_request_omits_missing_callback() {
        let body = InitializeRequest {
            email: "a@b.co",
            amount: 70000,
            callback_url: None,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"email":"a@b.co","amount":70000}"#
        );
    }
}
