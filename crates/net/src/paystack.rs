//! Paystack REST client
//!
//! Blocking client; the app calls it from `spawn_blocking` workers.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};

use hostel_core::{Checkout, GatewayError, PaymentGateway, Verification};

use crate::error::{Error, Result};
use crate::protocol::{Envelope, ErrorBody, InitializeData, InitializeRequest, VerifyData};
use crate::signature;

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
    /// Where Paystack redirects the payer after checkout
    pub callback_url: Option<String>,
}

impl PaystackConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: secret_key.into(),
            timeout: DEFAULT_TIMEOUT,
            callback_url: None,
        }
    }
}

pub struct PaystackClient {
    config: PaystackConfig,
    client: Client,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Result<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(Error::Config("Paystack secret key is not set".into()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Verify endpoint with the reference as a single escaped path segment
    fn verify_url(&self, reference: &str) -> Result<Url> {
        if matches!(reference.trim(), "" | "." | "..") {
            return Err(Error::InvalidReference(reference.to_string()));
        }
        let mut url = Url::parse(&self.url("/transaction/verify"))
            .map_err(|e| Error::Config(format!("invalid Paystack base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("Paystack base URL cannot take a path".into()))?
            .push(reference);
        Ok(url)
    }

    #[instrument(skip(self))]
    pub fn initialize(&self, email: &str, amount_minor: i64) -> Result<Checkout> {
        let body = InitializeRequest {
            email,
            amount: amount_minor,
            callback_url: self.config.callback_url.as_deref(),
        };
        let resp = self
            .client
            .post(self.url("/transaction/initialize"))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()?;
        let data: InitializeData = read_envelope(resp)?;
        debug!(reference = %data.reference, "Transaction initialized");
        Ok(data.into())
    }

    #[instrument(skip(self))]
    pub fn verify(&self, reference: &str) -> Result<Verification> {
        let resp = self
            .client
            .get(self.verify_url(reference)?)
            .bearer_auth(&self.config.secret_key)
            .send()?;
        let data: VerifyData = read_envelope(resp)?;
        debug!(reference = %data.reference, status = %data.status, "Transaction verified");
        Ok(data.into())
    }
}

fn read_envelope<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let text = resp.text()?;
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        });
    }
    let envelope: Envelope<T> =
        serde_json::from_str(&text).map_err(|e| Error::Decode(e.to_string()))?;
    envelope.into_data().map_err(|message| Error::Status {
        status: status.as_u16(),
        message,
    })
}

impl PaymentGateway for PaystackClient {
    fn initialize_transaction(
        &self,
        email: &str,
        amount_minor: i64,
    ) -> std::result::Result<Checkout, GatewayError> {
        self.initialize(email, amount_minor).map_err(|e| {
            error!(error = %e, "Paystack initialization failed");
            e.into()
        })
    }

    fn verify_transaction(&self, reference: &str) -> std::result::Result<Verification, GatewayError> {
        self.verify(reference).map_err(|e| {
            error!(reference, error = %e, "Paystack verification failed");
            e.into()
        })
    }

    fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        signature::verify(&self.config.secret_key, raw_body, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn unreachable_client() -> PaystackClient {
        // bind then drop so the port refuses connections
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        PaystackClient::new(PaystackConfig {
            base_url: format!("http://127.0.0.1:{port}/"),
            secret_key: "sk_test".into(),
            timeout: Duration::from_secs(2),
            callback_url: None,
        })
        .unwrap()
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            PaystackClient::new(PaystackConfig::new("  ")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = unreachable_client();
        assert!(client.url("/transaction/initialize").ends_with("/transaction/initialize"));
        assert!(!client.url("/x").contains("//x"));
    }

    #[test]
    fn test_verify_reference_stays_in_one_segment() {
        let client = PaystackClient::new(PaystackConfig::new("sk_test")).unwrap();
        let url = client.verify_url("ref-123").unwrap();
        assert_eq!(url.as_str(), "https://api.paystack.co/transaction/verify/ref-123");

        let url = client.verify_url("x/../../customer?perPage=100").unwrap();
        assert_eq!(url.path_segments().unwrap().count(), 3);
        assert!(url.path().starts_with("/transaction/verify/x%2F"));
        assert!(url.query().is_none());

        assert!(matches!(client.verify_url(".."), Err(Error::InvalidReference(_))));
        let err = client.verify_transaction("").unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { status: 400, .. }));
    }

    #[test]
    fn test_connection_refused_is_retryable_transport() {
        let client = unreachable_client();
        let err = client.initialize_transaction("a@b.co", 70_000).unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        let core: hostel_core::Error = err.into();
        assert!(core.is_retryable());
    }

    #[test]
    fn test_webhook_signature_uses_secret_key() {
        let client = PaystackClient::new(PaystackConfig::new("sk_live_abc")).unwrap();
        let body = br#"{"event":"charge.success"}"#;
        let sig = signature::sign("sk_live_abc", body).unwrap();
        assert!(client.verify_webhook_signature(body, &sig));
        assert!(!client.verify_webhook_signature(body, "deadbeef"));
    }
}
