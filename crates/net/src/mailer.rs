//! Transactional mail over an HTTP API (Brevo v3 shaped)

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{info, instrument};

use hostel_core::{Email, Notifier};

use crate::error::{Error, Result};

pub const DEFAULT_MAIL_API: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
}

pub struct HttpMailer {
    config: MailConfig,
    client: Client,
}

#[derive(Serialize)]
struct Sender<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct Recipient<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Payload<'a> {
    sender: Sender<'a>,
    to: Vec<Recipient<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("Mail API key is not set".into()));
        }
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { config, client })
    }

    fn payload<'a>(&'a self, email: &'a Email) -> Payload<'a> {
        Payload {
            sender: Sender {
                name: &self.config.sender_name,
                email: &self.config.sender_email,
            },
            to: vec![Recipient { email: &email.to }],
            subject: &email.subject,
            html_content: &email.html,
        }
    }

    #[instrument(skip(self, email), fields(to = %email.to))]
    pub fn deliver(&self, email: &Email) -> Result<()> {
        let resp = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .json(&self.payload(email))
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }
        info!(subject = %email.subject, "Email sent");
        Ok(())
    }
}

impl Notifier for HttpMailer {
    fn send(&self, email: &Email) -> hostel_core::Result<()> {
        self.deliver(email)
            .map_err(|e| hostel_core::Error::Notification(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailConfig {
        MailConfig {
            api_url: DEFAULT_MAIL_API.into(),
            api_key: "key".into(),
            sender_email: "noreply@hostel.dev".into(),
            sender_name: "Hostel".into(),
        }
    }

    #[test]
    fn test_payload_shape() {
        let mailer = HttpMailer::new(config()).unwrap();
        let email = Email {
            to: "ama@example.com".into(),
            subject: "Payment Confirmed".into(),
            html: "<p>hi</p>".into(),
        };
        let json = serde_json::to_value(mailer.payload(&email)).unwrap();
        assert_eq!(json["sender"]["email"], "noreply@hostel.dev");
        assert_eq!(json["to"][0]["email"], "ama@example.com");
        assert_eq!(json["htmlContent"], "<p>hi</p>");
    }

    #[test]
    fn test_missing_key_rejected() {
        let mut cfg = config();
        cfg.api_key = String::new();
        assert!(matches!(HttpMailer::new(cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_send_failure_is_notification_error() {
        let mut cfg = config();
        cfg.api_url = "http://127.0.0.1:1/v3/smtp/email".into();
        let mailer = HttpMailer::new(cfg).unwrap();
        let email = Email {
            to: "a@b.co".into(),
            subject: "s".into(),
            html: String::new(),
        };
        assert!(matches!(
            mailer.send(&email),
            Err(hostel_core::Error::Notification(_))
        ));
    }
}
