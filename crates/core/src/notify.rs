//! Outbound notification port

use tracing::debug;

use crate::error::Result;

/// A transactional email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Fire-and-forget mail delivery. Callers log failures and carry on.
pub trait Notifier: Send + Sync {
    fn send(&self, email: &Email) -> Result<()>;
}

/// Notifier used when no mail provider is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn send(&self, email: &Email) -> Result<()> {
        debug!(to = %email.to, subject = %email.subject, "Mail disabled, dropping email");
        Ok(())
    }
}

pub fn access_code_email(to: &str, name: &str, code: &str) -> Email {
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 20px; background-color: #f9f9f9;">
  <div style="max-width: 600px; margin: auto; background: #ffffff; padding: 20px; border-radius: 8px;">
    <h2 style="color: #4CAF50;">Payment Confirmed</h2>
    <p>Hi {name},</p>
    <p>Thank you for your payment. Your hostel room has been assigned successfully.</p>
    <p><strong>Here is your access code:</strong></p>
    <div style="font-size: 24px; font-weight: bold; margin: 16px 0;">{code}</div>
    <p>Please keep this code safe. It will be required for hostel access and verification.</p>
    <hr />
    <p style="font-size: 12px; color: #888;">If you have questions, contact the hostel administration.</p>
  </div>
</div>"#,
        name = escape_html(name),
        code = escape_html(code),
    );
    Email {
        to: to.to_string(),
        subject: "Payment Confirmed - Your Hostel Access Code".to_string(),
        html,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
