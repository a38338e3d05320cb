//! Webhook signatures
//!
//! Paystack signs the raw request body with HMAC-SHA512 keyed by the
//! secret key and sends the hex digest in `x-paystack-signature`.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Hex HMAC-SHA512 of `body`
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature against `body`
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk_test_secret";
    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"T1"}}"#;

    #[test]
    fn test_sign_then_verify() {
        let sig = sign(SECRET, BODY).unwrap();
        assert_eq!(sig.len(), 128);
        assert!(verify(SECRET, BODY, &sig));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let sig = sign(SECRET, BODY).unwrap();
        assert!(!verify(SECRET, b"{\"event\":\"charge.success\"}", &sig));
        assert!(!verify("other_secret", BODY, &sig));
        assert!(!verify(SECRET, BODY, "not-hex"));
        assert!(!verify(SECRET, BODY, ""));
    }
}
