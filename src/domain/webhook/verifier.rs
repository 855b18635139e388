//! Subscription webhook signature verification.
//!
//! The provider signs the raw body with HMAC-SHA256 and sends the lowercase
//! hex digest in the `signature` header.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::WebhookError;

/// Header carrying the hex HMAC.
pub const SIGNATURE_HEADER: &str = "signature";

/// Verifier for subscription webhook signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies `header` against the exact bytes of `body`.
    ///
    /// # Errors
    ///
    /// - `MissingSignature` - header absent or blank
    /// - `InvalidSignature` - not hex, or does not match
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), WebhookError> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(WebhookError::MissingSignature)?;

        let provided = hex::decode(header).map_err(|_| WebhookError::InvalidSignature)?;
        let expected = self.compute_signature(body)?;

        if !constant_time_compare(&expected, &provided) {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }

    fn compute_signature(&self, body: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(body);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Hex SHA-256 of a raw body, used to recognise exact redeliveries.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes the header value a sender would attach, for test fixtures.
#[cfg(test)]
pub fn sign_for_tests(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
