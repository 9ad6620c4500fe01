//! Signed URL tokens
//!
//! A token binds one HTTP method, one object name and one expiry instant:
//!
//! ```text
//! signature = hex(HMAC-SHA256(secret, "METHOD:filename:expires"))
//! ```
//!
//! Uploads sign the empty filename because the stored name does not exist
//! until the upload has finished.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a signed request was refused. Never sent to clients.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("expires or signature parameter missing")]
    MissingParameters,
    #[error("expires is not a base-10 integer: {0:?}")]
    MalformedExpiry(String),
    #[error("token expired at {expires}, now {now}")]
    Expired { expires: i64, now: i64 },
    #[error("signature mismatch")]
    SignatureMismatch,
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("secret key must not be empty")]
    EmptySecret,
    #[error("secret key rejected by HMAC")]
    InvalidKey,
}

/// Signs and verifies URL tokens with the process-wide shared secret.
#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: &str) -> Result<Self, SignerError> {
        if secret.is_empty() {
            return Err(SignerError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignerError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// The string the HMAC is computed over.
    pub fn canonical_message(method: &str, filename: &str, expires: i64) -> String {
        format!("{}:{}:{}", method, filename, expires)
    }

    /// Lowercase hex HMAC-SHA256 of the canonical message.
    pub fn sign(&self, method: &str, filename: &str, expires: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(Self::canonical_message(method, filename, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Query string carrying a token, without the leading `?`.
    pub fn signed_query(&self, method: &str, filename: &str, expires: i64) -> String {
        format!(
            "expires={}&signature={}",
            expires,
            self.sign(method, filename, expires)
        )
    }

    /// Ready-to-use URL under `base_url`. The path segment is percent-encoded;
    /// the signature covers the raw name, which is what the router decodes
    /// back to. An empty `filename` addresses the upload route.
    pub fn signed_url(&self, base_url: &str, method: &str, filename: &str, expires: i64) -> String {
        let base = base_url.trim_end_matches('/');
        let query = self.signed_query(method, filename, expires);
        if filename.is_empty() {
            format!("{}/images?{}", base, query)
        } else {
            format!("{}/images/{}?{}", base, urlencoding::encode(filename), query)
        }
    }

    /// Checks a request's token against `now` (Unix seconds).
    ///
    /// Empty parameters count as absent. A token is still valid in the
    /// second named by `expires`; it is refused only once `now > expires`.
    /// Returns the parsed expiry on success.
    pub fn verify(
        &self,
        method: &str,
        filename: &str,
        expires: Option<&str>,
        signature: Option<&str>,
        now: i64,
    ) -> Result<i64, Rejection> {
        let (expires_raw, signature) = match (expires, signature) {
            (Some(e), Some(s)) if !e.is_empty() && !s.is_empty() => (e, s),
            _ => return Err(Rejection::MissingParameters),
        };

        let expires: i64 = expires_raw
            .parse()
            .map_err(|_| Rejection::MalformedExpiry(expires_raw.to_string()))?;

        if now > expires {
            return Err(Rejection::Expired { expires, now });
        }

        let expected = self.sign(method, filename, expires);
        if !secure_compare(&expected, signature) {
            return Err(Rejection::SignatureMismatch);
        }
        Ok(expires)
    }
}

/// Constant-time string equality. Only the length comparison short-circuits.
fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
