//! HMAC-SHA-1 verification of the opaque `/<digest>/<hex-url>` path segments.
//!
//! Wire-compatible with the sibling signer: `digest = hex(HMAC_SHA1(secret, url_bytes))`.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

use crate::hex;

type HmacSha1 = Hmac<Sha1>;

/// The request's signature did not match, or the request could not even be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Bad signature")]
pub struct BadSignature;

/// Verifies `received_digest` against the HMAC-SHA-1 of the URL encoded by `encoded_url`.
///
/// On success, returns the original URL as a `String`. Any failure along the
/// way — malformed hex, non-UTF-8 bytes, or a MAC mismatch — collapses into
/// the single [`BadSignature`] error, matching `spec.md` §4.2's "on mismatch
/// or decode failure, signal bad-signature".
pub fn verify(secret: &[u8], received_digest: &str, encoded_url: &str) -> Result<String, BadSignature> {
    let url_bytes = hex::decode(encoded_url).map_err(|_| BadSignature)?;
    let url = String::from_utf8(url_bytes).map_err(|_| BadSignature)?;

    let received_bytes = hex::decode(received_digest).map_err(|_| BadSignature)?;

    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts a key of any length");
    mac.update(url.as_bytes());
    mac.verify_slice(&received_bytes).map_err(|_| BadSignature)?;

    Ok(url)
}

/// Computes the 40-character lowercase hex HMAC-SHA-1 digest for `url`, as a signer would.
pub fn sign(secret: &[u8], url: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts a key of any length");
    mac.update(url.as_bytes());
    hex::encode(&mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"myVerySecretSecret";

    #[test]
    fn round_trip_law_holds_for_any_secret_and_url() {
        for url in ["http://example.com/index.png", "https://example.com/a/b?c=d", ""] {
            let digest = sign(SECRET, url);
            let encoded = hex::encode(url.as_bytes());
            assert_eq!(verify(SECRET, &digest, &encoded).unwrap(), url);
        }
    }

    #[test]
    fn wrong_secret_is_bad_signature() {
        let url = "http://example.com/index.png";
        let digest = sign(b"invalid", url);
        let encoded = hex::encode(url.as_bytes());
        assert_eq!(verify(SECRET, &digest, &encoded).unwrap_err(), BadSignature);
    }

    #[test]
    fn malformed_hex_is_bad_signature() {
        assert!(verify(SECRET, "zz", "zz").is_err());
    }

    #[test]
    fn digest_is_forty_lowercase_hex_chars() {
        let digest = sign(SECRET, "http://example.com/index.png");
        assert_eq!(digest.len(), 40);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
