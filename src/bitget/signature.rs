use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Sign `timestamp + METHOD + request_path + body` with the API secret.
///
/// `request_path` includes the query string (`/path?a=b`) for GET requests.
/// The signature is the base64 encoding of the raw HMAC-SHA256 digest.
pub fn sign_request(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String> {
    let prehash = format!("{}{}{}{}", timestamp, method.to_uppercase(), request_path, body);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signature(e.to_string()))?;
    mac.update(prehash.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign_request("secret", "1700000000000", "GET", "/api/v2/spot/market/tickers?symbol=BTCUSDT", "").unwrap();
        let b = sign_request("secret", "1700000000000", "get", "/api/v2/spot/market/tickers?symbol=BTCUSDT", "").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "YxnbNKTsIFPpV/H4+zrE59REE7AxsmvvEAqy00Pl3bk=");
    }

    #[test]
    fn test_signature_covers_every_component() {
        let base = sign_request("secret", "1", "POST", "/p", "{}").unwrap();
        assert_ne!(base, sign_request("other", "1", "POST", "/p", "{}").unwrap());
        assert_ne!(base, sign_request("secret", "2", "POST", "/p", "{}").unwrap());
        assert_ne!(base, sign_request("secret", "1", "GET", "/p", "{}").unwrap());
        assert_ne!(base, sign_request("secret", "1", "POST", "/q", "{}").unwrap());
        assert_ne!(base, sign_request("secret", "1", "POST", "/p", "").unwrap());
    }

    #[test]
    fn test_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let sig = sign_request("key", "The quick brown fox jumps over the lazy dog", "", "", "").unwrap();
        assert_eq!(sig, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }
}
