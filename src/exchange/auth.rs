//! CLOB API Authentication
//!
//! Implements the L2 HMAC-SHA256 header signing used on authenticated
//! REST calls. The API secret is URL-safe base64; so is the signature.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;

use super::error::{ExchangeError, ExchangeResult};

type HmacSha256 = Hmac<Sha256>;

/// L2 API credentials plus the funding address they belong to
#[derive(Clone)]
pub struct ClobAuth {
    address: String,
    api_key: String,
    api_secret: String,
    passphrase: String,
}

impl ClobAuth {
    pub fn new(address: String, api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            address,
            api_key,
            api_secret,
            passphrase,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Funding (proxy) address, also the `user` for position queries
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign `timestamp + method + path + body`
    pub fn sign(&self, timestamp: u64, method: &str, path: &str, body: &str) -> ExchangeResult<String> {
        let secret = URL_SAFE
            .decode(self.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Auth(format!("secret is not base64: {}", e)))?;
        let message = format!("{}{}{}{}", timestamp, method.to_uppercase(), path, body);

        let mut mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| ExchangeError::Auth(e.to_string()))?;
        mac.update(message.as_bytes());
        Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
    }

    /// Build the five POLY_* headers for one request
    pub fn headers(&self, method: &str, path: &str, body: &str) -> ExchangeResult<HeaderMap> {
        let timestamp = Self::timestamp_secs();
        let signature = self.sign(timestamp, method, path, body)?;

        let mut headers = HeaderMap::new();
        headers.insert("POLY_ADDRESS", header_value(&self.address)?);
        headers.insert("POLY_SIGNATURE", header_value(&signature)?);
        headers.insert("POLY_TIMESTAMP", header_value(&timestamp.to_string())?);
        headers.insert("POLY_API_KEY", header_value(&self.api_key)?);
        headers.insert("POLY_PASSPHRASE", header_value(&self.passphrase)?);
        Ok(headers)
    }

    fn timestamp_secs() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

fn header_value(raw: &str) -> ExchangeResult<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| ExchangeError::Auth(e.to_string()))
}

impl std::fmt::Debug for ClobAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClobAuth")
            .field("address", &self.address)
            .field("api_key", &format!("{}...", self.api_key.chars().take(8).collect::<String>()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_auth() -> ClobAuth {
        ClobAuth::new(
            "0x0000000000000000000000000000000000000001".to_string(),
            "test_key_123456".to_string(),
            URL_SAFE.encode(b"test_secret"),
            "test_pass".to_string(),
        )
    }

    #[test]
    fn test_sign_is_deterministic() {
        let auth = test_auth();
        let a = auth.sign(1_700_000_000, "post", "/order", r#"{"a":1}"#).unwrap();
        let b = auth.sign(1_700_000_000, "POST", "/order", r#"{"a":1}"#).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, auth.sign(1_700_000_001, "POST", "/order", r#"{"a":1}"#).unwrap());
        assert!(URL_SAFE.decode(a.as_bytes()).is_ok());
    }

    #[test]
    fn test_bad_secret_is_auth_error() {
        let auth = ClobAuth::new("0x1".into(), "k".into(), "not base64!!".into(), "p".into());
        assert!(matches!(auth.sign(1, "GET", "/", ""), Err(ExchangeError::Auth(_))));
    }

    #[test]
    fn test_debug_masks_key_on_char_boundary() {
        let auth = ClobAuth::new("0x1".into(), "ключ-api-ключ".into(), "c2VjcmV0".into(), "p".into());
        let shown = format!("{:?}", auth);
        assert!(shown.contains("ключ-api..."));
        assert!(!shown.contains("ключ-api-"));
        assert!(!shown.contains("c2VjcmV0"));
    }

    #[test]
    fn test_headers_present() {
        let headers = test_auth().headers("GET", "/data/orders", "").unwrap();
        for name in ["POLY_ADDRESS", "POLY_SIGNATURE", "POLY_TIMESTAMP", "POLY_API_KEY", "POLY_PASSPHRASE"] {
            assert!(headers.contains_key(name), "missing {}", name);
        }
    }
}
