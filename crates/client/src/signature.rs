//! Request signing for the marketplace API.
//!
//! Every call carries a `Timestamp` header (epoch milliseconds) and an
//! `X-Signature` header: the standard base64 HMAC-SHA256 of
//! `METHOD|path|timestamp|`, where `path` is the request URL with the API host
//! stripped and without the query string.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Errors from request signing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SigningError {
    /// The key was rejected by the MAC implementation.
    #[error("invalid signing key")]
    InvalidKey,
}

/// Compute the `X-Signature` value for a request.
///
/// Pure function: identical inputs always produce the same signature.
pub fn sign(key: &[u8], method: &str, path: &str, timestamp: &str) -> Result<String, SigningError> {
    let message = format!("{}|{}|{}|", method.to_uppercase(), path, timestamp);
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidKey)?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// The part of `url` that gets signed: the API host prefix is stripped.
///
/// URLs on other hosts are signed whole.
pub fn signed_path<'a>(url: &'a str, api_url: &str) -> &'a str {
    let url = url.split_once('?').map_or(url, |(path, _)| path);
    url.strip_prefix(api_url.trim_end_matches('/')).unwrap_or(url)
}
