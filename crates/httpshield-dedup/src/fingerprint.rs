//! Request fingerprinting.

use http::Method;
use sha2::{Digest, Sha256};
use url::Url;

/// Computes the dedup fingerprint for a request.
///
/// The fingerprint is the hex-encoded SHA-256 of `method:url:body`. An
/// absent body hashes identically to an empty one, so `GET /` with no body
/// and `GET /` with a zero-length body coalesce.
pub fn fingerprint(method: &Method, url: &Url, body: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(url.as_str().as_bytes());
    hasher.update(b":");
    if let Some(body) = body {
        hasher.update(body);
    }
    hex::encode(hasher.finalize())
}
