//! OAuth 1.0a (HMAC-SHA1, two-legged) request signing for the icon provider.
//!
//! The provider recomputes the signature server-side, so every byte matters:
//! percent-encoding is RFC 3986 (only `A-Z a-z 0-9 - . _ ~` left bare, space
//! as `%20`), parameters are sorted by encoded key then value, and the
//! signing key is `encode(secret) + "&"` (no token secret).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";
const NONCE_LEN: usize = 12;

/// RFC 3986 unreserved characters stay as-is; everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Consumer key/secret pair for the icon provider.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .finish()
    }
}

/// RFC 3986 percent-encoding.
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Encode and sort query parameters into `k=v&k=v` form.
///
/// Used both for the signature base string and for the request URL, so the
/// provider sees exactly what was signed.
pub fn encode_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the `Authorization` header value for a request, generating a fresh
/// nonce and timestamp.
pub fn sign(
    method: &str,
    url: &str,
    query_params: &[(String, String)],
    credentials: &OAuthCredentials,
) -> String {
    let nonce = generate_nonce();
    let timestamp = chrono::Utc::now().timestamp();
    sign_with(method, url, query_params, credentials, &nonce, timestamp)
}

/// Deterministic variant of [`sign`] with caller-supplied nonce and timestamp.
pub fn sign_with(
    method: &str,
    url: &str,
    query_params: &[(String, String)],
    credentials: &OAuthCredentials,
    nonce: &str,
    timestamp: i64,
) -> String {
    let mut oauth_params = oauth_protocol_params(credentials, nonce, timestamp);
    let signature = compute_signature(
        method,
        url,
        &oauth_params,
        query_params,
        &credentials.consumer_secret,
    );
    oauth_params.push(("oauth_signature".to_string(), signature));

    let header_parts: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect();

    format!("OAuth {}", header_parts.join(", "))
}

fn oauth_protocol_params(
    credentials: &OAuthCredentials,
    nonce: &str,
    timestamp: i64,
) -> Vec<(String, String)> {
    vec![
        (
            "oauth_consumer_key".to_string(),
            credentials.consumer_key.clone(),
        ),
        ("oauth_nonce".to_string(), nonce.to_string()),
        (
            "oauth_signature_method".to_string(),
            SIGNATURE_METHOD.to_string(),
        ),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
    ]
}

/// `METHOD&encode(url)&encode(sorted query)`
pub fn signature_base_string(
    method: &str,
    url: &str,
    oauth_params: &[(String, String)],
    query_params: &[(String, String)],
) -> String {
    let all_params: Vec<(String, String)> = oauth_params
        .iter()
        .chain(query_params.iter())
        .cloned()
        .collect();

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&encode_query(&all_params))
    )
}

fn compute_signature(
    method: &str,
    url: &str,
    oauth_params: &[(String, String)],
    query_params: &[(String, String)],
    consumer_secret: &str,
) -> String {
    let base_string = signature_base_string(method, url, oauth_params, query_params);
    let signing_key = format!("{}&", percent_encode(consumer_secret));

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(base_string.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
