//! AWS Signature Version 4 for form-encoded Query API POSTs.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::types::Credentials;

pub(crate) const SERVICE: &str = "ec2";
pub(crate) const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Everything that goes into one signature.
pub(crate) struct SigningInput<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub body: &'a str,
    pub now: DateTime<Utc>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the per-day signing key.
pub(crate) fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Returns the headers to attach to the request, in lowercase.
pub(crate) fn sign(input: &SigningInput<'_>) -> Vec<(&'static str, String)> {
    let amz_date = input.now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = input.now.format("%Y%m%d").to_string();

    let mut canonical_headers = vec![
        ("content-type", CONTENT_TYPE.to_string()),
        ("host", input.host.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = &input.credentials.session_token {
        canonical_headers.push(("x-amz-security-token", token.clone()));
    }

    let signed_headers = canonical_headers
        .iter()
        .map(|(k, _)| *k)
        .collect::<Vec<_>>()
        .join(";");
    let header_block: String = canonical_headers
        .iter()
        .map(|(k, v)| format!("{k}:{}\n", v.trim()))
        .collect();

    let canonical_request = format!(
        "POST\n{}\n\n{header_block}\n{signed_headers}\n{}",
        input.path,
        sha256_hex(input.body.as_bytes())
    );

    let scope = format!("{date}/{}/{SERVICE}/aws4_request", input.region);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(
        &input.credentials.secret_access_key,
        &date,
        input.region,
        SERVICE,
    );
    let signature = hex(&hmac_sha256(&key, string_to_sign.as_bytes()));

    let mut headers = vec![("x-amz-date", amz_date)];
    if let Some(token) = &input.credentials.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }
    headers.push((
        "authorization",
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            input.credentials.access_key_id
        ),
    ));
    headers
}
