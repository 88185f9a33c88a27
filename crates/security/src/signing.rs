//! Request signing.
//!
//! Every request to the assembly engine carries an HMAC-SHA256 over a fixed,
//! operation-specific ordered list of fields. The engine recomputes the same
//! value and rejects the call on mismatch, so field order and formatting are
//! part of the wire contract:
//!
//! - fields are joined with `\n`
//! - strings are written verbatim
//! - booleans are written `True` / `False`
//! - integers are written in decimal
//! - timestamps are written `%Y-%m-%dT%H:%M:%SZ` in UTC
//! - settings maps are written as `key=value` lines sorted by key
//!
//! The digest is sent base64-encoded (standard alphabet, padded).

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Timestamp layout used inside signatures and requests.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Errors from signing keys and signature checks.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Signing key is empty")]
    EmptyKey,

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Signature does not match")]
    SignatureMismatch,
}

/// One field contributing to a request signature.
#[derive(Debug, Clone, Copy)]
pub enum SignatureField<'a> {
    Text(&'a str),
    Flag(bool),
    Number(u64),
    Timestamp(DateTime<Utc>),
    Settings(&'a BTreeMap<String, String>),
}

impl SignatureField<'_> {
    fn write_to(&self, out: &mut String) {
        match self {
            SignatureField::Text(s) => out.push_str(s),
            SignatureField::Flag(b) => out.push_str(if *b { "True" } else { "False" }),
            SignatureField::Number(n) => out.push_str(&n.to_string()),
            SignatureField::Timestamp(ts) => {
                out.push_str(&ts.format(TIMESTAMP_FORMAT).to_string())
            }
            SignatureField::Settings(map) => {
                let lines: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                out.push_str(&lines.join("\n"));
            }
        }
    }
}

/// The exact string that is fed to the MAC.
pub fn canonicalize(fields: &[SignatureField<'_>]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        field.write_to(&mut out);
    }
    out
}

/// Base64-encoded request signature. Its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequestSignature(String);

impl RequestSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestSignature([REDACTED])")
    }
}

/// The caller-held key requests are signed with.
#[derive(Clone)]
pub struct SigningKey {
    key: Vec<u8>,
}

impl SigningKey {
    pub fn new(key: impl Into<String>) -> Result<Self, SecretError> {
        let key = key.into();
        if key.is_empty() {
            return Err(SecretError::EmptyKey);
        }
        Ok(Self {
            key: key.into_bytes(),
        })
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length")
    }

    /// Sign an ordered list of fields.
    pub fn sign(&self, fields: &[SignatureField<'_>]) -> RequestSignature {
        let mut mac = self.mac();
        mac.update(canonicalize(fields).as_bytes());
        RequestSignature(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Check a received signature against `fields`, in constant time.
    pub fn verify(&self, fields: &[SignatureField<'_>], signature: &str) -> Result<(), SecretError> {
        let provided = STANDARD
            .decode(signature)
            .map_err(|e| SecretError::MalformedSignature(e.to_string()))?;

        let mut mac = self.mac();
        mac.update(canonicalize(fields).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| SecretError::SignatureMismatch)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}
