//! Security module for Quillwork: locator encryption and request signing.
//!
//! Provides:
//! - **Locator cipher**: AES-256-GCM encryption of template locators
//! - **Signing**: HMAC-SHA256 signatures over engine requests

pub mod secrets;
pub mod signing;

pub use secrets::LocatorCipher;
pub use signing::{
    RequestSignature, SecretError, SignatureField, SigningKey, TIMESTAMP_FORMAT, canonicalize,
};
