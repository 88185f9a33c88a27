//! Locator encryption using AES-256-GCM.
//!
//! Locators are handed to browsers and persisted by hosts, so they are
//! encrypted and authenticated: a tampered locator fails to decrypt instead of
//! decoding to a different location. The key is the SHA-256 digest of a
//! configured passphrase; every locator gets a fresh random nonce.
//!
//! Wire form: URL-safe base64 (no padding) of `nonce || ciphertext`.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use quillwork_core::LocationError;
use quillwork_core::location::LocatorCodec;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts locator strings.
pub struct LocatorCipher {
    cipher: Aes256Gcm,
}

impl LocatorCipher {
    /// Create a cipher keyed by a passphrase.
    pub fn new(passphrase: &str) -> Self {
        let key = Sha256::digest(passphrase.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Create a cipher from raw 32-byte key material.
    pub fn from_key(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }
}

impl std::fmt::Debug for LocatorCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LocatorCipher([REDACTED])")
    }
}

impl LocatorCodec for LocatorCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, LocationError> {
        let nonce_bytes = generate_nonce();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| LocationError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    fn decrypt(&self, locator: &str) -> Result<String, LocationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(locator.trim())
            .map_err(|_| LocationError::MalformedLocator("not valid base64".into()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(LocationError::MalformedLocator("locator too short".into()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                tracing::warn!(len = locator.len(), "Locator failed authentication");
                LocationError::MalformedLocator("locator failed authentication".into())
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| LocationError::MalformedLocator("invalid UTF-8 after decryption".into()))
    }
}

/// Generate a random nonce.
fn generate_nonce() -> [u8; NONCE_LEN] {
    use rand::Rng;
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce[..]);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = LocatorCipher::new("locator-passphrase");
        let plaintext = "path|/srv/templates/lease";

        let locator = cipher.encrypt(plaintext).unwrap();
        assert!(!locator.contains("srv"));
        assert_eq!(cipher.decrypt(&locator).unwrap(), plaintext);
    }

    #[test]
    fn different_nonces_produce_different_locators() {
        let cipher = LocatorCipher::new("k");
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), cipher.decrypt(&b).unwrap());
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let locator = LocatorCipher::new("right").encrypt("path|/x").unwrap();
        assert!(matches!(
            LocatorCipher::new("wrong").decrypt(&locator),
            Err(LocationError::MalformedLocator(_))
        ));
    }

    #[test]
    fn tampered_locator_rejected() {
        let cipher = LocatorCipher::new("k");
        let mut locator = cipher.encrypt("path|/x").unwrap().into_bytes();
        let last = locator.len() - 1;
        locator[last] = if locator[last] == b'A' { b'B' } else { b'A' };
        let locator = String::from_utf8(locator).unwrap();
        assert!(cipher.decrypt(&locator).is_err());
    }

    #[test]
    fn garbage_is_malformed() {
        let cipher = LocatorCipher::new("k");
        assert!(matches!(
            cipher.decrypt("!!not base64!!"),
            Err(LocationError::MalformedLocator(_))
        ));
        assert!(matches!(
            cipher.decrypt("AAAA"),
            Err(LocationError::MalformedLocator(_))
        ));
    }

    #[test]
    fn raw_key_matches_passphrase_digest() {
        let digest: [u8; 32] = Sha256::digest(b"pass").as_slice().try_into().unwrap();
        let locator = LocatorCipher::from_key(&digest).encrypt("x|y").unwrap();
        assert_eq!(LocatorCipher::new("pass").decrypt(&locator).unwrap(), "x|y");
    }

    #[test]
    fn debug_is_redacted() {
        assert_eq!(format!("{:?}", LocatorCipher::new("secret")), "LocatorCipher([REDACTED])");
    }
}
