//! AES-256-GCM credential encryption.
//!
//! Git credential tokens are encrypted at rest with a single process-level
//! key derived from an operator-supplied secret. The key never changes at
//! runtime, so derivation happens once and is cached.

use crate::errors::CoreError;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Encrypted form of a secret, ready to store as three base64 columns.
#[derive(Debug, Clone)]
pub struct EncryptedSecret {
    pub ciphertext: String,
    pub iv: String,
    pub tag: String,
}

/// A process-level AES-256-GCM key, derived from an environment secret via
/// SHA-256.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Derive the cipher from a raw secret string (typically `CRED_SECRET`).
    pub fn from_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt `plaintext`, returning base64-encoded ciphertext, IV, and tag.
    ///
    /// AES-GCM's authentication tag is appended to the ciphertext by the
    /// `aes-gcm` crate; it is split off here so the three fields map onto
    /// separate storage columns rather than one combined blob.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedSecret, CoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CoreError::new(crate::errors::ErrorKind::InvalidPayload, "encryption failed"))?;
        let tag = sealed.split_off(sealed.len() - 16);
        Ok(EncryptedSecret {
            ciphertext: BASE64.encode(sealed),
            iv: BASE64.encode(nonce),
            tag: BASE64.encode(tag),
        })
    }

    /// Decrypt a secret previously produced by [`Self::encrypt`].
    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<Vec<u8>, CoreError> {
        let mut combined = BASE64
            .decode(&secret.ciphertext)
            .map_err(|e| CoreError::new(crate::errors::ErrorKind::InvalidPayload, e.to_string()))?;
        let mut tag = BASE64
            .decode(&secret.tag)
            .map_err(|e| CoreError::new(crate::errors::ErrorKind::InvalidPayload, e.to_string()))?;
        let iv = BASE64
            .decode(&secret.iv)
            .map_err(|e| CoreError::new(crate::errors::ErrorKind::InvalidPayload, e.to_string()))?;
        combined.append(&mut tag);
        let nonce = Nonce::from_slice(&iv);
        self.cipher
            .decrypt(nonce, combined.as_ref())
            .map_err(|_| CoreError::new(crate::errors::ErrorKind::InvalidPayload, "decryption failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let cipher = CredentialCipher::from_secret("test-secret");
        let sealed = cipher.encrypt(b"ghp_supersecrettoken").unwrap();
        let opened = cipher.decrypt(&sealed).unwrap();
        assert_eq!(opened, b"ghp_supersecrettoken");
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let cipher = CredentialCipher::from_secret("test-secret");
        let mut sealed = cipher.encrypt(b"ghp_supersecrettoken").unwrap();
        sealed.ciphertext = BASE64.encode(b"not the right bytes");
        assert!(cipher.decrypt(&sealed).is_err());
    }

    #[test]
    fn different_secrets_yield_different_keys() {
        let a = CredentialCipher::from_secret("secret-a");
        let b = CredentialCipher::from_secret("secret-b");
        let sealed = a.encrypt(b"payload").unwrap();
        assert!(b.decrypt(&sealed).is_err());
    }
}
