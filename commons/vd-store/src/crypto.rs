use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::warn;

use crate::error::{StoreError, StoreResult};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for credential blobs at rest.
///
/// Blob layout is `nonce(12) ‖ ciphertext ‖ tag(16)`.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Builds a cipher from the configured key. An absent or empty key mints
    /// a random one, which means stored credentials do not survive a restart.
    pub fn new(key: Option<&str>) -> Self {
        let key_bytes = match key {
            Some(k) if !k.is_empty() => normalize_key(k),
            _ => {
                warn!(
                    "No encryption key provided, generated random key. \
                     Clusters won't persist across restarts!"
                );
                let mut random = [0u8; KEY_LEN];
                OsRng.fill_bytes(&mut random);
                random
            }
        };

        CredentialCipher {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes)),
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| StoreError::Backend("encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn decrypt(&self, blob: &[u8]) -> StoreResult<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return Err(StoreError::DecryptFailed);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StoreError::DecryptFailed)
    }
}

/// Legacy key normalisation: keys that are not exactly 32 bytes are
/// right-padded with spaces and truncated to 32 bytes. Existing stores were
/// written with keys normalised this way.
fn normalize_key(key: &str) -> [u8; KEY_LEN] {
    let mut out = [b' '; KEY_LEN];
    let bytes = key.as_bytes();
    let n = bytes.len().min(KEY_LEN);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let cipher = CredentialCipher::new(Some("0123456789abcdef0123456789abcdef"));
        let plaintext = b"apiVersion: v1\nkind: Config\n";

        let blob = cipher.encrypt(plaintext).unwrap();
        assert_ne!(&blob[NONCE_LEN..], plaintext.as_slice());
        assert_eq!(cipher.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = CredentialCipher::new(Some("0123456789abcdef0123456789abcdef"));
        let mut blob = cipher.encrypt(b"payload").unwrap();

        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(
            cipher.decrypt(&blob),
            Err(StoreError::DecryptFailed)
        ));
    }

    #[test]
    fn short_blob_fails() {
        let cipher = CredentialCipher::new(Some("k"));
        assert!(matches!(
            cipher.decrypt(&[0u8; 4]),
            Err(StoreError::DecryptFailed)
        ));
    }

    #[test]
    fn short_key_is_right_padded_with_spaces() {
        let normalized = normalize_key("abc");
        assert_eq!(&normalized[..3], b"abc");
        assert!(normalized[3..].iter().all(|b| *b == b' '));
    }

    #[test]
    fn long_key_is_truncated() {
        let long = "x".repeat(40);
        let normalized = normalize_key(&long);
        assert_eq!(normalized, [b'x'; KEY_LEN]);
    }

    #[test]
    fn padded_and_explicit_keys_are_interchangeable() {
        // A short key and its explicitly space-padded form decrypt each
        // other's output.
        let short = CredentialCipher::new(Some("legacy-key"));
        let padded = format!("{:<32}", "legacy-key");
        let explicit = CredentialCipher::new(Some(&padded));

        let blob = short.encrypt(b"kubeconfig").unwrap();
        assert_eq!(explicit.decrypt(&blob).unwrap(), b"kubeconfig");
    }

    #[test]
    fn random_key_still_round_trips() {
        let cipher = CredentialCipher::new(None);
        let blob = cipher.encrypt(b"ephemeral").unwrap();
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"ephemeral");
    }
}
