//! Sealing of the compressed frame before it leaves the host.
//!
//! The pipeline only relies on the [`SecureEnvelope`] contract. The
//! shipped implementation is AES-256-GCM with the wire layout
//!
//! ```text
//! [IV: 12 bytes][ciphertext: n bytes][tag: 16 bytes]
//! ```
//!
//! so the sealed length is always `n + 28`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::error::EpinkError;

pub const KEY_LENGTH: usize = 32;
pub const IV_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;

/// BLAKE3 context string for passphrase-derived keys.
const KEY_CONTEXT: &str = "epink 2024-06 envelope key";

// ── SecureEnvelope ───────────────────────────────────────────────

/// Symmetric seal/open capability.
///
/// `open(seal(p)) == p` for every `p`, and the sealed length depends only
/// on the plaintext length.
pub trait SecureEnvelope: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EpinkError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, EpinkError>;

    /// Length of `encrypt(p)` for any `p` with `p.len() == plaintext_len`.
    fn ciphertext_len(&self, plaintext_len: usize) -> usize;
}

impl<E: SecureEnvelope + ?Sized> SecureEnvelope for Box<E> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EpinkError> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, EpinkError> {
        (**self).decrypt(ciphertext)
    }

    fn ciphertext_len(&self, plaintext_len: usize) -> usize {
        (**self).ciphertext_len(plaintext_len)
    }
}

// ── AesGcmEnvelope ───────────────────────────────────────────────

/// AES-256-GCM with a fresh random IV per seal.
pub struct AesGcmEnvelope {
    cipher: Aes256Gcm,
}

impl AesGcmEnvelope {
    /// `key` must be exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, EpinkError> {
        if key.len() != KEY_LENGTH {
            return Err(EpinkError::InvalidKeyLength {
                expected: KEY_LENGTH,
                got: key.len(),
            });
        }
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        })
    }

    /// Derive the key from a shared passphrase with BLAKE3.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let key = blake3::derive_key(KEY_CONTEXT, passphrase.as_bytes());
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }
}

impl std::fmt::Debug for AesGcmEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmEnvelope").finish_non_exhaustive()
    }
}

impl SecureEnvelope for AesGcmEnvelope {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EpinkError> {
        let mut iv = [0u8; IV_LENGTH];
        getrandom::getrandom(&mut iv).map_err(|e| EpinkError::Envelope(format!("rng: {e}")))?;

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|e| EpinkError::Envelope(format!("encrypt: {e}")))?;

        let mut out = Vec::with_capacity(IV_LENGTH + sealed.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, EpinkError> {
        if ciphertext.len() < IV_LENGTH + TAG_LENGTH {
            return Err(EpinkError::Envelope(format!(
                "ciphertext too short: {} < {}",
                ciphertext.len(),
                IV_LENGTH + TAG_LENGTH
            )));
        }
        let (iv, sealed) = ciphertext.split_at(IV_LENGTH);
        self.cipher
            .decrypt(Nonce::from_slice(iv), sealed)
            .map_err(|e| EpinkError::Envelope(format!("decrypt: {e}")))
    }

    fn ciphertext_len(&self, plaintext_len: usize) -> usize {
        IV_LENGTH + plaintext_len + TAG_LENGTH
    }
}

// ── Tests ────────────────────────────────────────────────────────
