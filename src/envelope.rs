//! Secure envelope used at the process boundary.
//!
//! Wire layout: `base64(nonce[12] ‖ aes_gcm(snappy(json)))`. The input batch is
//! opened all-or-nothing; every sealed message gets its own random nonce.

use aes_gcm::{
    aead::{
        consts::U12,
        rand_core::RngCore as _,
        Aead,
        KeyInit,
        OsRng,
    },
    aes::Aes192,
    Aes128Gcm,
    Aes256Gcm,
    AesGcm,
    Nonce,
};
use base64::{
    prelude::BASE64_STANDARD,
    Engine as _,
};
use serde::{
    de::DeserializeOwned,
    Serialize,
};
use ssh_batch_plugin_orchestrator::LineEncoder;
use std::fmt;

pub const NONCE_LEN: usize = 12;

type Aes192Gcm = AesGcm<Aes192, U12>;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("encryption key not found in config")]
    MissingKey,
    #[error("invalid hex key: {0}")]
    InvalidKey(#[from] hex::FromHexError),
    #[error("AES key must be 16, 24 or 32 bytes long, got {0}")]
    KeyLength(usize),
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("data too short: missing nonce ({0} bytes)")]
    TooShort(usize),
    #[error("AES-GCM authentication failed: payload is corrupted or was sealed with a different key")]
    Authentication,
    #[error("AES-GCM seal failed")]
    Seal,
    #[error("nonce generation failed: {0}")]
    Nonce(String),
    #[error("snappy decompress failed: {0}")]
    Decompress(#[from] snap::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

enum Cipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl Cipher {
    fn new(key: &[u8]) -> Result<Self, EnvelopeError> {
        let invalid = |_| EnvelopeError::KeyLength(key.len());
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            other => Err(EnvelopeError::KeyLength(other)),
        }
    }

    fn open(&self, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let nonce = Nonce::<U12>::from_slice(nonce);
        match self {
            Self::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes192(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        }
        .map_err(|_| EnvelopeError::Authentication)
    }

    fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let nonce = Nonce::<U12>::from_slice(nonce);
        match self {
            Self::Aes128(cipher) => cipher.encrypt(nonce, plaintext),
            Self::Aes192(cipher) => cipher.encrypt(nonce, plaintext),
            Self::Aes256(cipher) => cipher.encrypt(nonce, plaintext),
        }
        .map_err(|_| EnvelopeError::Seal)
    }

    fn key_bits(&self) -> usize {
        match self {
            Self::Aes128(_) => 128,
            Self::Aes192(_) => 192,
            Self::Aes256(_) => 256,
        }
    }
}

/// Symmetric codec bound to one configured key.
pub struct Envelope {
    cipher: Cipher,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("key_bits", &self.cipher.key_bits())
            .finish_non_exhaustive()
    }
}

impl Envelope {
    pub fn from_hex_key(key: &str) -> Result<Self, EnvelopeError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(EnvelopeError::MissingKey);
        }
        let key = hex::decode(key)?;
        Ok(Self {
            cipher: Cipher::new(&key)?,
        })
    }

    /// Base64 text to decompressed plaintext. Surrounding whitespace is ignored.
    pub fn open(&self, text: &str) -> Result<Vec<u8>, EnvelopeError> {
        let data = BASE64_STANDARD.decode(text.trim())?;
        if data.len() < NONCE_LEN {
            return Err(EnvelopeError::TooShort(data.len()));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let nonce: &[u8; NONCE_LEN] = nonce.try_into().map_err(|_| EnvelopeError::TooShort(data.len()))?;

        let compressed = self.cipher.open(nonce, ciphertext)?;
        Ok(snap::raw::Decoder::new().decompress_vec(&compressed)?)
    }

    /// Compresses and seals `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, EnvelopeError> {
        let compressed = snap::raw::Encoder::new().compress_vec(plaintext)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|err| EnvelopeError::Nonce(err.to_string()))?;

        let sealed = self.cipher.seal(&nonce, &compressed)?;
        let mut framed = Vec::with_capacity(NONCE_LEN + sealed.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&sealed);
        Ok(BASE64_STANDARD.encode(framed))
    }

    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, EnvelopeError> {
        let plaintext = self.open(text)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, EnvelopeError> {
        let plaintext = serde_json::to_vec(value)?;
        self.seal(&plaintext)
    }
}

impl<R: Serialize> LineEncoder<R> for Envelope {
    fn encode(&self, report: &R) -> eyre::Result<String> {
        Ok(Envelope::encode(self, report)?)
    }
}
