use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum DecryptError {
    #[error("invalid base64url field: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("key parts decode to {0} bytes, expected 32")]
    KeyLength(usize),

    #[error("iv decodes to {0} bytes, expected 12")]
    NonceLength(usize),

    #[error("payload too short to carry a tag ({0} bytes)")]
    PayloadTooShort(usize),

    #[error("authentication failed")]
    Authentication,

    #[error("decrypted playback is not json: {0}")]
    Json(#[from] serde_json::Error),
}

/// the `playback` object some embed apis return instead of a plain `sources` list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPlayback {
    pub iv: String,
    pub key_parts: Vec<String>,
    pub payload: String,
}

impl EncryptedPlayback {
    /// key = every key part decoded and glued together in order, payload = ciphertext || tag
    pub fn decrypt(&self) -> Result<serde_json::Value, DecryptError> {
        let iv = decode_base64url(&self.iv)?;
        let key = self
            .key_parts
            .iter()
            .map(|part| decode_base64url(part))
            .collect::<Result<Vec<_>, _>>()?
            .concat();
        let payload = decode_base64url(&self.payload)?;

        if key.len() != KEY_LEN {
            return Err(DecryptError::KeyLength(key.len()));
        }
        // Nonce::from_slice panics on the wrong length so this has to be checked first
        if iv.len() != NONCE_LEN {
            return Err(DecryptError::NonceLength(iv.len()));
        }
        if payload.len() < TAG_LEN {
            return Err(DecryptError::PayloadTooShort(payload.len()));
        }

        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|_| DecryptError::KeyLength(key.len()))?;

        let (ciphertext, tag) = payload.split_at(payload.len() - TAG_LEN);
        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer, Tag::from_slice(tag))
            .map_err(|_| DecryptError::Authentication)?;

        Ok(serde_json::from_slice(&buffer)?)
    }
}

/// url-safe alphabet back to the standard one, then `=` until the length is a multiple of 4
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let mut normalized: String = input
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();

    while !normalized.len().is_multiple_of(4) {
        normalized.push('=');
    }

    base64::engine::general_purpose::STANDARD.decode(normalized)
}
