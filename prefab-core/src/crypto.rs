//! Decryption of secret config values.
//!
//! Payloads are `ciphertextHex--ivHex--tagHex`, encrypted with AES-256-GCM
//! under a hex key. The nonce size follows the IV length.

use crate::error::{PrefabError, Result};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Nonce};
use aes_gcm::aes::Aes256;
use aes_gcm::{Aes256Gcm, AesGcm};

const SEPARATOR: &str = "--";
const TAG_LEN: usize = 16;

/// Turns a ciphertext payload into plaintext.
pub trait Decrypter: Send + Sync {
    fn decrypt(&self, key_hex: &str, payload: &str) -> Result<String>;
}

/// AES-256-GCM decrypter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmDecrypter;

impl AesGcmDecrypter {
    pub fn new() -> Self {
        Self
    }

    /// Produce a payload in the format [`Decrypter::decrypt`] accepts.
    pub fn encrypt(key_hex: &str, plaintext: &str, iv: &[u8]) -> Result<String> {
        let key = decode_hex("key", key_hex)?;
        let sealed = match iv.len() {
            12 => seal(Aes256Gcm::new_from_slice(&key).map_err(invalid_key)?, iv, plaintext)?,
            16 => seal(
                AesGcm::<Aes256, U16>::new_from_slice(&key).map_err(invalid_key)?,
                iv,
                plaintext,
            )?,
            other => {
                return Err(PrefabError::DecryptionFailed(format!(
                    "unsupported IV length {}",
                    other
                )));
            }
        };

        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        Ok([hex::encode(ciphertext), hex::encode(iv), hex::encode(tag)].join(SEPARATOR))
    }
}

impl Decrypter for AesGcmDecrypter {
    fn decrypt(&self, key_hex: &str, payload: &str) -> Result<String> {
        let parts: Vec<&str> = payload.split(SEPARATOR).collect();
        let [ciphertext, iv, tag] = parts.as_slice() else {
            return Err(PrefabError::DecryptionFailed(
                "payload must be ciphertext--iv--tag".to_string(),
            ));
        };

        let key = decode_hex("key", key_hex)?;
        let iv = decode_hex("iv", iv)?;
        let mut sealed = decode_hex("ciphertext", ciphertext)?;
        sealed.extend(decode_hex("tag", tag)?);

        let plaintext = match iv.len() {
            12 => open(Aes256Gcm::new_from_slice(&key).map_err(invalid_key)?, &iv, &sealed)?,
            16 => open(
                AesGcm::<Aes256, U16>::new_from_slice(&key).map_err(invalid_key)?,
                &iv,
                &sealed,
            )?,
            other => {
                return Err(PrefabError::DecryptionFailed(format!(
                    "unsupported IV length {}",
                    other
                )));
            }
        };

        String::from_utf8(plaintext)
            .map_err(|_| PrefabError::DecryptionFailed("plaintext is not UTF-8".to_string()))
    }
}

fn decode_hex(what: &str, text: &str) -> Result<Vec<u8>> {
    hex::decode(text)
        .map_err(|e| PrefabError::DecryptionFailed(format!("invalid {} hex: {}", what, e)))
}

fn invalid_key<E>(_: E) -> PrefabError {
    PrefabError::DecryptionFailed("key must be 32 bytes".to_string())
}

fn open<C: Aead>(cipher: C, iv: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    cipher
        .decrypt(Nonce::<C>::from_slice(iv), sealed)
        .map_err(|_| PrefabError::DecryptionFailed("authentication failed".to_string()))
}

fn seal<C: Aead>(cipher: C, iv: &[u8], plaintext: &str) -> Result<Vec<u8>> {
    cipher
        .encrypt(Nonce::<C>::from_slice(iv), plaintext.as_bytes())
        .map_err(|_| PrefabError::DecryptionFailed("encryption failed".to_string()))
}
