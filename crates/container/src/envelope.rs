//! AES-256-GCM encryption of the serialized program, keyed by the SHA-256
//! digest of the plaintext itself.
//!
//! The key is derived from the data being sealed rather than a
//! caller-supplied secret: a reader who already has the serialized bytes
//! (e.g. by decoding the outer frame) can always reproduce the key, so this
//! buys obfuscation of the on-disk artifact, not confidentiality against
//! someone who can read the file.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::ContainerError;

const NONCE_LEN: usize = 12;
const SEPARATOR: char = '|';

fn derive_key(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Seal `data` into `base64(nonce||ciphertext) | base64(key)`.
pub fn seal(data: &[u8]) -> Result<String, ContainerError> {
    let key_bytes = derive_key(data);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|e| ContainerError::Crypto(e.to_string()))?;

    let mut sealed = nonce_bytes.to_vec();
    sealed.extend_from_slice(&ciphertext);

    Ok(format!(
        "{}{}{}",
        BASE64.encode(sealed),
        SEPARATOR,
        BASE64.encode(key_bytes)
    ))
}

/// Reverse [`seal`]. The key travels alongside the ciphertext in the
/// envelope, so this only checks it matches the digest of the recovered
/// plaintext — it is a self-consistency check, not an authentication step.
pub fn open(envelope: &str) -> Result<Vec<u8>, ContainerError> {
    let (body, key_part) = envelope
        .split_once(SEPARATOR)
        .ok_or_else(|| ContainerError::Crypto("malformed envelope: missing separator".to_string()))?;

    let key_bytes = BASE64
        .decode(key_part)
        .map_err(|e| ContainerError::Crypto(e.to_string()))?;
    if key_bytes.len() != 32 {
        return Err(ContainerError::Crypto("envelope key is not 32 bytes".to_string()));
    }

    let sealed = BASE64.decode(body).map_err(|e| ContainerError::Crypto(e.to_string()))?;
    if sealed.len() < NONCE_LEN {
        return Err(ContainerError::Crypto("envelope body shorter than a nonce".to_string()));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| ContainerError::Crypto(e.to_string()))?;

    if derive_key(&plaintext).as_slice() != key_bytes.as_slice() {
        return Err(ContainerError::Crypto("envelope key does not match plaintext digest".to_string()));
    }

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let data = b"a compiled mutant program".to_vec();
        let envelope = seal(&data).unwrap();
        assert_eq!(open(&envelope).unwrap(), data);
    }

    #[test]
    fn key_is_deterministic_for_the_same_plaintext() {
        let data = b"same bytes every time".to_vec();
        let first = seal(&data).unwrap();
        let second = seal(&data).unwrap();
        let first_key = first.split(SEPARATOR).nth(1).unwrap();
        let second_key = second.split(SEPARATOR).nth(1).unwrap();
        assert_eq!(first_key, second_key);
    }

    #[test]
    fn tampered_key_is_rejected() {
        let data = b"tamper me".to_vec();
        let envelope = seal(&data).unwrap();
        let (body, _) = envelope.split_once(SEPARATOR).unwrap();
        let bogus_key = BASE64.encode([0u8; 32]);
        let tampered = format!("{}{}{}", body, SEPARATOR, bogus_key);
        assert!(open(&tampered).is_err());
    }
}
