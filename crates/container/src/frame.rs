//! Outer signature frame: `MUT | envelope | hex(sha256(envelope)) | ANT`.
//!
//! This is a tamper-evidence check over the envelope text, not a
//! cryptographic signature — anyone can recompute the digest, same as the
//! envelope's own key. It exists to reject truncated or hand-edited `.mu`
//! files before they ever reach the obfuscation/decryption layers.

use sha2::{Digest, Sha256};

use crate::error::ContainerError;

const HEADER: &str = "MUT";
const TRAILER: &str = "ANT";
const SEPARATOR: char = '|';

fn digest_hex(envelope: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(envelope.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn sign(envelope: &str) -> String {
    format!("{HEADER}{SEPARATOR}{envelope}{SEPARATOR}{}{SEPARATOR}{TRAILER}", digest_hex(envelope))
}

/// The envelope itself contains a `|` (between its ciphertext and key
/// halves), so the header and trailer are stripped from the ends first and
/// only the final remaining separator is treated as the digest boundary.
pub fn verify(framed: &str) -> Result<String, ContainerError> {
    let prefix = format!("{HEADER}{SEPARATOR}");
    let suffix = format!("{SEPARATOR}{TRAILER}");

    let rest = framed.strip_prefix(&prefix).ok_or(ContainerError::WrongSignature)?;
    let rest = rest.strip_suffix(&suffix).ok_or(ContainerError::WrongSignature)?;

    let (envelope, digest) = rest.rsplit_once(SEPARATOR).ok_or(ContainerError::WrongSignature)?;

    if digest != digest_hex(envelope) {
        return Err(ContainerError::WrongSignature);
    }

    Ok(envelope.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let envelope = "some|envelope|text";
        let framed = sign(envelope);
        assert!(framed.starts_with("MUT|"));
        assert!(framed.ends_with("|ANT"));
        assert_eq!(verify(&framed).unwrap(), envelope);
    }

    #[test]
    fn flipped_digest_byte_is_rejected() {
        let envelope = "payload";
        let mut framed = sign(envelope);
        let ant_pos = framed.rfind("|ANT").unwrap();
        let flipped = if &framed[ant_pos - 1..ant_pos] == "0" { "1" } else { "0" };
        framed.replace_range(ant_pos - 1..ant_pos, flipped);
        assert!(matches!(verify(&framed), Err(ContainerError::WrongSignature)));
    }

    #[test]
    fn missing_trailer_is_rejected() {
        assert!(matches!(verify("MUT|payload|deadbeef"), Err(ContainerError::WrongSignature)));
    }

    #[test]
    fn wrong_header_is_rejected() {
        assert!(matches!(verify("XXX|payload|deadbeef|ANT"), Err(ContainerError::WrongSignature)));
    }
}
