//! On-disk artifact container for compiled Mutant bytecode.
//!
//! The pipeline from a freshly compiled [`Bytecode`] to a `.mu` file's
//! bytes, and back:
//!
//! 1. `typed::encode_bytecode` — XOR-obfuscate instruction bytes and
//!    primitive constants, producing a serde-friendly [`typed::EncodedProgram`].
//! 2. `typed::serialize` — bincode the encoded program to bytes.
//! 3. `envelope::seal` — AES-256-GCM encrypt those bytes under a key
//!    derived from their own digest, base64-encoded.
//! 4. `frame::sign` — wrap the envelope in the `MUT|...|ANT` signature frame.
//!
//! Decoding runs the same four steps in reverse.

pub mod envelope;
pub mod error;
pub mod frame;
pub mod obfuscate;
pub mod typed;

pub use error::ContainerError;

use mutant_core::bytecode::Bytecode;

/// Compile a [`Bytecode`] program down to the bytes of a `.mu` artifact.
pub fn encode(bytecode: &Bytecode) -> Result<Vec<u8>, ContainerError> {
    let encoded = typed::encode_bytecode(bytecode)?;
    let serialized = typed::serialize(&encoded)?;
    let sealed = envelope::seal(&serialized)?;
    let artifact = frame::sign(&sealed).into_bytes();
    tracing::debug!(bytes = artifact.len(), "encoded artifact");
    Ok(artifact)
}

/// Recover a [`Bytecode`] program from the bytes of a `.mu` artifact.
pub fn decode(artifact: &[u8]) -> Result<Bytecode, ContainerError> {
    let text = std::str::from_utf8(artifact)
        .map_err(|e| ContainerError::Crypto(format!("artifact is not valid utf-8: {e}")))?;
    let sealed = frame::verify(text).inspect_err(|e| {
        tracing::error!(error = %e, "artifact failed signature verification");
    })?;
    let serialized = envelope::open(&sealed)?;
    let encoded = typed::deserialize(&serialized)?;
    let bytecode = typed::decode_bytecode(&encoded)?;
    tracing::debug!(instructions = bytecode.instructions.len(), "decoded artifact");
    Ok(bytecode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mutant_core::value::Value;
    use std::rc::Rc;

    #[test]
    fn round_trips_a_small_program() {
        let bytecode = Bytecode {
            instructions: vec![0, 0, 1, 1, 2],
            constants: vec![
                Value::Integer(42),
                Value::String(Rc::from("hello")),
                Value::Boolean(true),
            ],
        };

        let artifact = encode(&bytecode).unwrap();
        let decoded = decode(&artifact).unwrap();

        assert_eq!(decoded.instructions, bytecode.instructions);
        assert_eq!(decoded.constants, bytecode.constants);
    }

    #[test]
    fn tampered_artifact_is_rejected() {
        let bytecode = Bytecode {
            instructions: vec![1, 2, 3],
            constants: vec![Value::Integer(1)],
        };
        let mut artifact = encode(&bytecode).unwrap();
        let last = artifact.len() - 1;
        artifact[last] = b'X';
        assert!(decode(&artifact).is_err());
    }
}
