//! Self-describing, type-tagged binary encoding of a [`Bytecode`] program,
//! with the obfuscation step (§ obfuscate) folded into encode/decode.
//!
//! Only the four constant kinds the compiler ever emits — `Integer`,
//! `String`, `Boolean`, `CompiledFunction` — round-trip here; anything else
//! reaching this layer is a compiler bug, not a user error.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use mutant_core::bytecode::Bytecode;
use mutant_core::code::CompiledFunction;
use mutant_core::value::Value;

use crate::error::ContainerError;
use crate::obfuscate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum EncryptedTag {
    Integer,
    String,
    Boolean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encrypted {
    pub tag: EncryptedTag,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedFunction {
    pub instructions: Vec<u8>,
    pub num_locals: u16,
    pub num_params: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EncodedConstant {
    Primitive(Encrypted),
    Function(EncodedFunction),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedProgram {
    pub instructions: Vec<u8>,
    pub constants: Vec<EncodedConstant>,
}

/// Obfuscate and encode a compiled program. The top-level instruction
/// length is the key seed for every primitive constant; each compiled
/// function's own instructions are keyed by their own length, so the VM
/// can recompute either key from data already on hand at decode time.
pub fn encode_bytecode(bc: &Bytecode) -> Result<EncodedProgram, ContainerError> {
    let key_len = bc.instructions.len();
    let mut instructions = bc.instructions.clone();
    obfuscate::xor_buffer(&mut instructions, key_len);

    let constants = bc
        .constants
        .iter()
        .map(|c| encode_constant(c, key_len))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EncodedProgram {
        instructions,
        constants,
    })
}

pub fn decode_bytecode(encoded: &EncodedProgram) -> Result<Bytecode, ContainerError> {
    let key_len = encoded.instructions.len();
    let mut instructions = encoded.instructions.clone();
    obfuscate::xor_buffer(&mut instructions, key_len);

    let constants = encoded
        .constants
        .iter()
        .map(|c| decode_constant(c, key_len))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Bytecode {
        instructions,
        constants,
    })
}

fn encode_constant(value: &Value, key_len: usize) -> Result<EncodedConstant, ContainerError> {
    match value {
        Value::Integer(i) => {
            let mut bytes = i.to_le_bytes().to_vec();
            obfuscate::xor_buffer(&mut bytes, key_len);
            Ok(EncodedConstant::Primitive(Encrypted {
                tag: EncryptedTag::Integer,
                bytes,
            }))
        }
        Value::String(s) => {
            let mut bytes = s.as_bytes().to_vec();
            obfuscate::xor_buffer(&mut bytes, key_len);
            Ok(EncodedConstant::Primitive(Encrypted {
                tag: EncryptedTag::String,
                bytes,
            }))
        }
        Value::Boolean(b) => {
            let literal = if *b { "true" } else { "false" };
            let mut bytes = literal.as_bytes().to_vec();
            obfuscate::xor_buffer(&mut bytes, key_len);
            Ok(EncodedConstant::Primitive(Encrypted {
                tag: EncryptedTag::Boolean,
                bytes,
            }))
        }
        Value::CompiledFunction(f) => {
            let inner_len = f.instructions.len();
            let mut instructions = f.instructions.clone();
            obfuscate::xor_buffer(&mut instructions, inner_len);
            Ok(EncodedConstant::Function(EncodedFunction {
                instructions,
                num_locals: f.num_locals,
                num_params: f.num_params,
            }))
        }
        other => Err(ContainerError::UnsupportedConstant(other.type_name())),
    }
}

fn decode_constant(encoded: &EncodedConstant, key_len: usize) -> Result<Value, ContainerError> {
    match encoded {
        EncodedConstant::Primitive(enc) => {
            let mut bytes = enc.bytes.clone();
            obfuscate::xor_buffer(&mut bytes, key_len);
            match enc.tag {
                EncryptedTag::Integer => {
                    let arr: [u8; 8] = bytes
                        .try_into()
                        .map_err(|_| ContainerError::Crypto("integer constant has wrong width".to_string()))?;
                    Ok(Value::Integer(i64::from_le_bytes(arr)))
                }
                EncryptedTag::String => {
                    let s = String::from_utf8(bytes).map_err(|e| ContainerError::Crypto(e.to_string()))?;
                    Ok(Value::String(Rc::from(s.as_str())))
                }
                EncryptedTag::Boolean => {
                    let s = String::from_utf8(bytes).map_err(|e| ContainerError::Crypto(e.to_string()))?;
                    Ok(Value::Boolean(s.eq_ignore_ascii_case("true")))
                }
            }
        }
        EncodedConstant::Function(f) => {
            let inner_len = f.instructions.len();
            let mut instructions = f.instructions.clone();
            obfuscate::xor_buffer(&mut instructions, inner_len);
            Ok(Value::CompiledFunction(Rc::new(CompiledFunction {
                instructions,
                num_locals: f.num_locals,
                num_params: f.num_params,
            })))
        }
    }
}

pub fn serialize(program: &EncodedProgram) -> Result<Vec<u8>, ContainerError> {
    Ok(bincode::serialize(program)?)
}

pub fn deserialize(bytes: &[u8]) -> Result<EncodedProgram, ContainerError> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_constants_round_trip_both_values() {
        let bc = Bytecode {
            instructions: vec![0, 1, 2, 3],
            constants: vec![Value::Boolean(true), Value::Boolean(false)],
        };
        let encoded = encode_bytecode(&bc).unwrap();
        let decoded = decode_bytecode(&encoded).unwrap();
        assert_eq!(decoded.constants, vec![Value::Boolean(true), Value::Boolean(false)]);
    }

    #[test]
    fn integer_and_string_constants_round_trip() {
        let bc = Bytecode {
            instructions: vec![9, 9, 9],
            constants: vec![Value::Integer(-42), Value::String(Rc::from("hello"))],
        };
        let encoded = encode_bytecode(&bc).unwrap();
        let decoded = decode_bytecode(&encoded).unwrap();
        assert_eq!(decoded.constants, bc.constants);
    }

    #[test]
    fn compiled_function_constant_round_trips() {
        let inner = CompiledFunction {
            instructions: vec![1, 2, 3, 4, 5],
            num_locals: 2,
            num_params: 1,
        };
        let bc = Bytecode {
            instructions: vec![10, 20],
            constants: vec![Value::CompiledFunction(Rc::new(inner))],
        };
        let encoded = encode_bytecode(&bc).unwrap();
        let decoded = decode_bytecode(&encoded).unwrap();
        assert_eq!(decoded.constants, bc.constants);
    }

    #[test]
    fn serialize_round_trips_through_bytes() {
        let bc = Bytecode {
            instructions: vec![1, 2, 3],
            constants: vec![Value::Integer(7)],
        };
        let encoded = encode_bytecode(&bc).unwrap();
        let bytes = serialize(&encoded).unwrap();
        let decoded_encoded = deserialize(&bytes).unwrap();
        let decoded = decode_bytecode(&decoded_encoded).unwrap();
        assert_eq!(decoded.constants, bc.constants);
    }
}
