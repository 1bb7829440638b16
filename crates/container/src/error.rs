//! Error kinds for the artifact container pipeline: encode/decode, the
//! envelope cipher, and the outer signature frame.

use std::fmt;

#[derive(Debug)]
pub enum ContainerError {
    WrongSignature,
    Serialize(bincode::Error),
    Crypto(String),
    UnsupportedConstant(&'static str),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::WrongSignature => write!(f, "wrong signature"),
            ContainerError::Serialize(e) => write!(f, "serialize error: {}", e),
            ContainerError::Crypto(msg) => write!(f, "crypto error: {}", msg),
            ContainerError::UnsupportedConstant(name) => {
                write!(f, "constant of type {} cannot be stored in an artifact", name)
            }
        }
    }
}

impl std::error::Error for ContainerError {}

impl From<bincode::Error> for ContainerError {
    fn from(e: bincode::Error) -> Self {
        ContainerError::Serialize(e)
    }
}
