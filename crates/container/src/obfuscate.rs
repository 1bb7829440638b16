//! Single-byte XOR obfuscation of instruction bytes.
//!
//! Not cryptographic — the goal is to keep raw opcodes out of a casual hex
//! dump of a `.mu` file, nothing more. The key byte is re-derived from a
//! buffer's length rather than stored alongside it, so decoding needs
//! nothing but the bytes already on hand.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

/// Derive the single XOR key byte for a buffer of the given length. Same
/// length always yields the same byte.
pub fn key_byte(length: usize) -> u8 {
    let mut rng = StdRng::seed_from_u64(length as u64);
    rng.gen::<u8>()
}

pub fn xor_buffer(data: &mut [u8], length: usize) {
    let key = key_byte(length);
    for b in data.iter_mut() {
        *b ^= key;
    }
}

pub fn xor_one(byte: u8, length: usize) -> u8 {
    byte ^ key_byte(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_byte_is_reproducible_for_same_length() {
        assert_eq!(key_byte(42), key_byte(42));
    }

    #[test]
    fn xor_buffer_is_its_own_inverse() {
        let original = vec![1, 2, 3, 4, 5];
        let mut data = original.clone();
        xor_buffer(&mut data, original.len());
        assert_ne!(data, original);
        xor_buffer(&mut data, original.len());
        assert_eq!(data, original);
    }

    #[test]
    fn xor_one_matches_xor_buffer_for_a_single_byte() {
        let mut buf = [7u8];
        xor_buffer(&mut buf, 3);
        assert_eq!(buf[0], xor_one(7, 3));
    }
}
