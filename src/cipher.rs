//! Password obfuscation of the packfile envelope
//!
//! Allegro "encrypts" a packfile by XOR-ing the outer magic with a mask
//! folded from the password, and the payload with the password bytes
//! themselves. Both operations are their own inverse. This is legacy
//! compatibility, not a security boundary.

use crate::common::NEW_FORMAT_MASK;

/// Obfuscates (or restores) a 32-bit magic number
///
/// # Arguments
/// * `id` - The value to transform
/// * `password` - Password bytes; an empty password leaves `id` untouched.
///   Bytes from 0x80 up are sign-extended before shifting.
/// * `new_format` - Also fold the constant 42 into the mask
///
/// # Returns
/// `id` XOR-ed with the password mask
pub fn encrypt_id(id: u32, password: &[u8], new_format: bool) -> u32 {
    if password.is_empty() {
        return id;
    }

    let mut mask = password
        .iter()
        .enumerate()
        .fold(0u32, |mask, (i, &b)| mask ^ ((b as i8 as i32 as u32) << ((i & 3) * 8)));
    if new_format {
        mask ^= NEW_FORMAT_MASK;
    }

    id ^ mask
}

/// XORs `buffer[start..]` with the cycling password
///
/// When the password is longer than four bytes the cycle begins at
/// password index 4. Empty passwords and out-of-range starts are no-ops.
pub fn encrypt_buffer(buffer: &mut [u8], password: &[u8], start: usize) {
    if password.is_empty() || start >= buffer.len() {
        return;
    }

    let first = if password.len() > 4 { 4 } else { 0 };
    let key = password.iter().cycle().skip(first);
    for (byte, k) in buffer[start..].iter_mut().zip(key) {
        *byte ^= k;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_id_empty_password() {
        assert_eq!(encrypt_id(0xDEAD_BEEF, b"", true), 0xDEAD_BEEF);
    }

    #[test]
    fn test_encrypt_id_mask() {
        // 'a' at shift 0, 'b' at shift 8
        let mask = 0x61 | (0x62 << 8);
        assert_eq!(encrypt_id(0, b"ab", false), mask);
        assert_eq!(encrypt_id(0, b"ab", true), mask ^ 42);

        // the fifth byte wraps back to shift 0
        assert_eq!(encrypt_id(0, b"abcde", false), 0x6463_6261 ^ 0x65);
    }

    #[test]
    fn test_encrypt_id_high_bytes_sign_extend() {
        assert_eq!(encrypt_id(0, &[0xE9], false), 0xFFFF_FFE9);
        // UTF-8 "é" is C3 A9; the second byte spreads over the upper 24 bits
        assert_eq!(encrypt_id(0, "é".as_bytes(), false), 0xFFFF_FFC3 ^ 0xFFFF_A900);
        let once = encrypt_id(0x1234_5678, "é".as_bytes(), true);
        assert_eq!(encrypt_id(once, "é".as_bytes(), true), 0x1234_5678);
    }

    #[test]
    fn test_encrypt_buffer_short_password() {
        let mut buf = [0u8; 5];
        encrypt_buffer(&mut buf, b"xy", 0);
        assert_eq!(buf, [b'x', b'y', b'x', b'y', b'x']);
    }

    #[test]
    fn test_encrypt_buffer_long_password_starts_at_four() {
        let mut buf = [0u8; 4];
        encrypt_buffer(&mut buf, b"abcdef", 0);
        assert_eq!(&buf, b"efab");
    }

    #[test]
    fn test_encrypt_buffer_offset() {
        let mut buf = [1u8, 2, 3, 4, 0, 0];
        encrypt_buffer(&mut buf, b"k", 4);
        assert_eq!(buf, [1, 2, 3, 4, b'k', b'k']);

        let mut short = [7u8; 3];
        encrypt_buffer(&mut short, b"k", 3);
        assert_eq!(short, [7; 3]);
    }
}
