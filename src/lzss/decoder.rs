//! Incremental LZSS decoder
//!
//! The decoder keeps its window and any half-read item between calls, so
//! input can be fed in chunks of any size.

use super::{INITIAL_POSITION, MIN_MATCH, WINDOW_MASK, WINDOW_SIZE};

/// Decoder state carried across input chunks
#[derive(Debug, Clone)]
pub struct LzssDecoder {
    window: Box<[u8; WINDOW_SIZE]>,
    window_pos: usize,
    /// Remaining flag bits; bit 8 marks that at least one bit is left
    flags: u16,
    /// First byte of a match whose second byte has not arrived yet
    pending: Option<u8>,
    /// Bytes written so far
    pub total_out: usize,
}

impl Default for LzssDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LzssDecoder {
    /// Create a decoder with a zero-filled window
    pub fn new() -> Self {
        Self {
            window: Box::new([0u8; WINDOW_SIZE]),
            window_pos: INITIAL_POSITION,
            flags: 0,
            pending: None,
            total_out: 0,
        }
    }

    /// True when the decoder stopped in the middle of an item
    pub fn is_mid_item(&self) -> bool {
        self.pending.is_some()
    }

    fn put(&mut self, byte: u8, output: &mut Vec<u8>) {
        output.push(byte);
        self.window[self.window_pos] = byte;
        self.window_pos = (self.window_pos + 1) & WINDOW_MASK;
        self.total_out += 1;
    }

    /// Decode every byte of `input`, appending to `output`
    pub fn feed(&mut self, input: &[u8], output: &mut Vec<u8>) {
        for &byte in input {
            if self.flags & 0x100 == 0 {
                self.flags = byte as u16 | 0xFF00;
                continue;
            }

            if self.flags & 1 != 0 {
                self.put(byte, output);
                self.flags >>= 1;
                continue;
            }

            match self.pending.take() {
                None => self.pending = Some(byte),
                Some(low) => {
                    let offset = low as usize | ((byte as usize & 0xF0) << 4);
                    let length = (byte as usize & 0x0F) + MIN_MATCH;
                    for i in 0..length {
                        // read before write, overlapping copies repeat the pattern
                        let value = self.window[(offset + i) & WINDOW_MASK];
                        self.put(value, output);
                    }
                    self.flags >>= 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        let mut decoder = LzssDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&[0xFF, b'a', b'b', b'c'], &mut out);
        assert_eq!(out, b"abc");
        assert_eq!(decoder.total_out, 3);
    }

    #[test]
    fn test_overlapping_match() {
        // literal 'x' at window 4078, then a match of 5 bytes from 4078
        let pos = INITIAL_POSITION;
        let b1 = (pos & 0xFF) as u8;
        let b2 = (((pos >> 4) & 0xF0) | (5 - MIN_MATCH)) as u8;
        let mut decoder = LzssDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&[0b0000_0001, b'x', b1, b2], &mut out);
        assert_eq!(out, b"xxxxxx");
    }

    #[test]
    fn test_split_input() {
        let pos = INITIAL_POSITION;
        let b1 = (pos & 0xFF) as u8;
        let b2 = (((pos >> 4) & 0xF0) | 1) as u8;
        let stream = [0b0000_0011, b'a', b'b', b1, b2];

        let mut whole = Vec::new();
        LzssDecoder::new().feed(&stream, &mut whole);

        let mut decoder = LzssDecoder::new();
        let mut pieces = Vec::new();
        for byte in stream {
            decoder.feed(&[byte], &mut pieces);
        }
        assert_eq!(whole, pieces);
        assert_eq!(whole, b"ababab");
    }

    #[test]
    fn test_truncated_match() {
        let mut decoder = LzssDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&[0b0000_0001, b'q', 0x10], &mut out);
        assert_eq!(out, b"q");
        assert!(decoder.is_mid_item());
    }

    #[test]
    fn test_zero_window() {
        // match from a never-written slot yields zeros
        let mut decoder = LzssDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&[0x00, 0x00, 0x00], &mut out);
        assert_eq!(out, vec![0u8; 3]);
    }
}
