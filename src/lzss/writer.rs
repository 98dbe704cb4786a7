//! LzssWriter - Streaming compression writer
//!
//! Input is accumulated and compressed in one pass on [`LzssWriter::finish`],
//! since matches may reach back across the whole window.

use super::hash::MatchFinder;
use super::{INITIAL_POSITION, MIN_MATCH, WINDOW_MASK, WINDOW_SIZE};
use crate::Result;
use std::io::Write;

/// Streaming compression writer implementing Write trait
#[derive(Debug)]
pub struct LzssWriter<W: Write> {
    writer: W,
    input_buffer: Vec<u8>,
}

impl<W: Write> LzssWriter<W> {
    /// Create a new LzssWriter
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            input_buffer: Vec::new(),
        }
    }

    /// Compress everything written so far and return the inner writer
    pub fn finish(mut self) -> Result<W> {
        let packed = encode(&self.input_buffer);
        self.writer.write_all(&packed)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> Write for LzssWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.input_buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Compress a whole buffer with greedy longest-match parsing
fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    if data.is_empty() {
        return out;
    }

    let mut finder = MatchFinder::new(data);
    let mut flag_index = out.len();
    out.push(0);
    let mut flag_bit = 0u8;
    let mut pos = 0usize;

    while pos < data.len() {
        let consumed = match finder.find(pos) {
            Some(found) => {
                let wp = (INITIAL_POSITION as isize + found.position)
                    .rem_euclid(WINDOW_SIZE as isize) as usize
                    & WINDOW_MASK;
                out.push((wp & 0xFF) as u8);
                out.push((((wp >> 4) & 0xF0) | (found.length - MIN_MATCH)) as u8);
                found.length
            }
            None => {
                out[flag_index] |= 1 << flag_bit;
                out.push(data[pos]);
                1
            }
        };

        for p in pos..pos + consumed {
            finder.insert(p as isize);
        }
        pos += consumed;

        flag_bit += 1;
        if flag_bit == 8 && pos < data.len() {
            flag_index = out.len();
            out.push(0);
            flag_bit = 0;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lzss::decompress_bytes;

    #[test]
    fn test_all_literals() {
        let packed = encode(b"abc");
        assert_eq!(packed, vec![0b0000_0111, b'a', b'b', b'c']);
    }

    #[test]
    fn test_match_encoding() {
        // "abcabc": three literals then one 3-byte match at window 4078
        let packed = encode(b"abcabc");
        assert_eq!(packed, vec![0b0000_0111, b'a', b'b', b'c', 0xEE, 0xF0]);
    }

    #[test]
    fn test_flag_byte_boundary() {
        // exactly eight literals need no trailing flag byte
        let packed = encode(b"01234567");
        assert_eq!(packed.len(), 9);
        let packed = encode(b"012345678");
        assert_eq!(packed.len(), 11);
        assert_eq!(decompress_bytes(&packed).unwrap(), b"012345678");
    }

    #[test]
    fn test_writer_returns_inner() -> Result<()> {
        let mut writer = LzssWriter::new(Vec::new());
        writer.write_all(b"hello ")?;
        writer.write_all(b"hello hello")?;
        let packed = writer.finish()?;
        assert_eq!(decompress_bytes(&packed)?, b"hello hello hello");
        Ok(())
    }
}
