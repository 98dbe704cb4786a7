//! LzssReader - Streaming decompression reader
//!
//! Wraps any [`Read`] source and yields decompressed bytes through the
//! [`Read`] trait, pulling compressed input in fixed-size chunks.

use super::decoder::LzssDecoder;
use log::debug;
use std::io::Read;

/// Compressed bytes pulled from the source per refill
const IN_BUFF_SIZE: usize = 0x800;

/// Streaming decompression reader implementing Read trait
#[derive(Debug)]
pub struct LzssReader<R: Read> {
    reader: R,
    decoder: LzssDecoder,
    finished: bool,
    input_buffer: Vec<u8>,
    output_buffer: Vec<u8>,
    output_pos: usize,
}

impl<R: Read> LzssReader<R> {
    /// Create a new LzssReader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: LzssDecoder::new(),
            finished: false,
            input_buffer: vec![0u8; IN_BUFF_SIZE],
            output_buffer: Vec::new(),
            output_pos: 0,
        }
    }

    /// Total number of bytes decompressed so far
    pub fn total_out(&self) -> usize {
        self.decoder.total_out
    }

    /// Consume the reader, returning the wrapped source
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decode input until some output is available or the source ends
    fn fill(&mut self) -> std::io::Result<()> {
        self.output_buffer.clear();
        self.output_pos = 0;

        while self.output_buffer.is_empty() && !self.finished {
            let read = self.reader.read(&mut self.input_buffer)?;
            if read == 0 {
                if self.decoder.is_mid_item() {
                    debug!("LZSS stream ends inside a match record");
                }
                self.finished = true;
                break;
            }
            self.decoder
                .feed(&self.input_buffer[..read], &mut self.output_buffer);
        }
        Ok(())
    }
}

impl<R: Read> Read for LzssReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.output_pos >= self.output_buffer.len() {
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }

        let available = self.output_buffer.len() - self.output_pos;
        let to_copy = buf.len().min(available);
        buf[..to_copy]
            .copy_from_slice(&self.output_buffer[self.output_pos..self.output_pos + to_copy]);
        self.output_pos += to_copy;
        Ok(to_copy)
    }
}
