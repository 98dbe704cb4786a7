//! Hash chain match finder for LZSS compression
//!
//! Positions are hashed on their first three bytes. Each hash bucket keeps
//! the newest position in `head`, and older positions with the same hash are
//! linked through a ring of [`WINDOW_SIZE`] entries in `prev`. Positions may
//! be negative: the bytes before the input are the decoder's zero-filled
//! window, so the finder is seeded with the [`MAX_MATCH`] positions that
//! precede the data.

use super::{MAX_MATCH, MIN_MATCH, WINDOW_MASK, WINDOW_SIZE};

const HASH_BITS: u32 = 12;
const HASH_SIZE: usize = 1 << HASH_BITS;
const NIL: isize = isize::MIN / 2;

/// Longest chain walked per lookup
const MAX_CHAIN: usize = 256;

/// A match candidate found in the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Source position in input coordinates (may be negative)
    pub position: isize,
    /// Number of matching bytes
    pub length: usize,
}

/// Hash chain index over one input buffer
#[derive(Debug)]
pub struct MatchFinder<'a> {
    data: &'a [u8],
    head: Vec<isize>,
    prev: Vec<isize>,
}

impl<'a> MatchFinder<'a> {
    /// Index `data`, seeding the positions of the zero-filled window
    pub fn new(data: &'a [u8]) -> Self {
        let mut finder = Self {
            data,
            head: vec![NIL; HASH_SIZE],
            prev: vec![NIL; WINDOW_SIZE],
        };
        for pos in -(MAX_MATCH as isize)..0 {
            finder.insert(pos);
        }
        finder
    }

    /// Byte at `pos`, zero before the start of the input
    #[inline]
    fn byte_at(&self, pos: isize) -> u8 {
        if pos < 0 {
            0
        } else {
            self.data[pos as usize]
        }
    }

    #[inline]
    fn hash(&self, pos: isize) -> usize {
        let a = self.byte_at(pos) as usize;
        let b = self.byte_at(pos + 1) as usize;
        let c = self.byte_at(pos + 2) as usize;
        ((a << 8) ^ (b << 4) ^ c) & (HASH_SIZE - 1)
    }

    #[inline]
    fn slot(pos: isize) -> usize {
        pos.rem_euclid(WINDOW_SIZE as isize) as usize & WINDOW_MASK
    }

    /// Record `pos` in the chains if three bytes are available there
    pub fn insert(&mut self, pos: isize) {
        if pos + MIN_MATCH as isize > self.data.len() as isize {
            return;
        }
        let h = self.hash(pos);
        self.prev[Self::slot(pos)] = self.head[h];
        self.head[h] = pos;
    }

    /// Find the longest match for the bytes at `pos`
    ///
    /// Returns `None` when fewer than [`MIN_MATCH`] bytes match.
    pub fn find(&self, pos: usize) -> Option<Match> {
        let limit = (self.data.len() - pos).min(MAX_MATCH);
        if limit < MIN_MATCH {
            return None;
        }

        let target = &self.data[pos..pos + limit];
        let pos = pos as isize;
        let oldest = pos - WINDOW_SIZE as isize;
        let mut best: Option<Match> = None;
        let mut candidate = self.head[self.hash(pos)];
        let mut steps = 0;

        while candidate > oldest && steps < MAX_CHAIN {
            let length = target
                .iter()
                .enumerate()
                .take_while(|&(i, &b)| self.byte_at(candidate + i as isize) == b)
                .count();

            if length >= MIN_MATCH && best.map_or(true, |m| length > m.length) {
                best = Some(Match {
                    position: candidate,
                    length,
                });
                if length == limit {
                    break;
                }
            }

            candidate = self.prev[Self::slot(candidate)];
            steps += 1;
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_in_unique_data() {
        let data = b"abcdefgh";
        let mut finder = MatchFinder::new(data);
        for pos in 0..4 {
            assert!(finder.find(pos).is_none());
            finder.insert(pos as isize);
        }
    }

    #[test]
    fn test_finds_repeat() {
        let data = b"abcdXabcdY";
        let mut finder = MatchFinder::new(data);
        for pos in 0..5 {
            finder.insert(pos);
        }
        let found = finder.find(5).unwrap();
        assert_eq!(found, Match { position: 0, length: 4 });
    }

    #[test]
    fn test_matches_zero_window() {
        let data = [0u8; 10];
        let finder = MatchFinder::new(&data);
        let found = finder.find(0).unwrap();
        assert!(found.position < 0);
        assert_eq!(found.length, 10);
    }
}
