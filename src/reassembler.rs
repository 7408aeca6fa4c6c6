//! Message Reassembler (spec.md §4.4): splits the word stream into
//! FMT-terminated sub-packets and stitches continuations that share a
//! timestamp+id tag into one assembled message.

use crate::error::{codes, DecodeError};
use crate::fid::{LONG_TIMESTAMP, TSTAMP_FREQUENCY};
use crate::plan::Plan;

pub const MAX_RAW_DATA_SIZE: usize = 4;
pub const MAX_MSG_BLOCKS: usize = 64;

#[derive(Debug, Clone)]
pub struct AssembledMessage {
    pub fid: u32,
    pub words: Vec<u32>,
    pub additional_data: u32,
    pub tstamp_l: u32,
    pub starting_index: usize,
}

/// Walks a flat word buffer, yielding reassembled messages and surfacing
/// structural errors (bad block, unfinished block, too-long message) as it
/// goes.
pub struct Reassembler<'a> {
    words: &'a [u32],
    pos: usize,
    fmt_id_bits: u8,
}

impl<'a> Reassembler<'a> {
    #[must_use]
    pub fn new(words: &'a [u32], fmt_id_bits: u8) -> Self {
        Self {
            words,
            pos: 0,
            fmt_id_bits,
        }
    }

    fn fmt_id_shift(&self) -> u32 {
        32 - self.fmt_id_bits as u32
    }

    fn is_fmt_word(word: u32) -> bool {
        word & 1 == 1
    }

    fn split_fmt(&self, fmt: u32) -> (u32, u32) {
        let fid = fmt >> self.fmt_id_shift();
        let tstamp_l = (fmt & !1u32) << self.fmt_id_bits;
        (fid, tstamp_l)
    }

    fn expected_words(plan: Option<&Plan>) -> u32 {
        plan.map(Plan::expected_subpacket_words).unwrap_or(5)
    }

    /// Read the next message, or `None` at end of buffer. `plan_for` looks
    /// up the plan for a FID to determine expected sub-packet length.
    pub fn next_message<'p>(
        &mut self,
        plan_for: impl Fn(u32) -> Option<&'p Plan>,
    ) -> Option<Result<AssembledMessage, DecodeError>> {
        if self.pos >= self.words.len() {
            return None;
        }
        let starting_index = self.pos;
        let mut assembled: Vec<u32> = Vec::new();
        let mut tag: Option<(u32, u32)> = None;
        let mut additional_data: u32 = 0;
        let mut blocks = 0usize;

        loop {
            let (raw_data, fmt, bad_block) = match self.read_subpacket() {
                Ok(v) => v,
                Err(e) => return Some(Err(e)),
            };
            let Some(fmt) = fmt else {
                if bad_block {
                    return Some(Err(DecodeError::new(codes::UNFINISHED_BLOCK, "buffer ended mid sub-packet")
                        .with_args(starting_index as i64, 0)));
                }
                return None;
            };
            let (fid, tstamp_l) = self.split_fmt(fmt);
            if tag.is_none() {
                tag = Some((fid, tstamp_l));
            }
            let plan = plan_for(fid);
            let expected = Self::expected_words(plan);

            // Redistribute the FMT word's low bits into bit 31 of each
            // DATA word; the remaining low bits (below the data-word
            // count) become additional_data.
            let used_bits = raw_data.len() as u32;
            let bits = fmt >> 1;
            for (i, word) in raw_data.iter().enumerate() {
                let bit = (bits >> i) & 1;
                assembled.push(word | (bit << 31));
            }
            additional_data |= bits >> used_bits;

            blocks += 1;
            let have_full_length = (assembled.len() as u32 + 1) >= expected;
            if have_full_length || fid == LONG_TIMESTAMP || fid == TSTAMP_FREQUENCY {
                return Some(Ok(AssembledMessage {
                    fid,
                    words: assembled,
                    additional_data,
                    tstamp_l,
                    starting_index,
                }));
            }
            if blocks >= MAX_MSG_BLOCKS {
                return Some(Err(DecodeError::new(codes::MESSAGE_TOO_LONG, "message exceeded MAX_MSG_BLOCKS sub-packets")
                    .with_args(starting_index as i64, blocks as i64)));
            }
            // Continue only if the next sub-packet shares the tag.
        }
    }

    /// Read one sub-packet: up to [`MAX_RAW_DATA_SIZE`] DATA words followed
    /// by a FMT word. Returns `(data_words, fmt_word, hit_bad_block)`.
    fn read_subpacket(&mut self) -> Result<(Vec<u32>, Option<u32>, bool), DecodeError> {
        let mut raw_data = Vec::new();
        loop {
            if self.pos >= self.words.len() {
                let had_data = !raw_data.is_empty();
                return Ok((raw_data, None, had_data));
            }
            let word = self.words[self.pos];
            if word == 0xFFFF_FFFF {
                if !raw_data.is_empty() {
                    self.pos += 1;
                    return Err(DecodeError::new(codes::BAD_BLOCK, "sentinel word inside an open sub-packet")
                        .with_args(self.pos as i64 - 1, 0));
                }
                while self.pos < self.words.len() && self.words[self.pos] == 0xFFFF_FFFF {
                    self.pos += 1;
                }
                continue;
            }
            if Self::is_fmt_word(word) {
                self.pos += 1;
                return Ok((raw_data, Some(word), false));
            }
            raw_data.push(word);
            self.pos += 1;
            if raw_data.len() >= MAX_RAW_DATA_SIZE {
                // Keep reading; the caller treats `>4` before a FMT word as
                // a bad block once it actually overflows on the next push.
            }
            if raw_data.len() > MAX_RAW_DATA_SIZE {
                return Err(DecodeError::new(codes::BAD_BLOCK, "more than MAX_RAW_DATA_SIZE data words before a FMT word")
                    .with_args(self.pos as i64, 0));
            }
        }
    }
}

/// MSGX finalization (spec.md §4.4): the last byte of the last data word
/// holds the message size in bytes.
pub fn finalize_msgx(words: &[u32]) -> Result<Vec<u8>, DecodeError> {
    if words.is_empty() {
        return Err(DecodeError::new(codes::MSGX_SIZE_CORRUPT, "MSGX message has no data words"));
    }
    let last = *words.last().unwrap();
    let size = (last >> 24) as usize & 0xFF;
    let total_bytes = words.len() * 4;
    if size > total_bytes - 1 || size < total_bytes.saturating_sub(4) {
        return Err(DecodeError::new(codes::MSGX_SIZE_CORRUPT, "MSGX trailing size out of range")
            .with_args(size as i64, total_bytes as i64));
    }
    let mut bytes = Vec::with_capacity(total_bytes);
    for w in words {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    for b in &bytes[size..total_bytes - 1] {
        if *b != 0 {
            return Err(DecodeError::new(codes::MSGX_SIZE_CORRUPT, "MSGX padding byte is nonzero")
                .with_snippet(format!("{bytes:02x?}")));
        }
    }
    bytes.truncate(size);
    Ok(bytes)
}
