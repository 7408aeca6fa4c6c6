//! Buffer Loader (spec.md §4.3): reads the trace-file header and
//! reorders circular-buffer content into decode order.

use crate::error::FatalError;

pub const STREAMING_SENTINEL_A: u32 = 0xFFFF_FFF0;
pub const STREAMING_SENTINEL_B: u32 = 0xFFFF_FFF4;
pub const MAX_BUFFER_WORDS: u32 = 0x0FFF_FFFF;
const HEADER_WORDS: usize = 6;

/// `cfg` bit marking a circular (post-mortem) buffer rather than a
/// linear single-shot one; not distinguishable from `buffer_size` alone
/// since a post-mortem capture can still stop before ever wrapping.
const POST_MORTEM_BIT: u32 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    SingleShot,
    PostMortem,
    Streaming,
}

#[derive(Debug, Clone, Copy)]
pub struct TraceHeader {
    pub last_index: u32,
    pub filter: u32,
    pub cfg: u32,
    pub timestamp_frequency: u32,
    pub filter_copy: u32,
    pub buffer_size: u32,
}

impl TraceHeader {
    fn parse(words: &[u32]) -> Self {
        Self {
            last_index: words[0],
            filter: words[1],
            cfg: words[2],
            timestamp_frequency: words[3],
            filter_copy: words[4],
            buffer_size: words[5],
        }
    }

    #[must_use]
    pub fn fmt_id_bits(&self) -> u8 {
        ((self.cfg >> 24) & 0xFF) as u8
    }

    #[must_use]
    pub fn reserved_bits_set(&self) -> bool {
        self.cfg & !(0xFF00_0000 | POST_MORTEM_BIT) != 0
    }

    #[must_use]
    pub fn mode(&self) -> LoggingMode {
        match self.buffer_size {
            STREAMING_SENTINEL_A | STREAMING_SENTINEL_B => LoggingMode::Streaming,
            _ if self.cfg & POST_MORTEM_BIT != 0 => LoggingMode::PostMortem,
            _ => LoggingMode::SingleShot,
        }
    }
}

fn words_from_le_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Load the trace file and return the header plus the payload words
/// reordered into decode order.
pub fn load(bytes: &[u8], configured_fmt_id_bits: u8) -> Result<(TraceHeader, Vec<u32>), FatalError> {
    if bytes.len() < HEADER_WORDS * 4 {
        return Err(FatalError::BadHeaderSize(10));
    }
    let words = words_from_le_bytes(bytes);
    let header = TraceHeader::parse(&words[..HEADER_WORDS]);
    if header.reserved_bits_set() {
        return Err(FatalError::ReservedCfgBits(11));
    }
    let detected = header.fmt_id_bits();
    if detected != 0 && detected != configured_fmt_id_bits {
        return Err(FatalError::FidWidthMismatch {
            code: 12,
            configured: configured_fmt_id_bits,
            detected,
        });
    }
    if header.buffer_size != STREAMING_SENTINEL_A
        && header.buffer_size != STREAMING_SENTINEL_B
        && header.buffer_size > MAX_BUFFER_WORDS
    {
        return Err(FatalError::BufferTooLarge(13));
    }

    let payload = &words[HEADER_WORDS..];
    let ordered = match header.mode() {
        LoggingMode::SingleShot => {
            let mut data: Vec<u32> = payload
                .iter()
                .take(header.last_index as usize)
                .copied()
                .collect();
            while data.first() == Some(&0xFFFF_FFFF) {
                data.remove(0);
            }
            data
        }
        LoggingMode::PostMortem => {
            let size = header.buffer_size as usize;
            let last = (header.last_index as usize).min(size).min(payload.len());
            let mut ordered = Vec::with_capacity(size);
            ordered.extend_from_slice(&payload[last..size.min(payload.len())]);
            ordered.extend_from_slice(&payload[..last]);
            // 4-word trailer alignment: power-of-two buffers keep a fixed
            // number of known-empty trailer words; skip the matching
            // number of head words to preserve 4-word alignment.
            if size.is_power_of_two() && size >= 4 {
                let trailer_known_empty = 4usize.min(size);
                let skip = 4usize.saturating_sub(trailer_known_empty);
                if skip > 0 && skip <= ordered.len() {
                    ordered.drain(0..skip);
                }
            }
            ordered
        }
        LoggingMode::Streaming => payload.to_vec(),
    };

    Ok((header, ordered))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(last_index: u32, cfg: u32, freq: u32, buffer_size: u32) -> Vec<u8> {
        let mut v = Vec::new();
        for w in [last_index, 0u32, cfg, freq, 0u32, buffer_size] {
            v.extend_from_slice(&w.to_le_bytes());
        }
        v
    }

    #[test]
    fn single_shot_truncates_at_last_index() {
        let mut bytes = header_bytes(2, 9u32 << 24, 1_000_000, 100);
        for w in [10u32, 20, 30, 40] {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        let (header, data) = load(&bytes, 9).unwrap();
        assert_eq!(header.mode(), LoggingMode::SingleShot);
        assert_eq!(data, vec![10, 20]);
    }

    #[test]
    fn post_mortem_reorders_around_last_index() {
        let cfg = (9u32 << 24) | POST_MORTEM_BIT;
        let mut bytes = header_bytes(2, cfg, 1_000_000, 4);
        for w in [10u32, 20, 30, 40] {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        let (header, data) = load(&bytes, 9).unwrap();
        assert_eq!(header.mode(), LoggingMode::PostMortem);
        assert_eq!(data, vec![30, 40, 10, 20]);
    }

    #[test]
    fn reserved_bits_are_rejected() {
        let bytes = header_bytes(0, 0x0000_0001, 0, 16);
        assert!(load(&bytes, 9).is_err());
    }

    #[test]
    fn fid_width_mismatch_is_fatal() {
        let bytes = header_bytes(0, 10u32 << 24, 0, 16);
        assert!(load(&bytes, 9).is_err());
    }
}
