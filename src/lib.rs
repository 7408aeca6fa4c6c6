//! Decodes RTEdbg binary trace buffers into human-readable per-message
//! records, driven by programmer-authored `.fmt`/`.h` format-definition
//! files.
//!
//! The crate splits into the two subsystems this tool is built around: a
//! [`compiler`] that turns format-definition files into an in-memory table
//! of per-message decoding plans, and a decode pipeline ([`buffer`],
//! [`reassembler`], [`timestamp`], [`decoder`]) that walks a trace buffer
//! through those plans. [`session`] ties both halves together behind one
//! `Decoder` aggregate.

/// Bit-level field extraction over an assembled message.
pub mod bits;
/// Reads the trace file header and reorders circular-buffer content.
pub mod buffer;
/// `Messages.txt` catalogue loader.
pub mod catalogue;
/// Command-line argument parsing and `@file` expansion.
pub mod cli;
/// Format compiler: directive dispatch, format-string parsing, header sync.
pub mod compiler;
/// Value Decoder / Printer.
pub mod decoder;
/// Interns names of filters, memos, input/output files and text lists.
pub mod enum_table;
/// Error bands (fatal/parse/decode) and exit-code mapping.
pub mod error;
/// Per-message/per-file error ring buffers and the `-e=FMT` template.
pub mod errors_report;
/// Format-ID allocator.
pub mod fid;
/// The global parameter record.
pub mod params;
/// Decoding Plan and Value-Slot Descriptor data model.
pub mod plan;
/// A minimal printf-style interpolator.
pub mod printf;
/// Message Reassembler.
pub mod reassembler;
/// The `Decoder` aggregate tying the compiler and decode pipeline together.
pub mod session;
/// Per-value and per-message statistics.
pub mod stats;
/// Timestamp Reconstructor.
pub mod timestamp;

pub use crate::error::{DecodeError, FatalError, ParseError, RunError};
pub use crate::params::Params;
pub use crate::session::Decoder;
