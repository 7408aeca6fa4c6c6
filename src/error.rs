//! Error bands from the error-handling design: fatal, parse and decode.
//!
//! Each band keeps its own variant set and its own numeric code so that a
//! run-end summary can report per-code counters. Exit-code mapping lives
//! here too since it is a direct function of which band produced the error
//! that terminated (or didn't terminate) the run.

use thiserror::Error;

/// Fatal errors (codes 1..29) abort the run immediately.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("[{0}] stack space exhausted during recursive descent")]
    StackExhausted(u32),
    #[error("[{0}] INCLUDE nesting exceeded the configured depth floor")]
    IncludeTooDeep(u32),
    #[error("[{0}] trace header has reserved cfg bits set")]
    ReservedCfgBits(u32),
    #[error("[{0}] trace header size does not match the expected layout")]
    BadHeaderSize(u32),
    #[error("[{code}] configured format-id bit width ({configured}) disagrees with header ({detected})")]
    FidWidthMismatch {
        code: u32,
        configured: u8,
        detected: u8,
    },
    #[error("[{0}] buffer_size exceeds the maximum supported circular-buffer size")]
    BufferTooLarge(u32),
    #[error("[{0}] {1}")]
    Io(u32, std::io::Error),
    #[error("[{0}] {1}")]
    Other(u32, String),
}

impl FatalError {
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::StackExhausted(c)
            | Self::IncludeTooDeep(c)
            | Self::ReservedCfgBits(c)
            | Self::BadHeaderSize(c)
            | Self::BufferTooLarge(c)
            | Self::Io(c, _)
            | Self::Other(c, _) => *c,
            Self::FidWidthMismatch { code, .. } => *code,
        }
    }
}

/// Parse errors (codes 100..199), reported with file/line/column and
/// bounded per file by `MAX_ERRORS_REPORTED`.
#[derive(Debug, Error, Clone)]
#[error("{file}:{line}:{column}: [{code}] {message}{}", context.as_ref().map(|c| format!(" near `{c}`")).unwrap_or_default())]
pub struct ParseError {
    pub code: u32,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub context: Option<String>,
}

impl ParseError {
    #[must_use]
    pub fn new(code: u32, file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            file: file.into(),
            line,
            column: 0,
            message: message.into(),
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, column: u32, context: impl Into<String>) -> Self {
        self.column = column;
        self.context = Some(context.into());
        self
    }
}

/// Decode errors (codes 200+), buffered per message and emitted after the
/// message's own output.
#[derive(Debug, Error, Clone)]
#[error("[{code}] {message}")]
pub struct DecodeError {
    pub code: u32,
    pub message: String,
    pub arg_a: i64,
    pub arg_b: i64,
    pub snippet: Option<String>,
}

impl DecodeError {
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            arg_a: 0,
            arg_b: 0,
            snippet: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, a: i64, b: i64) -> Self {
        self.arg_a = a;
        self.arg_b = b;
        self
    }

    #[must_use]
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

pub mod codes {
    pub const BAD_BLOCK: u32 = 200;
    pub const UNFINISHED_BLOCK: u32 = 201;
    pub const MESSAGE_TOO_LONG: u32 = 202;
    pub const MSGX_SIZE_CORRUPT: u32 = 203;
    pub const UNKNOWN_FID: u32 = 204;
    pub const TIMESTAMP_GAP: u32 = 205;
    pub const BIT_RANGE_OVERFLOW: u32 = 206;
    pub const LENGTH_MISMATCH: u32 = 207;
}

/// Top-level run outcome, mapped to the documented process exit codes.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Fatal(#[from] FatalError),
    #[error("format-parse errors were reported")]
    ParseErrors,
    #[error("fatal decode error")]
    FatalDecode,
    #[error("non-fatal decode errors; buffer finished")]
    NonFatalDecode,
    #[error("stack exhaustion")]
    StackExhaustion,
    #[error("exception during format parse: {0}")]
    ParseException(String),
    #[error("exception during decode: {0}")]
    DecodeException(String),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Fatal(e) => e.code() as i32,
            Self::ParseErrors => 1,
            Self::FatalDecode => 2,
            Self::NonFatalDecode => 3,
            Self::StackExhaustion => 4,
            Self::ParseException(_) => 5,
            Self::DecodeException(_) => 6,
        }
    }
}
