//! The global parameter record (spec.md §5/§9's "aggregate passed by
//! reference" in place of the original's module-level globals).

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
    Microseconds,
}

impl TimeUnit {
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Milliseconds => 1e3,
            Self::Microseconds => 1e6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsMode {
    Off,
    All,
    Msg,
    Value,
}

/// Allowed timestamp-difference window, in counter ticks once resolved
/// against the buffer's reported frequency.
#[derive(Debug, Clone, Copy)]
pub struct TimestampWindow {
    pub neg_ms: f64,
    pub pos_ms: f64,
}

impl Default for TimestampWindow {
    fn default() -> Self {
        Self {
            neg_ms: -0.33,
            pos_ms: 0.33,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Params {
    pub output_folder: PathBuf,
    pub fmt_folder: PathBuf,
    pub binary_file: Option<PathBuf>,
    pub check_only: bool,
    pub keep_backup: bool,
    pub utf8_console: bool,
    pub number_template: String,
    pub time_template: String,
    pub time_unit: TimeUnit,
    pub timestamp_window: TimestampWindow,
    pub fmt_id_bits: u8,
    pub stats: StatsMode,
    pub debug: bool,
    pub timestamps_csv: bool,
    pub purge_defines: bool,
    pub newline_between_messages: bool,
    pub error_template: String,
    pub locale: Option<String>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::new(),
            fmt_folder: PathBuf::new(),
            binary_file: None,
            check_only: false,
            keep_backup: false,
            utf8_console: false,
            number_template: "%05u".to_string(),
            time_template: "%6.6f".to_string(),
            time_unit: TimeUnit::Seconds,
            timestamp_window: TimestampWindow::default(),
            fmt_id_bits: 12,
            stats: StatsMode::Off,
            debug: false,
            timestamps_csv: false,
            purge_defines: false,
            newline_between_messages: false,
            error_template: "%F(%L): [%E] %D".to_string(),
            locale: None,
        }
    }
}

impl Params {
    #[must_use]
    pub fn topmost(&self) -> u32 {
        (1u32 << self.fmt_id_bits) - 2
    }
}
