//! Command-line surface: the dual invocation shapes from spec.md §6 and the
//! `@parameter_file` expansion that must happen before `clap` ever sees the
//! argument vector.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::error::FatalError;
use crate::params::{Params, StatsMode, TimeUnit, TimestampWindow};

#[derive(Debug, Parser)]
#[command(name = "rtemsg", about = "Decode RTEdbg binary trace buffers into human-readable messages")]
struct RawArgs {
    output_folder: String,
    fmt_folder: String,

    #[arg(long = "c", action = clap::ArgAction::SetTrue)]
    check_only: bool,
    #[arg(long = "back", action = clap::ArgAction::SetTrue)]
    back: bool,
    #[arg(long = "utf8", action = clap::ArgAction::SetTrue)]
    utf8: bool,
    #[arg(long = "nr")]
    nr: Option<String>,
    #[arg(long = "T")]
    timestamp_template: Option<String>,
    #[arg(long = "time")]
    time: Option<String>,
    #[arg(long = "ts")]
    ts: Option<String>,
    #[arg(long = "N")]
    n: Option<u8>,
    #[arg(long = "stat")]
    stat: Option<String>,
    #[arg(long = "debug", action = clap::ArgAction::SetTrue)]
    debug: bool,
    #[arg(long = "timestamps", action = clap::ArgAction::SetTrue)]
    timestamps: bool,
    #[arg(long = "purge", action = clap::ArgAction::SetTrue)]
    purge: bool,
    #[arg(long = "newline", action = clap::ArgAction::SetTrue)]
    newline: bool,
    #[arg(long = "e")]
    error_template: Option<String>,
    #[arg(long = "locale")]
    locale: Option<String>,

    binary_file: Option<String>,
}

fn strip_folder(raw: &str) -> PathBuf {
    let trimmed = raw.trim_matches('"');
    let trimmed = trimmed.trim_end_matches(['/', '\\']);
    PathBuf::from(trimmed)
}

/// Expand a leading `@parameter_file` argument (spec.md §6) into a flat
/// argv, splicing one token per non-empty line, before `clap` parses it.
fn expand_parameter_file(args: &[String]) -> Result<Vec<String>, FatalError> {
    if let Some(first) = args.get(1) {
        if let Some(path) = first.strip_prefix('@') {
            let contents = fs::read_to_string(path).map_err(|e| FatalError::Io(10, e))?;
            let mut expanded = vec![args[0].clone()];
            expanded.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            );
            return Ok(expanded);
        }
    }
    Ok(args.to_vec())
}

fn parse_ts(spec: &str) -> Result<TimestampWindow, FatalError> {
    let (neg, pos) = spec
        .split_once(';')
        .ok_or_else(|| FatalError::Other(11, format!("-ts expects `neg;pos`, got `{spec}`")))?;
    let neg_ms: f64 = neg
        .parse()
        .map_err(|_| FatalError::Other(11, format!("invalid -ts negative magnitude `{neg}`")))?;
    let pos_ms: f64 = pos
        .parse()
        .map_err(|_| FatalError::Other(11, format!("invalid -ts positive magnitude `{pos}`")))?;
    if neg_ms >= 0.0 || pos_ms <= 0.0 {
        return Err(FatalError::Other(11, "-ts requires neg<0 and pos>0".into()));
    }
    for m in [neg_ms.abs(), pos_ms.abs()] {
        if !(0.01..=0.33).contains(&m) {
            return Err(FatalError::Other(
                11,
                "-ts magnitudes must be within [0.01, 0.33] of the counter period".into(),
            ));
        }
    }
    Ok(TimestampWindow { neg_ms, pos_ms })
}

/// Parse `argv` (as given by `std::env::args`) into a fully-populated
/// [`Params`], handling the `@file` and folder-pair invocation shapes.
pub fn parse_params(argv: &[String]) -> Result<Params, FatalError> {
    let expanded = expand_parameter_file(argv)?;
    let raw = RawArgs::try_parse_from(&expanded)
        .map_err(|e| FatalError::Other(12, e.to_string()))?;

    let mut params = Params::default();
    params.output_folder = strip_folder(&raw.output_folder);
    params.fmt_folder = strip_folder(&raw.fmt_folder);
    params.binary_file = raw.binary_file.map(PathBuf::from);
    params.check_only = raw.check_only;
    params.keep_backup = raw.back;
    params.utf8_console = raw.utf8;
    if let Some(nr) = raw.nr {
        params.number_template = format!("%{nr}");
    }
    if let Some(t) = raw.timestamp_template {
        params.time_template = format!("%{t}");
    }
    if let Some(unit) = raw.time {
        params.time_unit = match unit.as_str() {
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Seconds,
            "ms" => TimeUnit::Milliseconds,
            "u" | "us" => TimeUnit::Microseconds,
            other => {
                return Err(FatalError::Other(13, format!("unknown -time unit `{other}`")))
            }
        };
    }
    if let Some(ts) = raw.ts {
        params.timestamp_window = parse_ts(&ts)?;
    }
    match raw.n {
        Some(n) if (9..=16).contains(&n) => params.fmt_id_bits = n,
        Some(n) => {
            return Err(FatalError::Other(
                14,
                format!("-N must be within [9,16], got {n}"),
            ))
        }
        None => return Err(FatalError::Other(14, "-N is mandatory".into())),
    }
    if let Some(stat) = raw.stat {
        params.stats = match stat.as_str() {
            "all" => StatsMode::All,
            "msg" => StatsMode::Msg,
            "value" => StatsMode::Value,
            other => {
                return Err(FatalError::Other(15, format!("unknown -stat mode `{other}`")))
            }
        };
    }
    params.debug = raw.debug;
    params.timestamps_csv = raw.timestamps;
    params.purge_defines = raw.purge;
    params.newline_between_messages = raw.newline;
    if let Some(tmpl) = raw.error_template {
        params.error_template = tmpl;
    }
    params.locale = raw.locale;

    if !params.check_only && params.binary_file.is_none() {
        return Err(FatalError::Other(16, "binary_file is required unless -c is given".into()));
    }
    Ok(params)
}

#[must_use]
pub fn resolve_fmt_files(fmt_folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(fmt_folder)
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "fmt").unwrap_or(false))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quotes_and_trailing_separators() {
        assert_eq!(strip_folder("\"out/\""), PathBuf::from("out"));
        assert_eq!(strip_folder("out\\"), PathBuf::from("out"));
    }

    #[test]
    fn ts_window_parses_valid_pair() {
        let w = parse_ts("-0.2;0.3").unwrap();
        assert!((w.neg_ms + 0.2).abs() < 1e-9);
        assert!((w.pos_ms - 0.3).abs() < 1e-9);
    }

    #[test]
    fn ts_window_rejects_wrong_signs() {
        assert!(parse_ts("0.2;0.3").is_err());
        assert!(parse_ts("-0.2;-0.3").is_err());
    }
}
