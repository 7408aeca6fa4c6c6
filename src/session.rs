//! The `Decoder` aggregate (spec.md §9's design note): replaces the
//! original's process-wide globals with one struct that owns the compiled
//! plan table plus all runtime decode state, with every decode operation
//! implemented as a method on it.

use std::collections::HashMap;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::buffer::{self, TraceHeader};
use crate::catalogue::Catalogue;
use crate::compiler::{CompileOutput, Compiler};
use crate::decoder::{self, DecodeContext};
use crate::enum_table::Payload;
use crate::error::{codes, DecodeError, FatalError};
use crate::errors_report::{render_error_template, ErrorCounters, MessageErrorRing};
use crate::fid::{LONG_TIMESTAMP, TSTAMP_FREQUENCY};
use crate::params::{Params, StatsMode};
use crate::reassembler::{self, Reassembler};
use crate::stats::StatisticsTracker;
use crate::timestamp::TimestampReconstructor;

pub struct Decoder {
    pub params: Params,
    pub plans: CompileOutput,
    pub stats: StatisticsTracker,
    pub errors: ErrorCounters,
    pub tstamp: TimestampReconstructor,
    pub catalogue: Catalogue,
    main_log: Vec<u8>,
    errors_log: Vec<u8>,
    out_files: HashMap<usize, Vec<u8>>,
    timestamps: Vec<(u64, f64)>,
    message_count: u64,
}

/// `Messages.txt` lives alongside the executable, not the output folder
/// (spec.md §6).
fn catalogue_path() -> std::path::PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("Messages.txt")))
        .unwrap_or_else(|| std::path::PathBuf::from("Messages.txt"))
}

pub struct RunReport {
    pub messages_decoded: u64,
    pub fatal_decode_errors: u64,
    pub decode_errors: u64,
}

impl Decoder {
    #[must_use]
    pub fn new(params: Params, plans: CompileOutput) -> Self {
        let tstamp = TimestampReconstructor::new(params.timestamp_window);
        let catalogue = Catalogue::load(&catalogue_path());
        Self {
            params,
            plans,
            stats: StatisticsTracker::default(),
            errors: ErrorCounters::default(),
            tstamp,
            catalogue,
            main_log: Vec::new(),
            errors_log: Vec::new(),
            out_files: HashMap::new(),
            timestamps: Vec::new(),
            message_count: 0,
        }
    }

    /// Compile every `.fmt` file under `fmt_folder` (spec.md §4.2).
    pub fn compile(fmt_files: &[std::path::PathBuf], params: Params) -> Self {
        let compiler = Compiler::new(params.fmt_id_bits);
        let out = compiler.compile(fmt_files);
        Self::new(params, out)
    }

    fn route(&mut self, out_file: usize, also_main_log: bool, bytes: &[u8]) {
        if out_file == 0 || also_main_log {
            self.main_log.extend_from_slice(bytes);
        }
        if out_file != 0 {
            self.out_files.entry(out_file).or_default().extend_from_slice(bytes);
        }
    }

    /// Render a decode error through the `-e=FMT` template (spec.md §6, §7)
    /// and append it to `Errors.log`. Decode errors carry no file/line of
    /// their own (spec.md §7: "code, two numeric slots, format-string
    /// snippet"), so the binary trace file stands in for `%F`/`%P` and
    /// `%L` reports the message sequence number instead of a source line.
    fn append_decode_error(&mut self, err: &DecodeError) {
        self.errors.bump(err.code);
        let file = self
            .params
            .binary_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let context = err
            .snippet
            .clone()
            .unwrap_or_else(|| format!("{}, {}", err.arg_a, err.arg_b));
        let rendered = render_error_template(
            &self.params.error_template,
            self.message_count as u32,
            err.code,
            &file,
            &file,
            &self.catalogue,
            &context,
        );
        self.errors_log.extend_from_slice(rendered.as_bytes());
        self.errors_log.push(b'\n');
    }

    /// Decode an entire loaded trace buffer, routing output text into the
    /// in-memory log buffers retrievable via [`Decoder::write_outputs`].
    pub fn decode_buffer(&mut self, header: &TraceHeader, words: &[u32]) -> RunReport {
        let fatal = 0u64;
        let mut non_fatal = 0u64;
        self.tstamp.on_tstamp_frequency(header.timestamp_frequency.max(1));

        let mut reassembler = Reassembler::new(words, self.params.fmt_id_bits);

        loop {
            let fid_plan_index = &self.plans.fid_plan_index;
            let plans = &self.plans.plans;
            let Some(result) = reassembler.next_message(|fid| {
                fid_plan_index.get(fid as usize).copied().flatten().and_then(|i| plans.get(i))
            }) else {
                break;
            };
            let message = match result {
                Ok(m) => m,
                Err(e) => {
                    self.append_decode_error(&e);
                    non_fatal += 1;
                    continue;
                }
            };

            if message.fid == LONG_TIMESTAMP {
                let high = message.words.first().copied().unwrap_or(0);
                self.tstamp.on_long_timestamp(high);
                continue;
            }
            if message.fid == TSTAMP_FREQUENCY {
                let freq = message.words.first().copied().unwrap_or(1);
                self.tstamp.on_tstamp_frequency(freq);
                continue;
            }

            let Some(plan_index) = self.plans.fid_plan_index.get(message.fid as usize).copied().flatten() else {
                self.append_decode_error(&DecodeError::new(codes::UNKNOWN_FID, "no plan registered for this FID").with_args(message.fid as i64, 0));
                non_fatal += 1;
                continue;
            };

            let (timestamp_ticks, _outcome) = self.tstamp.observe(message.tstamp_l);
            let timestamp_seconds = self.tstamp.ticks_to_seconds(timestamp_ticks);

            let is_msgx = matches!(self.plans.plans[plan_index].kind, crate::plan::PlanKind::MsgX);
            let bytes = if is_msgx {
                match reassembler::finalize_msgx(&message.words) {
                    Ok(b) => b,
                    Err(e) => {
                        self.append_decode_error(&e);
                        non_fatal += 1;
                        continue;
                    }
                }
            } else {
                message.words.iter().flat_map(|w| w.to_le_bytes()).collect()
            };

            self.message_count += 1;
            let mut ring = MessageErrorRing::default();
            let ctx = DecodeContext {
                timestamp_ticks,
                timestamp_seconds,
                message_no: self.message_count,
                number_template: &self.params.number_template,
                time_template: &self.params.time_template,
                other_plans: &self.plans.plans,
            };
            let plan = &self.plans.plans[plan_index];
            let routed = decoder::decode_message(plan, plan_index, &bytes, &ctx, &mut self.plans.enum_table, &mut self.stats, &mut ring);

            for piece in &routed {
                let bytes = piece.raw.as_deref().unwrap_or_else(|| piece.text.as_bytes());
                self.route(piece.out_file, piece.also_main_log, bytes);
            }
            if self.params.newline_between_messages {
                self.main_log.push(b'\n');
            }
            if self.params.timestamps_csv {
                self.timestamps.push((self.message_count, timestamp_seconds));
            }

            self.stats.observe_message(plan_index, message.words.len() as u64 + 1);
            let (ring_errors, overflow) = ring.drain();
            for e in &ring_errors {
                self.append_decode_error(e);
            }
            non_fatal += ring_errors.len() as u64 + overflow as u64;

            let plan = &mut self.plans.plans[plan_index];
            plan.instances_seen += 1;
            plan.total_words_consumed += message.words.len() as u64 + 1;
            plan.time_last_message = timestamp_seconds;
        }

        RunReport {
            messages_decoded: self.message_count,
            fatal_decode_errors: fatal,
            decode_errors: non_fatal,
        }
    }

    /// Flush `Main.log`, `Errors.log`, any user-declared `OUT_FILE`s, and
    /// (when enabled) the statistics/debug/timestamp side files into the
    /// configured output folder (spec.md §6, §4.7).
    pub fn write_outputs(&self) -> Result<(), FatalError> {
        let io_err = |e: std::io::Error| FatalError::Io(17, e);
        let csv_err = |e: csv::Error| FatalError::Other(17, e.to_string());

        fs::create_dir_all(&self.params.output_folder).map_err(io_err)?;
        let out = |name: &str| self.params.output_folder.join(name);

        fs::write(out("Main.log"), &self.main_log).map_err(io_err)?;
        fs::write(out("Errors.log"), &self.errors_log).map_err(io_err)?;

        for (idx, bytes) in &self.out_files {
            if let Some(entry) = self.plans.enum_table.get(*idx) {
                if let Payload::OutFile { path } = &entry.payload {
                    let mut f = File::create(self.params.output_folder.join(path)).map_err(io_err)?;
                    f.write_all(bytes).map_err(io_err)?;
                }
            }
        }

        if self.params.stats != StatsMode::Off {
            let f = File::create(out("Statistics.csv")).map_err(io_err)?;
            self.stats.write_statistics_csv(f, &self.plans.plans).map_err(csv_err)?;
            fs::write(out("Stat_main.log"), self.stats.stat_main_log(&self.plans.plans)).map_err(io_err)?;
            let (found, missing) = StatisticsTracker::msgs_found_and_missing(&self.plans.plans);
            fs::write(out("Stat_msgs_found.txt"), found).map_err(io_err)?;
            fs::write(out("Stat_msgs_missing.txt"), missing).map_err(io_err)?;
        }

        if self.params.timestamps_csv {
            let mut wtr = csv::Writer::from_path(out("Timestamps.csv")).map_err(csv_err)?;
            wtr.write_record(["message_no", "seconds"]).map_err(csv_err)?;
            for (message_no, seconds) in &self.timestamps {
                wtr.write_record([message_no.to_string(), seconds.to_string()]).map_err(csv_err)?;
            }
            wtr.flush().map_err(io_err)?;
        }

        if self.params.debug {
            let names = self.plans.enum_table.filter_names().join("\n");
            let trailing_newline = if names.is_empty() { String::new() } else { format!("{names}\n") };
            fs::write(out("Filter_names.txt"), trailing_newline).map_err(io_err)?;
            let f = File::create(out("Format.csv")).map_err(io_err)?;
            StatisticsTracker::write_format_csv(f, &self.plans.plans).map_err(csv_err)?;
        }

        Ok(())
    }
}

/// Load a trace file from disk and run it through the reassembler and
/// decoder in one shot.
pub fn decode_file(binary_file: &Path, decoder: &mut Decoder) -> Result<RunReport, FatalError> {
    let bytes = fs::read(binary_file).map_err(|e| FatalError::Io(18, e))?;
    let (header, words) = buffer::load(&bytes, decoder.params.fmt_id_bits)?;
    Ok(decoder.decode_buffer(&header, &words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fid::FidAllocator;
    use crate::plan::{Plan, PlanKind};

    fn empty_plans() -> CompileOutput {
        CompileOutput {
            enum_table: crate::enum_table::EnumTable::new(),
            allocator: FidAllocator::new(12),
            plans: vec![Plan::new("PING", PlanKind::Msg0To8, 0)],
            fid_plan_index: Vec::new(),
            errors: Vec::new(),
            headers: Vec::new(),
        }
    }

    #[test]
    fn decode_error_is_routed_through_the_template() {
        let mut params = Params::default();
        params.error_template = "code=%E".to_string();
        params.binary_file = Some(std::path::PathBuf::from("trace.bin"));
        let mut decoder = Decoder::new(params, empty_plans());
        decoder.append_decode_error(&DecodeError::new(codes::BAD_BLOCK, "bad block").with_args(1, 2));
        let log = String::from_utf8(decoder.errors_log.clone()).unwrap();
        assert_eq!(log, "code=200\n");
    }

    #[test]
    fn write_outputs_emits_statistics_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = Params::default();
        params.output_folder = dir.path().to_path_buf();
        params.stats = StatsMode::All;
        let mut decoder = Decoder::new(params, empty_plans());
        decoder.stats.observe_value(0, 0, 12.5, 1);
        decoder.plans.plans[0].instances_seen = 1;
        decoder.write_outputs().unwrap();
        assert!(dir.path().join("Statistics.csv").exists());
        assert!(dir.path().join("Stat_main.log").exists());
        let found = fs::read_to_string(dir.path().join("Stat_msgs_found.txt")).unwrap();
        assert!(found.contains("PING"));
        assert!(!dir.path().join("Timestamps.csv").exists());
    }

    #[test]
    fn write_outputs_emits_debug_files_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = Params::default();
        params.output_folder = dir.path().to_path_buf();
        params.debug = true;
        let decoder = Decoder::new(params, empty_plans());
        decoder.write_outputs().unwrap();
        assert!(dir.path().join("Filter_names.txt").exists());
        assert!(dir.path().join("Format.csv").exists());
    }
}
