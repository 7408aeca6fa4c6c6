//! Format Compiler (spec.md §4.2): reads `.fmt`/`.h` files, dispatches
//! directive lines, and produces the Enum Table + FID-indexed plan table
//! that the decoder consults at runtime.

pub mod directives;
pub mod format_string;
pub mod header;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::enum_table::{EntryKind, EnumTable, Payload};
use crate::error::ParseError;
use crate::fid::FidAllocator;
use crate::plan::{Plan, PlanKind};

use directives::{parse_directive, Directive};
use format_string::ParseState;
use header::FileHeader;

/// Bounds how many diagnostics a single file accumulates before it is
/// abandoned (spec.md §4.2.3).
pub const MAX_ERRORS_REPORTED: usize = 50;

/// Guards against unbounded `INCLUDE` recursion (spec.md §4.2, §5).
pub const MAX_INCLUDE_DEPTH: usize = 64;

pub struct CompileOutput {
    pub enum_table: EnumTable,
    pub allocator: FidAllocator,
    pub plans: Vec<Plan>,
    pub fid_plan_index: Vec<Option<usize>>,
    pub errors: Vec<ParseError>,
    pub headers: Vec<FileHeader>,
}

struct PendingMessage {
    plan_index: usize,
    format_state: ParseState,
    current_out_file: usize,
    also_main_log: bool,
    current_in_file: Option<usize>,
}

/// Drives the directive-dispatch loop for a tree of format files, using an
/// explicit work stack for `INCLUDE` rather than native recursion
/// (spec.md §9's recursion design note).
pub struct Compiler {
    pub enum_table: EnumTable,
    pub allocator: FidAllocator,
    pub plans: Vec<Plan>,
    fid_plan_index: Vec<Option<usize>>,
    errors: Vec<ParseError>,
    pending: Option<PendingMessage>,
    included_paths: Vec<PathBuf>,
    headers: Vec<FileHeader>,
    /// `[t-NAME]` slots whose target message name couldn't be resolved to a
    /// plan until every file in the tree has been compiled: (plan_index,
    /// slot_index, target name, file, line).
    pending_timer_refs: Vec<(usize, usize, String, String, u32)>,
}

impl Compiler {
    #[must_use]
    pub fn new(fmt_id_bits: u8) -> Self {
        let allocator = FidAllocator::new(fmt_id_bits);
        let topmost = allocator.topmost() as usize;
        Self {
            enum_table: EnumTable::new(),
            allocator,
            plans: Vec::new(),
            fid_plan_index: vec![None; topmost],
            errors: Vec::new(),
            pending: None,
            included_paths: Vec::new(),
            headers: Vec::new(),
            pending_timer_refs: Vec::new(),
        }
    }

    fn bind_fid_range(&mut self, start: u32, count: u32, plan_index: usize) {
        for fid in start..start + count {
            if (fid as usize) < self.fid_plan_index.len() {
                self.fid_plan_index[fid as usize] = Some(plan_index);
            }
        }
    }

    fn push_error(&mut self, err: ParseError) -> bool {
        self.errors.push(err);
        self.errors.len() < MAX_ERRORS_REPORTED
    }

    /// Allocate the plan and its FID range, returning the starting FID (the
    /// number a `#define NAME <fid>` header line should carry) if allocation
    /// succeeded.
    fn begin_message(&mut self, kind: PlanKind, k: u8, name: String, expected_len_bytes: u32, ext_mask: u32) -> Option<u32> {
        let plan_index = self.plans.len();
        let mut plan = Plan::new(name, kind, expected_len_bytes);
        plan.ext_data_mask = ext_mask;
        self.plans.push(plan);
        let alloc_size: u32 = match kind {
            PlanKind::Msg0To8 => 1u32 << k,
            PlanKind::ExtMsg => 1u32 << k, // caller pre-shifts for ext bits
            PlanKind::MsgN | PlanKind::MsgX => 16,
        };
        let start_fid = self.allocator.allocate(alloc_size, plan_index).ok().inspect(|&start| {
            self.bind_fid_range(start, alloc_size, plan_index);
        });
        self.pending = Some(PendingMessage {
            plan_index,
            format_state: ParseState::default(),
            current_out_file: 0,
            also_main_log: false,
            current_in_file: None,
        });
        start_fid
    }

    /// Parse one directive/format-string line in the context of `file`,
    /// returning the `(NAME, number)` pair to emit as a generated-header
    /// `#define` when the directive introduced a named filter or message id
    /// (spec.md §4.2.1).
    fn apply_directive(&mut self, directive: Directive, file: &str, line_no: u32) -> Result<Option<(String, i64)>, ParseError> {
        match directive {
            Directive::Msg { k, name } => {
                let start = self.begin_message(PlanKind::Msg0To8, k, name.clone(), 4 * (1u32 << k).max(1) - 4, 0);
                // MSG0 has length 0; MSGk has length 4*k bytes per spec.md §4.2's
                // "Effect" column (`k` words following the FMT word).
                if let Some(p) = self.plans.last_mut() {
                    p.expected_len_bytes = 4 * k as u32;
                }
                return Ok(start.map(|fid| (name, fid as i64)));
            }
            Directive::ExtMsg { k, b, name } => {
                if b == 0 || b as i32 > 8 - k as i32 {
                    return Err(ParseError::new(114, file, line_no, "EXT_MSG b out of range [1, 8-k]"));
                }
                let mask = (1u32 << b) - 1;
                let start = self.begin_message(PlanKind::ExtMsg, k + b, name.clone(), 4 + 4 * k as u32, mask);
                return Ok(start.map(|fid| (name, fid as i64)));
            }
            Directive::MsgN { len_words, name } => {
                let len_bytes = len_words.unwrap_or(0) * 4;
                let start = self.begin_message(PlanKind::MsgN, 0, name.clone(), len_bytes, 0);
                return Ok(start.map(|fid| (name, fid as i64)));
            }
            Directive::MsgX { name } => {
                let start = self.begin_message(PlanKind::MsgX, 0, name.clone(), 0, 0);
                return Ok(start.map(|fid| (name, fid as i64)));
            }
            Directive::Filter { name, description } => {
                let idx = self
                    .enum_table
                    .intern(&name, EntryKind::Filter, Payload::Filter { description })
                    .map_err(|_| ParseError::new(115, file, line_no, "filter name collision or slots exhausted"))?;
                return Ok(Some((name, idx as i64)));
            }
            Directive::Memo { name, init } => {
                self.enum_table
                    .intern(&name, EntryKind::Memo, Payload::Memo { value: init.unwrap_or(0.0) })
                    .map_err(|_| ParseError::new(116, file, line_no, "memo name collision"))?;
            }
            Directive::InFile { name, path } => {
                let contents = fs::read(&path)
                    .map_err(|e| ParseError::new(117, file, line_no, format!("cannot read IN_FILE `{path}`: {e}")))?;
                let text = String::from_utf8_lossy(&contents);
                let options: Vec<&str> = text.split('\n').filter(|s| !s.is_empty()).collect();
                if options.len() < 2 {
                    return Err(ParseError::new(117, file, line_no, "IN_FILE needs >= 2 options"));
                }
                for opt in &options {
                    if opt.len() > 255 {
                        return Err(ParseError::new(117, file, line_no, "IN_FILE option exceeds 255 bytes"));
                    }
                }
                self.enum_table
                    .intern(
                        &name,
                        EntryKind::InFile,
                        Payload::IndexedText {
                            options: options.into_iter().map(str::to_string).collect(),
                        },
                    )
                    .map_err(|_| ParseError::new(117, file, line_no, "IN_FILE name collision"))?;
            }
            Directive::OutFile {
                name,
                path,
                mode: _,
                initial_text: _,
            } => {
                self.enum_table
                    .intern(&name, EntryKind::OutFile, Payload::OutFile { path: PathBuf::from(path) })
                    .map_err(|_| ParseError::new(118, file, line_no, "OUT_FILE name collision"))?;
            }
            Directive::Include { .. } => unreachable!("handled by the caller's work stack"),
            Directive::FmtAlign(v) => self
                .allocator
                .fmt_align(v)
                .map_err(|_| ParseError::new(119, file, line_no, "FMT_ALIGN requires a power of two"))?,
            Directive::FmtStart(v) => self
                .allocator
                .fmt_start(v)
                .map_err(|_| ParseError::new(120, file, line_no, "FMT_START rejected (not power-of-two or backward)"))?,
            Directive::SelectInFile(name) => {
                let idx = self
                    .enum_table
                    .find(&name)
                    .ok_or_else(|| ParseError::new(121, file, line_no, format!("unknown input file `{name}`")))?;
                if let Some(p) = &mut self.pending {
                    p.current_in_file = Some(idx);
                }
            }
            Directive::SelectOutFile { name, also_main_log } => {
                let idx = self
                    .enum_table
                    .find(&name)
                    .ok_or_else(|| ParseError::new(122, file, line_no, format!("unknown output file `{name}`")))?;
                if let Some(p) = &mut self.pending {
                    p.current_out_file = idx;
                    p.also_main_log = also_main_log;
                    p.format_state.bit_cursor = 0;
                }
            }
            Directive::FormatString(template) => {
                let pending = self
                    .pending
                    .as_mut()
                    .ok_or_else(|| ParseError::new(123, file, line_no, "format string with no preceding MSG directive"))?;
                let base_slot_index = self.plans[pending.plan_index].value_slots.len();
                let mut local_timers = Vec::new();
                let mut slots = format_string::parse_format_string(
                    &template,
                    &mut pending.format_state,
                    &mut self.enum_table,
                    file,
                    line_no,
                    &mut local_timers,
                )?;
                for slot in &mut slots {
                    slot.out_file = pending.current_out_file;
                    slot.also_main_log = pending.also_main_log;
                    slot.in_file = slot.in_file.or(pending.current_in_file);
                }
                let plan_index = pending.plan_index;
                self.plans[plan_index].value_slots.extend(slots);
                for (local_index, name) in local_timers {
                    self.pending_timer_refs
                        .push((plan_index, base_slot_index + local_index, name, file.to_string(), line_no));
                }
            }
        }
        Ok(None)
    }

    /// Compile a tree of format files rooted at `entry_points`, resolving
    /// `INCLUDE` directives with an explicit work stack.
    pub fn compile(mut self, entry_points: &[PathBuf]) -> CompileOutput {
        for entry in entry_points {
            self.compile_file(entry, 0);
        }

        let name_to_plan: HashMap<String, usize> = self.plans.iter().enumerate().map(|(i, p)| (p.name.clone(), i)).collect();
        for (plan_index, slot_index, name, file, line_no) in std::mem::take(&mut self.pending_timer_refs) {
            match name_to_plan.get(name.as_str()) {
                Some(&target) => {
                    if let Some(slot) = self.plans[plan_index].value_slots.get_mut(slot_index) {
                        slot.timer_plan_index = Some(target);
                    }
                }
                None => {
                    self.push_error(ParseError::new(127, &file, line_no, format!("unknown message name `{name}` in `[t-NAME]`")));
                }
            }
        }

        CompileOutput {
            enum_table: self.enum_table,
            allocator: self.allocator,
            plans: self.plans,
            fid_plan_index: self.fid_plan_index,
            errors: self.errors,
            headers: self.headers,
        }
    }

    fn compile_file(&mut self, path: &Path, depth: usize) {
        let mut header = FileHeader::new(path.to_path_buf());
        if depth >= MAX_INCLUDE_DEPTH {
            self.push_error(ParseError::new(
                124,
                path.to_string_lossy(),
                0,
                "INCLUDE nesting exceeded the configured depth floor",
            ));
            self.headers.push(header);
            return;
        }
        self.included_paths.push(path.to_path_buf());
        let file = path.to_string_lossy().to_string();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                self.push_error(ParseError::new(101, &file, 0, format!("cannot read file: {e}")));
                self.headers.push(header);
                return;
            }
        };
        self.pending = None;

        'lines: for (idx, raw_line) in contents.lines().enumerate() {
            header.lines.push(raw_line.to_string());
            let line_no = (idx + 1) as u32;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with("/*") && trimmed.ends_with("*/") {
                continue;
            }
            let body = if let Some(rest) = trimmed.strip_prefix("//") {
                rest.trim()
            } else if trimmed.starts_with('#') {
                continue; // tolerated only in generated headers
            } else {
                if !self.push_error(ParseError::new(102, &file, line_no, "line is not a comment-wrapped directive")) {
                    break 'lines;
                }
                continue;
            };
            if body.is_empty() {
                continue;
            }

            match parse_directive(body) {
                Some(Directive::Include { path: inc_path }) => {
                    let resolved = path
                        .parent()
                        .map(|p| p.join(&inc_path))
                        .unwrap_or_else(|| PathBuf::from(&inc_path));
                    self.compile_file(&resolved, depth + 1);
                }
                Some(directive) => match self.apply_directive(directive, &file, line_no) {
                    Ok(Some((name, number))) => header.defines.push((name, number)),
                    Ok(None) => {}
                    Err(e) => {
                        if !self.push_error(e) {
                            break 'lines;
                        }
                    }
                },
                None => {
                    if !self.push_error(ParseError::new(103, &file, line_no, format!("unrecognized directive: {body}"))) {
                        break 'lines;
                    }
                }
            }
        }

        self.headers.push(header);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fmt(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn minimal_message_compiles_one_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fmt(&dir, "a.fmt", "// MSG0_HELLO\n// \"hello %[N]N\\n\"\n");
        let out = Compiler::new(9).compile(&[path]);
        assert!(out.errors.is_empty(), "unexpected errors: {:?}", out.errors);
        assert_eq!(out.plans.len(), 1);
        assert_eq!(out.plans[0].name, "HELLO");
        assert_eq!(out.plans[0].value_slots.len(), 1);
    }

    #[test]
    fn include_pulls_in_filters_from_another_file() {
        let dir = tempfile::tempdir().unwrap();
        write_fmt(&dir, "filters.fmt", "// FILTER(F_ADC,\"adc\")\n");
        let root = write_fmt(&dir, "root.fmt", "// INCLUDE(\"filters.fmt\")\n// MSG0_PING\n// \"ping\\n\"\n");
        let out = Compiler::new(9).compile(&[root]);
        assert!(out.errors.is_empty(), "unexpected errors: {:?}", out.errors);
        assert!(out.enum_table.find("F_ADC").is_some());
    }

    #[test]
    fn unrecognized_directive_is_reported_and_parsing_continues() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fmt(&dir, "a.fmt", "// NOT_A_DIRECTIVE\n// MSG0_PING\n// \"ping\\n\"\n");
        let out = Compiler::new(9).compile(&[path]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.plans.len(), 1);
    }

    #[test]
    fn named_timer_resolves_to_plan_index_once_both_messages_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fmt(
            &dir,
            "a.fmt",
            "// MSG0_PING\n// \"ping\\n\"\n// MSG0_PONG\n// \"dt=%[t-PING]T\\n\"\n",
        );
        let out = Compiler::new(9).compile(&[path]);
        assert!(out.errors.is_empty(), "unexpected errors: {:?}", out.errors);
        let pong = out.plans.iter().find(|p| p.name == "PONG").unwrap();
        assert_eq!(pong.value_slots[0].timer_plan_index, Some(0));
    }

    #[test]
    fn unresolved_named_timer_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fmt(&dir, "a.fmt", "// MSG0_PONG\n// \"dt=%[t-NOWHERE]T\\n\"\n");
        let out = Compiler::new(9).compile(&[path]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].code, 127);
    }

    #[test]
    fn check_mode_header_collects_defines_for_named_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fmt(&dir, "a.fmt", "// MSG0_PING\n// \"ping\\n\"\n");
        let out = Compiler::new(9).compile(&[path]);
        assert_eq!(out.headers.len(), 1);
        assert_eq!(out.headers[0].defines, vec![("PING".to_string(), 0)]);
        assert_eq!(out.headers[0].lines.len(), 2);
    }
}
