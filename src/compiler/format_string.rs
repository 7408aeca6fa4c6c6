//! Format-string parsing (spec.md §4.2.2): scans a printf-compatible
//! template with RTEdbg extensions, emitting one value slot per `%`-run
//! plus a trailing slot for any un-capped literal.

use crate::enum_table::{EntryKind, EnumTable, Payload};
use crate::error::ParseError;
use crate::plan::{PrintKind, ValueKind, ValueSlot};

#[derive(Debug, Default, Clone)]
pub struct ParseState {
    /// Running bit cursor; resets to zero on a new MSG or output-file
    /// change within the same message.
    pub bit_cursor: u32,
}

#[derive(Debug, Clone, Copy)]
enum FieldType {
    Float,
    Unsigned,
    Signed,
    StringBytes,
}

struct ValueSpec {
    bit_address: u32,
    data_bits: u8,
    field_type: FieldType,
}

fn parse_value_spec(
    raw: &str,
    cursor: &mut u32,
    file: &str,
    line: u32,
) -> Result<Option<ValueSpec>, ParseError> {
    // raw is the content between the matched `[` and `]`, already trimmed.
    if raw == "N" || raw == "t" || raw == "T" || raw.starts_with("t-") || raw.starts_with("M_") {
        // Non-bitfield value specifiers (message number / timestamp /
        // relative timestamp / memo read) carry no bit-field geometry of
        // their own.
        return Ok(None);
    }

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (Some(1i64), &raw[1..]),
        Some('-') => (Some(-1i64), &raw[1..]),
        _ => (None, raw),
    };
    let (addr_str, size_type) = rest
        .split_once(':')
        .map(|(a, b)| (Some(a), b))
        .unwrap_or((None, rest));
    let (size_str, type_char) = {
        let chars: Vec<char> = size_type.chars().collect();
        if let Some(&last) = chars.last() {
            if last.is_ascii_alphabetic() && !last.is_ascii_digit() {
                (size_type[..size_type.len() - last.len_utf8()].to_string(), Some(last))
            } else {
                (size_type.to_string(), None)
            }
        } else {
            (size_type.to_string(), None)
        }
    };
    let field_type = match type_char.unwrap_or('u') {
        'f' => FieldType::Float,
        'u' => FieldType::Unsigned,
        'i' => FieldType::Signed,
        's' => FieldType::StringBytes,
        other => {
            return Err(ParseError::new(
                107,
                file,
                line,
                format!("unknown bit-field type character `{other}`"),
            ))
        }
    };
    let size: u8 = size_str
        .parse()
        .map_err(|_| ParseError::new(107, file, line, format!("invalid field width `{size_str}`")))?;
    if !(1..=64).contains(&size) {
        return Err(ParseError::new(107, file, line, "field width must be in 1..=64"));
    }
    if matches!(field_type, FieldType::Float) && !matches!(size, 16 | 32 | 64) {
        return Err(ParseError::new(107, file, line, "float fields must be 16, 32 or 64 bits"));
    }

    let bit_address = match (addr_str, sign) {
        (Some(a), None) => {
            let v: u32 = a
                .parse()
                .map_err(|_| ParseError::new(107, file, line, format!("invalid bit address `{a}`")))?;
            *cursor = v;
            v
        }
        (Some(a), Some(s)) => {
            let v: i64 = a
                .parse()
                .map_err(|_| ParseError::new(107, file, line, format!("invalid bit address `{a}`")))?;
            *cursor = (*cursor as i64 + s * v) as u32;
            *cursor
        }
        (None, _) => *cursor,
    };

    if matches!(field_type, FieldType::Float | FieldType::StringBytes) && bit_address % 8 != 0 {
        return Err(ParseError::new(
            107,
            file,
            line,
            "float/string fields require a byte-aligned bit address",
        ));
    }

    Ok(Some(ValueSpec {
        bit_address,
        data_bits: size,
        field_type,
    }))
}

/// Parse one printf-style template into an ordered list of value slots,
/// threading the running bit cursor through successive `%`-runs.
///
/// `pending_timers` collects `(slot_index, target_name)` pairs for `[t-NAME]`
/// slots, since the named target message's plan may not exist yet (forward
/// references across files); the caller resolves them to a plan once the
/// whole file tree has been compiled.
pub fn parse_format_string(
    template: &str,
    state: &mut ParseState,
    enum_table: &mut EnumTable,
    file: &str,
    line: u32,
    pending_timers: &mut Vec<(usize, String)>,
) -> Result<Vec<ValueSlot>, ParseError> {
    let mut slots = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c != '%' {
            literal.push(c);
            i += 1;
            continue;
        }
        i += 1;
        if i >= chars.len() {
            break;
        }
        if chars[i] == '%' {
            literal.push('%');
            i += 1;
            continue;
        }

        let mut value_spec: Option<ValueSpec> = None;
        let mut scale_offset = 0.0f64;
        let mut scale_multiplier = 0.0f64;
        let mut inline_options: Vec<String> = Vec::new();
        let mut put_memo: Option<String> = None;
        let mut stats_name: Option<String> = None;
        let mut timer_name: Option<String> = None;
        let mut memo_name: Option<String> = None;
        let mut message_no = false;
        let mut timestamp = false;
        let mut rel_timestamp = false;

        loop {
            match chars.get(i) {
                Some('[') => {
                    let end = chars[i..]
                        .iter()
                        .position(|&c| c == ']')
                        .map(|p| p + i)
                        .ok_or_else(|| ParseError::new(106, file, line, "unterminated `[...]`"))?;
                    let raw: String = chars[i + 1..end].iter().collect();
                    if raw == "N" {
                        message_no = true;
                    } else if raw == "t" {
                        timestamp = true;
                    } else if raw == "T" {
                        rel_timestamp = true;
                    } else if let Some(name) = raw.strip_prefix("t-") {
                        rel_timestamp = true;
                        timer_name = Some(name.to_string());
                    } else if raw.starts_with("M_") {
                        memo_name = Some(raw.clone());
                    }
                    value_spec = parse_value_spec(&raw, &mut state.bit_cursor, file, line)?;
                    i = end + 1;
                }
                Some('(') => {
                    let end = chars[i..]
                        .iter()
                        .position(|&c| c == ')')
                        .map(|p| p + i)
                        .ok_or_else(|| ParseError::new(108, file, line, "unterminated `(...)`"))?;
                    let raw: String = chars[i + 1..end].iter().collect();
                    let (off, mult) = raw
                        .split_once('*')
                        .ok_or_else(|| ParseError::new(108, file, line, "scaling requires `*multiplier`"))?;
                    if !off.is_empty() {
                        scale_offset = off
                            .parse()
                            .map_err(|_| ParseError::new(108, file, line, "invalid scale offset"))?;
                    }
                    scale_multiplier = mult
                        .parse()
                        .map_err(|_| ParseError::new(108, file, line, "invalid scale multiplier"))?;
                    if scale_multiplier == 0.0 {
                        return Err(ParseError::new(108, file, line, "scale multiplier must be nonzero"));
                    }
                    i = end + 1;
                }
                Some('{') => {
                    let end = chars[i..]
                        .iter()
                        .position(|&c| c == '}')
                        .map(|p| p + i)
                        .ok_or_else(|| ParseError::new(109, file, line, "unterminated `{...}`"))?;
                    let raw: String = chars[i + 1..end].iter().collect();
                    inline_options = raw.split('|').map(str::to_string).collect();
                    if inline_options.len() < 2 {
                        return Err(ParseError::new(109, file, line, "inline text list needs >= 2 options"));
                    }
                    for opt in &inline_options {
                        if opt.is_empty() || opt.len() > 255 {
                            return Err(ParseError::new(109, file, line, "inline text option must be 1..255 bytes"));
                        }
                    }
                    i = end + 1;
                }
                Some('<') => {
                    let end = chars[i..]
                        .iter()
                        .position(|&c| c == '>')
                        .map(|p| p + i)
                        .ok_or_else(|| ParseError::new(110, file, line, "unterminated `<...>`"))?;
                    put_memo = Some(chars[i + 1..end].iter().collect());
                    i = end + 1;
                }
                Some('|') => {
                    let end = chars[i + 1..]
                        .iter()
                        .position(|&c| c == '|')
                        .map(|p| p + i + 1)
                        .ok_or_else(|| ParseError::new(111, file, line, "unterminated `|stat|`"))?;
                    stats_name = Some(chars[i + 1..end].iter().collect());
                    i = end + 1;
                }
                _ => break,
            }
        }

        // Skip printf flag/width/precision characters.
        while let Some(&c) = chars.get(i) {
            if "-+# 0.hl0123456789".contains(c) {
                i += 1;
            } else {
                break;
            }
        }

        let type_char = chars.get(i).copied().ok_or_else(|| {
            ParseError::new(112, file, line, "format run is missing a terminating type character")
        })?;
        i += 1;

        let rte_type = matches!(type_char, 't' | 'T' | 'N' | 'W' | 'H' | 'Y' | 'B' | 'D' | 'M');
        let hex_width = if type_char == 'H' {
            literal.chars().last().and_then(|c| c.to_digit(10))
        } else {
            None
        };

        let (print_kind, value_kind) = if message_no {
            (PrintKind::MsgNo, ValueKind::MessageNo)
        } else if timestamp {
            (PrintKind::Timestamp, ValueKind::Timestamp)
        } else if rel_timestamp && timer_name.is_some() {
            (PrintKind::DTimestamp, ValueKind::TimeDiff)
        } else if rel_timestamp {
            (PrintKind::DTimestamp, ValueKind::DTimestamp)
        } else {
            match type_char {
                'Y' => (PrintKind::SelectedText, ValueKind::Uint64),
                'B' => (PrintKind::Binary, ValueKind::Uint64),
                'H' => match hex_width {
                    Some(2) => (PrintKind::Hex2, ValueKind::Uint64),
                    Some(4) => (PrintKind::Hex4, ValueKind::Uint64),
                    _ => (PrintKind::Hex1, ValueKind::Uint64),
                },
                'W' => (PrintKind::BinToFile, ValueKind::Uint64),
                'D' => (PrintKind::Date, ValueKind::Auto),
                'M' => (PrintKind::MsgName, ValueKind::Auto),
                's' => (PrintKind::String, ValueKind::String),
                'f' | 'e' | 'E' | 'F' | 'g' | 'G' | 'a' | 'A' => (PrintKind::Double, ValueKind::Double),
                'd' | 'i' => (PrintKind::Int64, ValueKind::Int64),
                'o' | 'u' | 'x' | 'X' | 'c' => (PrintKind::Uint64, ValueKind::Uint64),
                other => {
                    return Err(ParseError::new(
                        112,
                        file,
                        line,
                        format!("unsupported format type character `{other}`"),
                    ))
                }
            }
        };

        // Trailing literal up to the next `%`.
        let mut trailing = String::new();
        while let Some(&c) = chars.get(i) {
            if c == '%' {
                break;
            }
            trailing.push(c);
            i += 1;
        }
        if rte_type && !trailing.is_empty() {
            return Err(ParseError::new(
                113,
                file,
                line,
                "RTE-specific types disallow trailing literal text",
            ));
        }

        let in_file = if !inline_options.is_empty() {
            let name = format!("__inline_{file}_{line}_{i}");
            Some(
                enum_table
                    .intern(
                        &name,
                        EntryKind::IndexedText,
                        Payload::IndexedText { options: inline_options },
                    )
                    .map_err(|_| ParseError::new(109, file, line, "duplicate inline text list name"))?,
            )
        } else {
            None
        };
        let put_memo_idx = put_memo.as_deref().and_then(|n| enum_table.find(n));
        let get_memo_idx = memo_name.as_deref().and_then(|n| enum_table.find(n));
        let _ = stats_name;

        let mut fmt_literal = literal.clone();
        literal.clear();
        fmt_literal.push_str(&trailing);

        let (bit_address, data_bits) = match &value_spec {
            Some(v) => (v.bit_address, v.data_bits),
            None => (0, 0),
        };
        // The bracketed field's own type (`u`/`i`/`f`/`s`) governs how the
        // raw bits are loaded; the `%` conversion character only governs
        // how the (possibly scaled) result is rendered. A `%[8:16u](...)f`
        // field is a scaled unsigned integer, not an IEEE-754 half float.
        let resolved_value_kind = if memo_name.is_some() {
            ValueKind::Memo
        } else {
            match value_spec.as_ref().map(|v| v.field_type) {
                Some(FieldType::Unsigned) => ValueKind::Uint64,
                Some(FieldType::Signed) => ValueKind::Int64,
                Some(FieldType::Float) => ValueKind::Double,
                Some(FieldType::StringBytes) => ValueKind::String,
                None => value_kind,
            }
        };

        if let Some(name) = timer_name {
            pending_timers.push((slots.len(), name));
        }

        slots.push(ValueSlot {
            print_kind,
            value_kind: resolved_value_kind,
            bit_address,
            data_bits,
            format_string: fmt_literal,
            out_file: 0,
            also_main_log: false,
            in_file,
            get_memo: get_memo_idx,
            put_memo: put_memo_idx,
            timer_plan_index: None,
            scale_offset,
            scale_multiplier,
            stats_enabled: stats_name.is_some(),
        });

        state.bit_cursor = state.bit_cursor.max(bit_address + data_bits as u32);
    }

    if !literal.is_empty() {
        slots.push(ValueSlot::plain_text(literal));
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_message_number_slot() {
        let mut state = ParseState::default();
        let mut enums = EnumTable::new();
        let slots = parse_format_string("hello %[N]N\n", &mut state, &mut enums, "t.fmt", 1, &mut Vec::new()).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].print_kind, PrintKind::MsgNo);
        assert!(slots[0].format_string.ends_with('\n'));
    }

    #[test]
    fn bitfield_with_scaling() {
        let mut state = ParseState::default();
        let mut enums = EnumTable::new();
        let slots = parse_format_string("T=%[8:16u](+0*0.1)f \u{b0}C\n", &mut state, &mut enums, "t.fmt", 1, &mut Vec::new()).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].bit_address, 8);
        assert_eq!(slots[0].data_bits, 16);
        assert_eq!(slots[0].scale_multiplier, 0.1);
        assert_eq!(slots[0].value_kind, ValueKind::Uint64);
    }

    #[test]
    fn inline_indexed_text_requires_two_options() {
        let mut state = ParseState::default();
        let mut enums = EnumTable::new();
        let err = parse_format_string("%{only}Y\n", &mut state, &mut enums, "t.fmt", 1, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code, 109);
    }

    #[test]
    fn memo_read_resolves_to_get_memo_slot() {
        let mut state = ParseState::default();
        let mut enums = EnumTable::new();
        enums
            .intern("M_COUNT", EntryKind::Memo, Payload::Memo { value: 0.0 })
            .unwrap();
        let slots = parse_format_string("count=%[M_COUNT]u\n", &mut state, &mut enums, "t.fmt", 1, &mut Vec::new()).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].value_kind, ValueKind::Memo);
        assert_eq!(slots[0].get_memo, enums.find("M_COUNT"));
    }

    #[test]
    fn named_timer_is_queued_for_post_pass_resolution() {
        let mut state = ParseState::default();
        let mut enums = EnumTable::new();
        let mut pending = Vec::new();
        let slots = parse_format_string("dt=%[t-PING]T\n", &mut state, &mut enums, "t.fmt", 1, &mut pending).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].value_kind, ValueKind::TimeDiff);
        assert!(slots[0].timer_plan_index.is_none());
        assert_eq!(pending, vec![(0, "PING".to_string())]);
    }
}
