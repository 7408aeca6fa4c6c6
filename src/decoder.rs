//! Value Decoder / Printer (spec.md §4.6): executes a plan's value-slot
//! sequence against one assembled message.

use crate::bits::BitCursor;
use crate::enum_table::{EnumTable, Payload};
use crate::error::{codes, DecodeError};
use crate::errors_report::MessageErrorRing;
use crate::plan::{Plan, PrintKind, ValueKind, ValueSlot};
use crate::printf::{self, Arg};
use crate::stats::StatisticsTracker;

/// One piece of routed output: which enum-table file index to write to
/// (0 = main log) and either the rendered text, or (for `BIN_TO_FILE`
/// slots) the raw bytes to write instead of text.
pub struct Routed {
    pub out_file: usize,
    pub also_main_log: bool,
    pub text: String,
    pub raw: Option<Vec<u8>>,
}

/// Everything the decoder needs about "now" that isn't in the plan or the
/// message bytes: the reconstructed timestamp and the running counters.
pub struct DecodeContext<'a> {
    pub timestamp_ticks: u64,
    pub timestamp_seconds: f64,
    pub message_no: u64,
    pub number_template: &'a str,
    pub time_template: &'a str,
    pub other_plans: &'a [Plan],
}

fn half_to_f64(bits: u16) -> f64 {
    let sign = (bits >> 15) & 1;
    let exponent = (bits >> 10) & 0x1F;
    let mantissa = bits & 0x3FF;
    let value = if exponent == 0 {
        (mantissa as f64) * 2f64.powi(-24)
    } else if exponent == 0x1F {
        if mantissa == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        (1.0 + mantissa as f64 / 1024.0) * 2f64.powi(exponent as i32 - 15)
    };
    if sign == 1 {
        -value
    } else {
        value
    }
}

fn load_numeric(
    slot: &ValueSlot,
    cursor: &BitCursor,
    ctx: &DecodeContext,
    enum_table: &EnumTable,
    plan: &Plan,
) -> Result<(u64, i64, f64), DecodeError> {
    match slot.value_kind {
        ValueKind::Auto => {
            if slot.data_bits != 32 || slot.bit_address % 32 != 0 {
                return Err(DecodeError::new(codes::BIT_RANGE_OVERFLOW, "AUTO value requires a 32-bit-aligned 32-bit field"));
            }
            let raw = cursor.extract(slot.bit_address, 32).map_err(|e| DecodeError::new(codes::BIT_RANGE_OVERFLOW, e.to_string()))?;
            Ok((raw, raw as i32 as i64, f32::from_bits(raw as u32) as f64))
        }
        ValueKind::Uint64 => {
            let raw = cursor.extract(slot.bit_address, slot.data_bits).map_err(|e| DecodeError::new(codes::BIT_RANGE_OVERFLOW, e.to_string()))?;
            Ok((raw, raw as i64, raw as f64))
        }
        ValueKind::Int64 => {
            let signed = cursor.extract_signed(slot.bit_address, slot.data_bits).map_err(|e| DecodeError::new(codes::BIT_RANGE_OVERFLOW, e.to_string()))?;
            Ok((signed as u64, signed, signed as f64))
        }
        ValueKind::Double => {
            let raw = cursor.extract(slot.bit_address, slot.data_bits).map_err(|e| DecodeError::new(codes::BIT_RANGE_OVERFLOW, e.to_string()))?;
            let value = match slot.data_bits {
                16 => half_to_f64(raw as u16),
                32 => f32::from_bits(raw as u32) as f64,
                64 => f64::from_bits(raw),
                _ => return Err(DecodeError::new(codes::BIT_RANGE_OVERFLOW, "DOUBLE field must be 16, 32 or 64 bits")),
            };
            Ok((value as u64, value as i64, value))
        }
        ValueKind::Timestamp => Ok((ctx.timestamp_ticks, ctx.timestamp_ticks as i64, ctx.timestamp_seconds)),
        ValueKind::DTimestamp => {
            let delta = if plan.instances_seen > 0 {
                ctx.timestamp_seconds - plan.time_last_message
            } else {
                0.0
            };
            Ok((delta as u64, delta as i64, delta))
        }
        ValueKind::TimeDiff => {
            let timer_plan = slot.timer_plan_index.and_then(|idx| ctx.other_plans.get(idx));
            let delta = match timer_plan {
                Some(p) if p.instances_seen > 0 => ctx.timestamp_seconds - p.time_last_message,
                _ => 0.0,
            };
            Ok((delta as u64, delta as i64, delta))
        }
        ValueKind::Memo => {
            let idx = slot
                .get_memo
                .ok_or_else(|| DecodeError::new(codes::BIT_RANGE_OVERFLOW, "MEMO value kind with no get_memo slot"))?;
            let value = match enum_table.get(idx).map(|e| &e.payload) {
                Some(Payload::Memo { value }) => *value,
                _ => 0.0,
            };
            Ok((value as u64, value as i64, value))
        }
        ValueKind::MessageNo => Ok((ctx.message_no, ctx.message_no as i64, ctx.message_no as f64)),
        ValueKind::String => Ok((0, 0, 0.0)),
    }
}

fn selected_text<'a>(enum_table: &'a EnumTable, in_file: usize, index: u64) -> &'a str {
    match enum_table.get(in_file).map(|e| &e.payload) {
        Some(Payload::IndexedText { options }) if !options.is_empty() => {
            let clamped = (index as usize).min(options.len() - 1);
            &options[clamped]
        }
        _ => "",
    }
}

fn hex_dump(bytes: &[u8], group: usize) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:04x}: ", row * 16));
        for piece in chunk.chunks(group) {
            for b in piece {
                out.push_str(&format!("{b:02x}"));
            }
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

fn binary_string(value: u64, bits: u8) -> String {
    let mut out = String::new();
    for i in (0..bits).rev() {
        out.push(if (value >> i) & 1 == 1 { '1' } else { '0' });
        if i % 8 == 0 && i != 0 {
            out.push('\'');
        }
    }
    out
}

/// Decode one message against `plan`, returning the routed output pieces
/// and updating memos/statistics; per-slot failures are appended to
/// `errors` rather than aborting the message.
pub fn decode_message(
    plan: &Plan,
    plan_index: usize,
    message_bytes: &[u8],
    ctx: &DecodeContext,
    enum_table: &mut EnumTable,
    stats: &mut StatisticsTracker,
    errors: &mut MessageErrorRing,
) -> Vec<Routed> {
    let cursor = BitCursor::new(message_bytes);
    let mut routed = Vec::with_capacity(plan.value_slots.len());

    for (slot_index, slot) in plan.value_slots.iter().enumerate() {
        if matches!(slot.print_kind, PrintKind::BinToFile) {
            let start = (slot.bit_address / 8) as usize;
            let len = if slot.data_bits == 0 { message_bytes.len() } else { (slot.data_bits / 8) as usize };
            let end = start.saturating_add(len).min(message_bytes.len());
            let raw = message_bytes.get(start.min(end)..end).unwrap_or(&[]).to_vec();
            routed.push(Routed {
                out_file: slot.out_file,
                also_main_log: slot.also_main_log,
                text: String::new(),
                raw: Some(raw),
            });
            continue;
        }

        let numeric = if matches!(slot.value_kind, ValueKind::String) {
            Ok((0, 0, 0.0))
        } else {
            load_numeric(slot, &cursor, ctx, enum_table, plan)
        };
        let (mut raw_u, mut raw_i, mut raw_f) = match numeric {
            Ok(v) => v,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        if slot.scale_multiplier != 0.0 {
            raw_f = (raw_f + slot.scale_offset) * slot.scale_multiplier;
            raw_u = raw_f as u64;
            raw_i = raw_f as i64;
        }

        if let Some(put_idx) = slot.put_memo {
            if let Some(entry) = enum_table.get_mut(put_idx) {
                if let Payload::Memo { value } = &mut entry.payload {
                    *value = raw_f;
                }
            }
        }

        let text = match slot.print_kind {
            PrintKind::PlainText => slot.format_string.clone(),
            PrintKind::Uint64 => printf::format(&slot.format_string, &[Arg::U64(raw_u)]),
            PrintKind::Int64 => printf::format(&slot.format_string, &[Arg::I64(raw_i)]),
            PrintKind::Double => printf::format(&slot.format_string, &[Arg::F64(raw_f)]),
            PrintKind::String => {
                let range = if slot.data_bits == 0 {
                    message_bytes
                } else {
                    let start = (slot.bit_address / 8) as usize;
                    let len = (slot.data_bits / 8) as usize;
                    message_bytes.get(start..start + len).unwrap_or(&[])
                };
                let s = String::from_utf8_lossy(range);
                printf::format(&slot.format_string, &[Arg::Str(&s)])
            }
            PrintKind::SelectedText => {
                let chosen = slot.in_file.map(|f| selected_text(enum_table, f, raw_u)).unwrap_or("");
                format!("{}{}", chosen, slot.format_string)
            }
            PrintKind::Binary => format!("{}{}", binary_string(raw_u, slot.data_bits.max(1)), slot.format_string),
            PrintKind::Timestamp | PrintKind::DTimestamp => {
                format!("{}{}", printf::format(ctx.time_template, &[Arg::F64(raw_f)]), slot.format_string)
            }
            PrintKind::MsgNo => format!("{}{}", printf::format(ctx.number_template, &[Arg::U64(ctx.message_no)]), slot.format_string),
            PrintKind::Hex1 => format!("{}{}", hex_dump(message_bytes, 1), slot.format_string),
            PrintKind::Hex2 => format!("{}{}", hex_dump(message_bytes, 2), slot.format_string),
            PrintKind::Hex4 => format!("{}{}", hex_dump(message_bytes, 4), slot.format_string),
            PrintKind::BinToFile => unreachable!("handled above before numeric extraction"),
            PrintKind::Date => slot.format_string.clone(),
            PrintKind::MsgName => format!("{}{}", plan.name, slot.format_string),
        };

        if slot.stats_enabled
            && matches!(
                slot.print_kind,
                PrintKind::Uint64 | PrintKind::Int64 | PrintKind::Double
            )
        {
            stats.observe_value(plan_index, slot_index, raw_f, ctx.message_no);
        }

        routed.push(Routed {
            out_file: slot.out_file,
            also_main_log: slot.also_main_log,
            text,
            raw: None,
        });
    }

    routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanKind, ValueSlot};

    fn ctx() -> DecodeContext<'static> {
        DecodeContext {
            timestamp_ticks: 42,
            timestamp_seconds: 42.0,
            message_no: 1,
            number_template: "%05u",
            time_template: "%6.6f",
            other_plans: &[],
        }
    }

    #[test]
    fn plain_text_and_message_number_slot() {
        let mut plan = Plan::new("HELLO", PlanKind::Msg0To8, 0);
        plan.value_slots.push(ValueSlot {
            print_kind: PrintKind::MsgNo,
            value_kind: ValueKind::MessageNo,
            bit_address: 0,
            data_bits: 0,
            format_string: String::new(),
            out_file: 0,
            also_main_log: false,
            in_file: None,
            get_memo: None,
            put_memo: None,
            timer_plan_index: None,
            scale_offset: 0.0,
            scale_multiplier: 0.0,
            stats_enabled: false,
        });
        let mut enums = EnumTable::new();
        let mut stats = StatisticsTracker::default();
        let mut errors = MessageErrorRing::default();
        let routed = decode_message(&plan, 0, &[], &ctx(), &mut enums, &mut stats, &mut errors);
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].text, "00001");
    }

    #[test]
    fn bitfield_and_scaling_slot() {
        let mut plan = Plan::new("TEMP", PlanKind::Msg0To8, 8);
        plan.value_slots.push(ValueSlot {
            print_kind: PrintKind::Double,
            value_kind: ValueKind::Uint64,
            bit_address: 8,
            data_bits: 16,
            format_string: "%.1f".to_string(),
            out_file: 0,
            also_main_log: false,
            in_file: None,
            get_memo: None,
            put_memo: None,
            timer_plan_index: None,
            scale_offset: 0.0,
            scale_multiplier: 0.1,
            stats_enabled: false,
        });
        let message = [0x00u8, 0x64, 0x00, 0x00];
        let mut enums = EnumTable::new();
        let mut stats = StatisticsTracker::default();
        let mut errors = MessageErrorRing::default();
        let routed = decode_message(&plan, 0, &message, &ctx(), &mut enums, &mut stats, &mut errors);
        assert_eq!(routed[0].text, "10.0");
    }

    #[test]
    fn time_diff_uses_resolved_plan_index_not_fid() {
        let mut timer_plan = Plan::new("PING", PlanKind::Msg0To8, 0);
        timer_plan.instances_seen = 1;
        timer_plan.time_last_message = 40.0;
        let other_plans = [timer_plan];

        let mut plan = Plan::new("DT", PlanKind::Msg0To8, 0);
        plan.value_slots.push(ValueSlot {
            print_kind: PrintKind::DTimestamp,
            value_kind: ValueKind::TimeDiff,
            bit_address: 0,
            data_bits: 0,
            format_string: String::new(),
            out_file: 0,
            also_main_log: false,
            in_file: None,
            get_memo: None,
            put_memo: None,
            timer_plan_index: Some(0),
            scale_offset: 0.0,
            scale_multiplier: 0.0,
            stats_enabled: false,
        });
        let mut enums = EnumTable::new();
        let mut stats = StatisticsTracker::default();
        let mut errors = MessageErrorRing::default();
        let mut context = ctx();
        context.other_plans = &other_plans;
        context.timestamp_seconds = 42.0;
        let routed = decode_message(&plan, 0, &[], &context, &mut enums, &mut stats, &mut errors);
        assert!(routed[0].text.trim().starts_with('2'));
    }

    #[test]
    fn bin_to_file_routes_raw_message_bytes() {
        let mut plan = Plan::new("DUMP", PlanKind::Msg0To8, 4);
        plan.value_slots.push(ValueSlot {
            print_kind: PrintKind::BinToFile,
            value_kind: ValueKind::Uint64,
            bit_address: 0,
            data_bits: 0,
            format_string: String::new(),
            out_file: 1,
            also_main_log: false,
            in_file: None,
            get_memo: None,
            put_memo: None,
            timer_plan_index: None,
            scale_offset: 0.0,
            scale_multiplier: 0.0,
            stats_enabled: false,
        });
        let message = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut enums = EnumTable::new();
        let mut stats = StatisticsTracker::default();
        let mut errors = MessageErrorRing::default();
        let routed = decode_message(&plan, 0, &message, &ctx(), &mut enums, &mut stats, &mut errors);
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].raw.as_deref(), Some(&message[..]));
        assert!(routed[0].text.is_empty());
    }
}
