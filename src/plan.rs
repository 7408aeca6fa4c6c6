//! The Decoding Plan and Value-Slot Descriptor data model (spec.md §3).
//!
//! Per spec.md §9's "flat sequences" design note, a plan's value slots are
//! an indexed `Vec` rather than the original's linked list.

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PrintKind {
    PlainText,
    String,
    SelectedText,
    Uint64,
    Int64,
    Double,
    Binary,
    Timestamp,
    DTimestamp,
    MsgNo,
    Hex1,
    Hex2,
    Hex4,
    BinToFile,
    Date,
    MsgName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ValueKind {
    Auto,
    Uint64,
    Int64,
    Double,
    String,
    Timestamp,
    DTimestamp,
    Memo,
    TimeDiff,
    MessageNo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Msg0To8,
    MsgN,
    ExtMsg,
    MsgX,
}

/// One unit of value extraction and printing within a plan (spec.md §3).
#[derive(Debug, Clone)]
pub struct ValueSlot {
    pub print_kind: PrintKind,
    pub value_kind: ValueKind,
    pub bit_address: u32,
    pub data_bits: u8,
    pub format_string: String,
    pub out_file: usize,
    pub also_main_log: bool,
    pub in_file: Option<usize>,
    pub get_memo: Option<usize>,
    pub put_memo: Option<usize>,
    /// Target plan index for `[t-NAME]` TIME_DIFF slots, resolved by the
    /// compiler once every file in the tree has been parsed (spec.md
    /// §4.2.2); indexes `Plan`'s own vector, not a FID.
    pub timer_plan_index: Option<usize>,
    pub scale_offset: f64,
    pub scale_multiplier: f64,
    pub stats_enabled: bool,
}

impl ValueSlot {
    #[must_use]
    pub fn plain_text(format_string: impl Into<String>) -> Self {
        Self {
            print_kind: PrintKind::PlainText,
            value_kind: ValueKind::Auto,
            bit_address: 0,
            data_bits: 0,
            format_string: format_string.into(),
            out_file: 0,
            also_main_log: false,
            in_file: None,
            get_memo: None,
            put_memo: None,
            timer_plan_index: None,
            scale_offset: 0.0,
            scale_multiplier: 0.0,
            stats_enabled: false,
        }
    }
}

/// The fully-parsed description of how to decode a message bearing a
/// particular FID (spec.md §3).
#[derive(Debug, Clone)]
pub struct Plan {
    pub name: String,
    pub kind: PlanKind,
    pub expected_len_bytes: u32,
    pub ext_data_mask: u32,
    pub value_slots: Vec<ValueSlot>,

    pub instances_seen: u64,
    pub total_words_consumed: u64,
    pub time_last_message: f64,
}

impl Plan {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PlanKind, expected_len_bytes: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            expected_len_bytes,
            ext_data_mask: 0,
            value_slots: Vec::new(),
            instances_seen: 0,
            total_words_consumed: 0,
            time_last_message: 0.0,
        }
    }

    /// Expected sub-packet word count (including the FMT word) used by the
    /// Message Reassembler (spec.md §4.4): 1 for MSG0, 2..5 for MSG1..4,
    /// and a default of 5 (4 data + FMT) for MSGN/MSGX/EXT_MSG.
    #[must_use]
    pub fn expected_subpacket_words(&self) -> u32 {
        match self.kind {
            PlanKind::Msg0To8 => self.expected_len_bytes / 4 + 1,
            _ => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subpacket_words_for_fixed_length_msg() {
        let p = Plan::new("MSG2_TEMP", PlanKind::Msg0To8, 8);
        assert_eq!(p.expected_subpacket_words(), 3);
    }

    #[test]
    fn subpacket_words_for_msg0_is_one() {
        let p = Plan::new("MSG0_HELLO", PlanKind::Msg0To8, 0);
        assert_eq!(p.expected_subpacket_words(), 1);
    }

    #[test]
    fn subpacket_words_default_to_five_for_variable_length() {
        let p = Plan::new("MSGN_LOG", PlanKind::MsgN, 0);
        assert_eq!(p.expected_subpacket_words(), 5);
    }

    #[test]
    fn print_kind_roundtrips_through_u8() {
        let raw: u8 = PrintKind::SelectedText.into();
        assert_eq!(PrintKind::try_from(raw).unwrap(), PrintKind::SelectedText);
    }
}
