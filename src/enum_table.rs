//! Enum Table (spec.md §3, §4.1): interns names of filters, memos, input
//! files, output files, and inline text lists, assigning indices used
//! everywhere else in the plan tables.

use std::collections::HashMap;

pub const FILTER_SLOT_COUNT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Filter,
    Memo,
    InFile,
    OutFile,
    IndexedText,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Filter { description: Option<String> },
    Memo { value: f64 },
    InFile { blob: Vec<u8> },
    OutFile { path: std::path::PathBuf },
    IndexedText { options: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    pub payload: Payload,
}

/// A dense array of interned entries. The first [`FILTER_SLOT_COUNT`]
/// indices are reserved for filter slots; everything else is allocated
/// from `FILTER_SLOT_COUNT` upward.
#[derive(Debug, Default)]
pub struct EnumTable {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
    next_filter_slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternError {
    DuplicateName,
    FilterSlotsExhausted,
}

impl EnumTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name` under `kind`, returning its dense index. Fails if the
    /// name is already used anywhere in the table, or (for filters) if all
    /// 32 filter slots are in use.
    pub fn intern(&mut self, name: &str, kind: EntryKind, payload: Payload) -> Result<usize, InternError> {
        if self.by_name.contains_key(name) {
            return Err(InternError::DuplicateName);
        }
        let index = match kind {
            EntryKind::Filter => {
                if self.next_filter_slot >= FILTER_SLOT_COUNT {
                    return Err(InternError::FilterSlotsExhausted);
                }
                let idx = self.next_filter_slot;
                self.next_filter_slot += 1;
                idx
            }
            _ => FILTER_SLOT_COUNT.max(self.entries.len()),
        };
        if index == self.entries.len() {
            self.entries.push(Entry {
                name: name.to_string(),
                kind,
                payload,
            });
        } else {
            // A filter slot index below the current length of the vector:
            // this only happens when filters interleave with non-filter
            // interning order, so keep the vector dense by padding.
            while self.entries.len() <= index {
                self.entries.push(Entry {
                    name: String::new(),
                    kind: EntryKind::Filter,
                    payload: Payload::Filter { description: None },
                });
            }
            self.entries[index] = Entry {
                name: name.to_string(),
                kind,
                payload,
            };
        }
        self.by_name.insert(name.to_string(), index);
        Ok(index)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.entries.get_mut(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of every interned filter slot, in allocation order, skipping
    /// the empty padding entries `intern` leaves between interleaved
    /// filter/non-filter allocations.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Filter && !e.name.is_empty())
            .map(|e| e.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_slots_are_below_32() {
        let mut t = EnumTable::new();
        let idx = t
            .intern("F_ADC", EntryKind::Filter, Payload::Filter { description: None })
            .unwrap();
        assert!(idx < FILTER_SLOT_COUNT);
    }

    #[test]
    fn non_filter_entries_land_at_or_above_32() {
        let mut t = EnumTable::new();
        let idx = t
            .intern("M_COUNT", EntryKind::Memo, Payload::Memo { value: 0.0 })
            .unwrap();
        assert!(idx >= FILTER_SLOT_COUNT);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut t = EnumTable::new();
        t.intern("F_A", EntryKind::Filter, Payload::Filter { description: None })
            .unwrap();
        assert_eq!(
            t.intern("F_A", EntryKind::Filter, Payload::Filter { description: None }),
            Err(InternError::DuplicateName)
        );
    }

    #[test]
    fn filter_exhaustion_is_reported() {
        let mut t = EnumTable::new();
        for i in 0..FILTER_SLOT_COUNT {
            t.intern(&format!("F_{i}"), EntryKind::Filter, Payload::Filter { description: None })
                .unwrap();
        }
        assert_eq!(
            t.intern("F_32", EntryKind::Filter, Payload::Filter { description: None }),
            Err(InternError::FilterSlotsExhausted)
        );
    }
}
