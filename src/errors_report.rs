//! Per-message/per-file error ring buffers and the `-e=FMT` template
//! engine (spec.md §4.2.3, §6, §7, §10).

use std::collections::HashMap;

use crate::catalogue::Catalogue;
use crate::error::DecodeError;

pub const MAX_ERRORS_IN_SINGLE_MESSAGE: usize = 8;

/// Accumulates decode errors for the message currently being processed;
/// drained (and counted) once all of its slots have run.
#[derive(Debug, Default)]
pub struct MessageErrorRing {
    errors: Vec<DecodeError>,
    overflow: u32,
}

impl MessageErrorRing {
    pub fn push(&mut self, err: DecodeError) {
        if self.errors.len() < MAX_ERRORS_IN_SINGLE_MESSAGE {
            self.errors.push(err);
        } else {
            self.overflow += 1;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn drain(&mut self) -> (Vec<DecodeError>, u32) {
        (std::mem::take(&mut self.errors), std::mem::take(&mut self.overflow))
    }
}

/// Global per-code counters, one array per error band, for the shutdown
/// summary (spec.md §7).
#[derive(Debug, Default)]
pub struct ErrorCounters {
    counts: HashMap<u32, u64>,
}

impl ErrorCounters {
    pub fn bump(&mut self, code: u32) {
        *self.counts.entry(code).or_insert(0) += 1;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts.iter().map(|(&c, &n)| (c, n))
    }
}

/// Render the `-e=FMT` error-report template (spec.md §6): `%L %E %F %P %D
/// %A` substitute line/error-code/file/full-path/description/context.
#[must_use]
pub fn render_error_template(
    template: &str,
    line: u32,
    code: u32,
    file: &str,
    full_path: &str,
    catalogue: &Catalogue,
    context: &str,
) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('L') => out.push_str(&line.to_string()),
            Some('E') => out.push_str(&code.to_string()),
            Some('F') => out.push_str(file),
            Some('P') => out.push_str(full_path),
            Some('D') => out.push_str(&catalogue.describe(code)),
            Some('A') => out.push_str(context),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffers_cap_at_max_and_counts_overflow() {
        let mut ring = MessageErrorRing::default();
        for i in 0..MAX_ERRORS_IN_SINGLE_MESSAGE + 3 {
            ring.push(DecodeError::new(200, format!("err {i}")));
        }
        let (errors, overflow) = ring.drain();
        assert_eq!(errors.len(), MAX_ERRORS_IN_SINGLE_MESSAGE);
        assert_eq!(overflow, 3);
    }

    #[test]
    fn template_substitutes_known_fields() {
        let cat = Catalogue::default();
        let rendered = render_error_template("%F(%L): [%E] %D", 12, 200, "a.fmt", "/x/a.fmt", &cat, "ctx");
        assert_eq!(rendered, "a.fmt(12): [200] error 200");
    }
}
