//! Statistics (spec.md §4.7): per-value min/max/mean tracking and
//! per-message-type frequency/buffer-usage leaderboards.

use std::io::Write;

use crate::plan::Plan;

pub const MIN_MAX_VALUES: usize = 10;
pub const TOP_MESSAGES: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct Extreme {
    pub value: f64,
    pub message_no: u64,
}

/// Per-value statistics record (spec.md §3's optional `stats` field).
#[derive(Debug, Clone, Default)]
pub struct ValueStats {
    smallest: Vec<Extreme>,
    largest: Vec<Extreme>,
    sum: f64,
    count: u64,
}

impl ValueStats {
    pub fn observe(&mut self, value: f64, message_no: u64) {
        self.sum += value;
        self.count += 1;
        insert_sorted(&mut self.smallest, Extreme { value, message_no }, true);
        insert_sorted(&mut self.largest, Extreme { value, message_no }, false);
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn smallest(&self) -> &[Extreme] {
        &self.smallest
    }

    #[must_use]
    pub fn largest(&self) -> &[Extreme] {
        &self.largest
    }
}

fn insert_sorted(list: &mut Vec<Extreme>, entry: Extreme, ascending: bool) {
    let pos = list
        .iter()
        .position(|e| if ascending { entry.value < e.value } else { entry.value > e.value })
        .unwrap_or(list.len());
    list.insert(pos, entry);
    list.truncate(MIN_MAX_VALUES);
}

/// A bounded top-N leaderboard keyed by plan index, ordered by an
/// accumulated `u64` score.
#[derive(Debug, Clone, Default)]
pub struct Leaderboard {
    entries: Vec<(usize, u64)>,
}

impl Leaderboard {
    pub fn record(&mut self, plan_index: usize, amount: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|(i, _)| *i == plan_index) {
            entry.1 += amount;
        } else {
            self.entries.push((plan_index, amount));
        }
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries.truncate(TOP_MESSAGES);
    }

    #[must_use]
    pub fn top(&self) -> &[(usize, u64)] {
        &self.entries
    }
}

#[derive(Debug, Default)]
pub struct StatisticsTracker {
    pub value_stats: Vec<(usize, ValueStats)>,
    pub frequency: Leaderboard,
    pub buffer_usage: Leaderboard,
}

impl StatisticsTracker {
    pub fn observe_value(&mut self, plan_index: usize, slot_index: usize, value: f64, message_no: u64) {
        let key = plan_index * 1_000_000 + slot_index;
        if let Some((_, stats)) = self.value_stats.iter_mut().find(|(k, _)| *k == key) {
            stats.observe(value, message_no);
        } else {
            let mut stats = ValueStats::default();
            stats.observe(value, message_no);
            self.value_stats.push((key, stats));
        }
    }

    pub fn observe_message(&mut self, plan_index: usize, words_consumed: u64) {
        self.frequency.record(plan_index, 1);
        self.buffer_usage.record(plan_index, words_consumed * 4);
    }

    /// Dump every slot with `count > 0` to `Statistics.csv` (spec.md §4.7).
    pub fn write_statistics_csv<W: Write>(&self, writer: W, plans: &[Plan]) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["plan", "slot", "count", "mean", "min", "min_msg", "max", "max_msg"])?;
        for (key, stats) in &self.value_stats {
            if stats.count() == 0 {
                continue;
            }
            let plan_index = key / 1_000_000;
            let slot_index = key % 1_000_000;
            let plan_name = plans.get(plan_index).map(|p| p.name.as_str()).unwrap_or("?");
            let min = stats.smallest().first();
            let max = stats.largest().first();
            wtr.write_record([
                plan_name.to_string(),
                slot_index.to_string(),
                stats.count().to_string(),
                stats.mean().to_string(),
                min.map(|e| e.value.to_string()).unwrap_or_default(),
                min.map(|e| e.message_no.to_string()).unwrap_or_default(),
                max.map(|e| e.value.to_string()).unwrap_or_default(),
                max.map(|e| e.message_no.to_string()).unwrap_or_default(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// `Format.csv` (spec.md §6, `-debug`): every slot's print kind and
    /// format string, regardless of whether statistics were collected.
    pub fn write_format_csv<W: Write>(writer: W, plans: &[Plan]) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["plan", "slot", "print_kind", "format_string"])?;
        for plan in plans {
            for (slot_index, slot) in plan.value_slots.iter().enumerate() {
                wtr.write_record([
                    plan.name.clone(),
                    slot_index.to_string(),
                    format!("{:?}", slot.print_kind),
                    slot.format_string.clone(),
                ])?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    /// `Stat_main.log`: the frequency and buffer-usage leaderboards in
    /// descending order.
    #[must_use]
    pub fn stat_main_log(&self, plans: &[Plan]) -> String {
        let name_of = |i: usize| plans.get(i).map(|p| p.name.as_str()).unwrap_or("?");
        let mut out = String::from("Message frequency leaderboard:\n");
        for (plan_index, count) in self.frequency.top() {
            out.push_str(&format!("  {}: {count}\n", name_of(*plan_index)));
        }
        out.push_str("Buffer usage leaderboard (bytes):\n");
        for (plan_index, bytes) in self.buffer_usage.top() {
            out.push_str(&format!("  {}: {bytes}\n", name_of(*plan_index)));
        }
        out
    }

    /// `Stat_msgs_found.txt` / `Stat_msgs_missing.txt`: plan names split by
    /// whether any instance was decoded.
    #[must_use]
    pub fn msgs_found_and_missing(plans: &[Plan]) -> (String, String) {
        let mut found = String::new();
        let mut missing = String::new();
        for plan in plans {
            let bucket = if plan.instances_seen > 0 { &mut found } else { &mut missing };
            bucket.push_str(&plan.name);
            bucket.push('\n');
        }
        (found, missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_min_max_and_mean() {
        let mut s = ValueStats::default();
        for (i, v) in [3.0, 1.0, 5.0, 2.0].into_iter().enumerate() {
            s.observe(v, i as u64);
        }
        assert_eq!(s.smallest()[0].value, 1.0);
        assert_eq!(s.largest()[0].value, 5.0);
        assert!((s.mean() - 2.75).abs() < 1e-9);
    }

    #[test]
    fn leaderboard_keeps_top_n_sorted_descending() {
        let mut lb = Leaderboard::default();
        lb.record(0, 5);
        lb.record(1, 9);
        lb.record(0, 1);
        assert_eq!(lb.top()[0], (1, 9));
        assert_eq!(lb.top()[1], (0, 6));
    }

    #[test]
    fn statistics_csv_skips_unobserved_slots() {
        let plans = vec![Plan::new("TEMP", crate::plan::PlanKind::Msg0To8, 4)];
        let mut tracker = StatisticsTracker::default();
        tracker.observe_value(0, 0, 10.0, 1);
        tracker.observe_value(0, 0, 20.0, 2);
        let mut out = Vec::new();
        tracker.write_statistics_csv(&mut out, &plans).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.contains("TEMP,0,2,15"));
    }

    #[test]
    fn msgs_found_and_missing_splits_by_instance_count() {
        let mut seen = Plan::new("SEEN", crate::plan::PlanKind::Msg0To8, 0);
        seen.instances_seen = 3;
        let unseen = Plan::new("UNSEEN", crate::plan::PlanKind::Msg0To8, 0);
        let (found, missing) = StatisticsTracker::msgs_found_and_missing(&[seen, unseen]);
        assert_eq!(found, "SEEN\n");
        assert_eq!(missing, "UNSEEN\n");
    }
}
