//! Timestamp Reconstructor (spec.md §4.5): recovers a 64-bit timestamp
//! from each message's low timestamp bits, handling wrap-around,
//! out-of-order delivery and data-loss gaps.

use crate::params::TimestampWindow;

const PERIOD: i64 = 1i64 << 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    OutOfOrder,
    WrappedAround,
    LateFromPreviousPeriod,
    GapSuspected,
}

#[derive(Debug)]
pub struct TimestampReconstructor {
    tstamp_h: u32,
    tstamp_l_old: u32,
    frequency: f64,
    window: TimestampWindow,
    messages_since_wrap: u32,
    resyncing: bool,
}

impl TimestampReconstructor {
    #[must_use]
    pub fn new(window: TimestampWindow) -> Self {
        Self {
            tstamp_h: 0,
            tstamp_l_old: 0,
            frequency: 1.0,
            window,
            messages_since_wrap: 0,
            resyncing: false,
        }
    }

    fn max_pos(&self) -> i64 {
        (self.window.pos_ms.abs() * PERIOD as f64) as i64
    }

    fn max_neg(&self) -> i64 {
        -((self.window.neg_ms.abs() * PERIOD as f64) as i64)
    }

    /// Process a `LONG_TIMESTAMP` system message's payload word (the high
    /// 32 bits directly), or the `0xFFFF_FFFF` "restart timing" marker.
    pub fn on_long_timestamp(&mut self, high: u32) {
        if high == 0xFFFF_FFFF {
            self.tstamp_h = 0;
            self.tstamp_l_old = 0;
            self.messages_since_wrap = 0;
        } else {
            self.tstamp_h = high;
        }
        self.resyncing = false;
    }

    /// Process a `TSTAMP_FREQUENCY` system message: ticks-to-seconds ratio.
    pub fn on_tstamp_frequency(&mut self, frequency_hz: u32) {
        self.frequency = if frequency_hz == 0 { 1.0 } else { f64::from(frequency_hz) };
    }

    #[must_use]
    pub fn is_resyncing(&self) -> bool {
        self.resyncing
    }

    #[must_use]
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 / self.frequency
    }

    /// Update reconstruction state for one non-system message's low-bits
    /// timestamp and return the reconstructed 64-bit tick count.
    pub fn observe(&mut self, tstamp_l: u32) -> (u64, Outcome) {
        let diff = (tstamp_l as i64).wrapping_sub(self.tstamp_l_old as i64);
        let diff = ((diff + PERIOD / 2).rem_euclid(PERIOD)) - PERIOD / 2;
        let old_in_top_half = self.tstamp_l_old >= 0x8000_0000;

        let outcome = if (0..=self.max_pos()).contains(&diff) {
            self.tstamp_l_old = tstamp_l;
            self.messages_since_wrap = self.messages_since_wrap.saturating_add(1);
            Outcome::Accepted
        } else if (self.max_neg()..0).contains(&diff) {
            Outcome::OutOfOrder
        } else if old_in_top_half && diff <= -(PERIOD - self.max_pos()) {
            if self.messages_since_wrap >= 4 {
                self.tstamp_h = self.tstamp_h.wrapping_add(1);
                self.tstamp_l_old = tstamp_l;
                self.messages_since_wrap = 0;
                Outcome::WrappedAround
            } else {
                self.messages_since_wrap = self.messages_since_wrap.saturating_add(1);
                self.tstamp_l_old = tstamp_l;
                Outcome::Accepted
            }
        } else if !old_in_top_half && diff >= PERIOD + self.max_neg() {
            Outcome::LateFromPreviousPeriod
        } else {
            self.resyncing = true;
            Outcome::GapSuspected
        };

        let high = match outcome {
            Outcome::LateFromPreviousPeriod => self.tstamp_h.wrapping_sub(1),
            _ => self.tstamp_h,
        };
        let value = (u64::from(high) << 32) | u64::from(tstamp_l);
        (value, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_window() -> TimestampWindow {
        TimestampWindow::default()
    }

    #[test]
    fn monotonic_increments_are_accepted() {
        let mut r = TimestampReconstructor::new(default_window());
        let (v1, o1) = r.observe(1000);
        assert_eq!(o1, Outcome::Accepted);
        let (v2, o2) = r.observe(2000);
        assert_eq!(o2, Outcome::Accepted);
        assert!(v2 > v1);
    }

    #[test]
    fn wrap_around_increments_high_word_once() {
        let mut r = TimestampReconstructor::new(default_window());
        for _ in 0..4 {
            r.observe(0xFFFF_0000);
        }
        let (_, outcome) = r.observe(0x0001_0000);
        assert_eq!(outcome, Outcome::WrappedAround);
    }

    #[test]
    fn long_timestamp_resets_state() {
        let mut r = TimestampReconstructor::new(default_window());
        r.observe(0xFFFF_0000);
        r.on_long_timestamp(0xFFFF_FFFF);
        let (value, _) = r.observe(0);
        assert_eq!(value, 0);
    }
}
