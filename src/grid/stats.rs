//! Profit and position accounting
//!
//! The tracker is pure bookkeeping: the reconciliation engine feeds it fills
//! and it hands out immutable snapshots. It performs no I/O and cannot fail.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Buy/sell fill counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillCounts {
    pub buys: u32,
    pub sells: u32,
}

impl FillCounts {
    /// Completed buy->sell cycles
    pub fn round_trips(&self) -> u32 {
        self.buys.min(self.sells)
    }
}

/// Point-in-time view of a session's accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_profit: f64,
    pub position_size: f64,
    pub fill_counts: FillCounts,
    pub profit_per_level: BTreeMap<u32, f64>,
    pub started_at: DateTime<Utc>,
    pub running_secs: i64,
    /// Realized profit over investment, in percent
    pub roi: f64,
    /// Realized loss since the start of the UTC day (non-negative)
    pub daily_loss: f64,
    /// Consistency anomalies observed since start
    pub anomalies: u32,
}

/// Running totals for one session
#[derive(Debug, Clone)]
pub struct ProfitTracker {
    investment: f64,
    started_at: DateTime<Utc>,
    total_profit: f64,
    position_size: f64,
    fill_counts: FillCounts,
    profit_per_level: BTreeMap<u32, f64>,
    day: NaiveDate,
    daily_realized: f64,
    anomalies: u32,
}

impl ProfitTracker {
    pub fn new(investment: f64) -> Self {
        Self::starting_at(investment, Utc::now())
    }

    pub fn starting_at(investment: f64, started_at: DateTime<Utc>) -> Self {
        Self {
            investment,
            started_at,
            total_profit: 0.0,
            position_size: 0.0,
            fill_counts: FillCounts::default(),
            profit_per_level: BTreeMap::new(),
            day: started_at.date_naive(),
            daily_realized: 0.0,
            anomalies: 0,
        }
    }

    /// Account a filled buy of `quantity`
    pub fn record_buy(&mut self, quantity: f64) {
        self.fill_counts.buys += 1;
        self.position_size += quantity;
    }

    /// Account a filled sell closing `level`; returns the realized profit
    pub fn record_sell(&mut self, level: u32, entry_price: f64, fill_price: f64, quantity: f64) -> f64 {
        let profit = (fill_price - entry_price) * quantity;
        self.fill_counts.sells += 1;
        self.position_size -= quantity;
        self.total_profit += profit;
        self.daily_realized += profit;
        *self.profit_per_level.entry(level).or_insert(0.0) += profit;
        profit
    }

    /// Account inventory adopted at startup without a fill event
    pub fn adopt_position(&mut self, quantity: f64) {
        self.position_size += quantity;
    }

    pub fn record_anomaly(&mut self) {
        self.anomalies += 1;
    }

    /// Reset the daily window when `today` is past the tracked day
    pub fn roll_day(&mut self, today: NaiveDate) {
        if today > self.day {
            self.day = today;
            self.daily_realized = 0.0;
        }
    }

    pub fn total_profit(&self) -> f64 {
        self.total_profit
    }

    pub fn position_size(&self) -> f64 {
        self.position_size
    }

    pub fn fill_counts(&self) -> FillCounts {
        self.fill_counts
    }

    /// Realized loss for the current day, zero when the day is net positive
    pub fn daily_loss(&self) -> f64 {
        (-self.daily_realized).max(0.0)
    }

    pub fn roi(&self) -> f64 {
        if self.investment > 0.0 {
            self.total_profit / self.investment * 100.0
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> StatsSnapshot {
        StatsSnapshot {
            total_profit: self.total_profit,
            position_size: self.position_size,
            fill_counts: self.fill_counts,
            profit_per_level: self.profit_per_level.clone(),
            started_at: self.started_at,
            running_secs: (now - self.started_at).num_seconds().max(0),
            roi: self.roi(),
            daily_loss: self.daily_loss(),
            anomalies: self.anomalies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_round_trip_profit() {
        let mut tracker = ProfitTracker::new(1000.0);
        tracker.record_buy(2.0);
        assert_eq!(tracker.position_size(), 2.0);

        let profit = tracker.record_sell(0, 100.0, 102.0, 2.0);
        assert!((profit - 4.0).abs() < 1e-12);
        assert!((tracker.total_profit() - 4.0).abs() < 1e-12);
        assert!(tracker.position_size().abs() < 1e-12);
        assert_eq!(tracker.fill_counts(), FillCounts { buys: 1, sells: 1 });
        assert_eq!(tracker.fill_counts().round_trips(), 1);
        assert!((tracker.roi() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_profit_per_level_accumulates() {
        let mut tracker = ProfitTracker::new(500.0);
        tracker.record_buy(1.0);
        tracker.record_sell(3, 106.0, 108.0, 1.0);
        tracker.record_buy(1.0);
        tracker.record_sell(3, 106.0, 108.5, 1.0);
        tracker.record_buy(1.0);
        tracker.record_sell(1, 102.0, 104.0, 1.0);

        let snapshot = tracker.snapshot();
        assert!((snapshot.profit_per_level[&3] - 4.5).abs() < 1e-12);
        assert!((snapshot.profit_per_level[&1] - 2.0).abs() < 1e-12);
        assert!((snapshot.total_profit - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_daily_loss_window() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut tracker = ProfitTracker::starting_at(1000.0, start);

        tracker.record_buy(10.0);
        tracker.record_sell(0, 100.0, 95.0, 10.0); // -50
        assert!((tracker.daily_loss() - 50.0).abs() < 1e-12);

        // Same day: no reset
        tracker.roll_day(start.date_naive());
        assert!((tracker.daily_loss() - 50.0).abs() < 1e-12);

        // Next day: window resets, total keeps the loss
        tracker.roll_day((start + Duration::days(1)).date_naive());
        assert_eq!(tracker.daily_loss(), 0.0);
        assert!((tracker.total_profit() + 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_running_duration() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let tracker = ProfitTracker::starting_at(1000.0, start);
        let snapshot = tracker.snapshot_at(start + Duration::seconds(90));
        assert_eq!(snapshot.running_secs, 90);
        assert_eq!(snapshot.roi, 0.0);
        assert_eq!(snapshot.anomalies, 0);
    }
}
