use crate::core::timeline::DailyTimeAxis;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Pixel-day tallies describing how each cell was resolved.
///
/// Every stage reports per-day partial counts with only its own fields set;
/// partials combine with [`PixelCounts::merge`], which is associative and
/// commutative, so the totals do not depend on how work was split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCounts {
    /// In-area pixel-days
    pub total: usize,
    pub primary_sourced: usize,
    pub secondary_sourced: usize,
    pub unresolved_after_fusion: usize,
    pub interpolated: usize,
    pub remaining_after_temporal: usize,
    pub spatially_corrected: usize,
    pub final_remaining: usize,
}

impl PixelCounts {
    pub fn merge(self, other: PixelCounts) -> PixelCounts {
        PixelCounts {
            total: self.total + other.total,
            primary_sourced: self.primary_sourced + other.primary_sourced,
            secondary_sourced: self.secondary_sourced + other.secondary_sourced,
            unresolved_after_fusion: self.unresolved_after_fusion + other.unresolved_after_fusion,
            interpolated: self.interpolated + other.interpolated,
            remaining_after_temporal: self.remaining_after_temporal + other.remaining_after_temporal,
            spatially_corrected: self.spatially_corrected + other.spatially_corrected,
            final_remaining: self.final_remaining + other.final_remaining,
        }
    }

    /// Cells resolved directly from either sensor
    pub fn sensor_sourced(&self) -> usize {
        self.primary_sourced + self.secondary_sourced
    }

    /// Checks that every pixel-day is accounted for exactly once
    pub fn is_consistent(&self) -> bool {
        self.sensor_sourced() + self.unresolved_after_fusion == self.total
            && self.interpolated + self.remaining_after_temporal == self.unresolved_after_fusion
            && self.spatially_corrected + self.final_remaining == self.remaining_after_temporal
    }

    /// Share of pixel-days that carry a value at the end of the run
    pub fn resolved_fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total - self.final_remaining) as f64 / self.total as f64
    }
}

impl Add for PixelCounts {
    type Output = PixelCounts;

    fn add(self, rhs: PixelCounts) -> PixelCounts {
        self.merge(rhs)
    }
}

impl AddAssign for PixelCounts {
    fn add_assign(&mut self, rhs: PixelCounts) {
        *self = self.merge(rhs);
    }
}

impl std::iter::Sum for PixelCounts {
    fn sum<I: Iterator<Item = PixelCounts>>(iter: I) -> Self {
        iter.fold(PixelCounts::default(), PixelCounts::merge)
    }
}

/// Counts for one day of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatistics {
    pub day: usize,
    pub date: Option<NaiveDate>,
    pub counts: PixelCounts,
}

/// Final, read-only counter snapshot of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    totals: PixelCounts,
    daily: Vec<DailyStatistics>,
}

impl RunStatistics {
    pub fn totals(&self) -> &PixelCounts {
        &self.totals
    }

    pub fn daily(&self) -> &[DailyStatistics] {
        &self.daily
    }

    pub fn total_pixel_days(&self) -> usize {
        self.totals.total
    }

    pub fn primary_sourced(&self) -> usize {
        self.totals.primary_sourced
    }

    pub fn secondary_sourced(&self) -> usize {
        self.totals.secondary_sourced
    }

    pub fn interpolated(&self) -> usize {
        self.totals.interpolated
    }

    pub fn spatially_corrected(&self) -> usize {
        self.totals.spatially_corrected
    }

    pub fn final_remaining(&self) -> usize {
        self.totals.final_remaining
    }
}

/// Collects the per-day counts each stage reports during a run
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    daily: Vec<PixelCounts>,
}

impl StatisticsAggregator {
    pub fn new(days: usize) -> Self {
        Self {
            daily: vec![PixelCounts::default(); days],
        }
    }

    /// Merge one stage's per-day partial counts into the running tallies
    pub fn record(&mut self, stage: &[PixelCounts]) {
        debug_assert_eq!(stage.len(), self.daily.len());
        for (day, partial) in self.daily.iter_mut().zip(stage) {
            *day += *partial;
        }
    }

    /// Current running totals
    pub fn totals(&self) -> PixelCounts {
        self.daily.iter().copied().sum()
    }

    /// Consume the aggregator into the immutable run snapshot
    pub fn finalize(self, time_axis: Option<&DailyTimeAxis>) -> RunStatistics {
        let totals = self.totals();
        if !totals.is_consistent() {
            log::warn!("Pixel counters do not add up: {:?}", totals);
        }

        let daily = self
            .daily
            .into_iter()
            .enumerate()
            .map(|(day, counts)| DailyStatistics {
                day,
                date: time_axis.and_then(|axis| axis.date(day)),
                counts,
            })
            .collect();

        RunStatistics { totals, daily }
    }
}
