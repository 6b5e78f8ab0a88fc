//! Core gap-filling stages

pub mod config;
pub mod quality;
pub mod fusion;
pub mod temporal;
pub mod spatial;
pub mod statistics;
pub mod timeline;
pub mod pipeline;

// Re-export main types
pub use config::{GapFillConfig, InterpolationMethod, SpatialCorrectionMethod};
pub use quality::{ClassCategory, ClassTable, QualityClassifier};
pub use fusion::{FusedGrid, SensorFusion, SensorObservations};
pub use temporal::{TemporalInterpolator, WINDOW_DAYS_AFTER, WINDOW_DAYS_BEFORE};
pub use spatial::{ElevationStatistics, SpatialCorrector};
pub use statistics::{DailyStatistics, PixelCounts, RunStatistics, StatisticsAggregator};
pub use timeline::DailyTimeAxis;
pub use pipeline::{GapFillInputs, GapFillOutput, GapFillProcessor};

/// Evaluate `f` once per day index, in parallel when the `parallel` feature is on.
///
/// Results come back in day order either way.
pub(crate) fn map_days<T, F>(days: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..days).into_par_iter().map(f).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..days).map(f).collect()
    }
}
