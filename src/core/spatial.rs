use crate::core::config::{GapFillConfig, SpatialCorrectionMethod};
use crate::core::fusion::FusedGrid;
use crate::core::map_days;
use crate::core::statistics::PixelCounts;
use crate::types::{ElevationGrid, SnowError, SnowGrid, SnowResult, Verdict};
use serde::{Deserialize, Serialize};

/// Mean and population standard deviation of a set of elevations (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub samples: usize,
}

impl ElevationStatistics {
    /// Statistics over the finite values of `elevations`; `None` when there are none
    pub fn from_elevations<I>(elevations: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut samples = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for z in elevations.into_iter().filter(|z| z.is_finite()) {
            let z = z as f64;
            samples += 1;
            sum += z;
            sum_sq += z * z;
        }

        if samples == 0 {
            return None;
        }

        let mean = sum / samples as f64;
        let variance = (sum_sq / samples as f64 - mean * mean).max(0.0);
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            samples,
        })
    }

    /// Elevations above this are assumed snow-covered
    pub fn upper(&self) -> f64 {
        self.mean + self.std_dev
    }

    /// Elevations below this are assumed snow-free
    pub fn lower(&self) -> f64 {
        self.mean - self.std_dev
    }
}

/// Resolves gaps left by temporal interpolation from elevation context.
///
/// Each day is handled in two phases: a read-only reduction over the day
/// (the snow-elevation statistic) that completes before any pixel of that day
/// is decided, then an independent per-pixel pass that only reads the
/// statistic and the pre-correction grid.
#[derive(Debug, Clone)]
pub struct SpatialCorrector {
    method: SpatialCorrectionMethod,
    altitude_threshold_m: f32,
    snow_value: f32,
    no_snow_value: f32,
    snow_threshold: f32,
    min_snow_samples: usize,
    max_high_elevation_gap_ratio: Option<f32>,
}

impl SpatialCorrector {
    pub fn new(method: SpatialCorrectionMethod) -> Self {
        Self::from_config(&GapFillConfig::new(Default::default(), method))
    }

    pub fn from_config(config: &GapFillConfig) -> Self {
        Self {
            method: config.spatial_correction_method,
            altitude_threshold_m: config.altitude_threshold_m,
            snow_value: config.snow_value,
            no_snow_value: config.no_snow_value,
            snow_threshold: config.snow_threshold,
            min_snow_samples: config.min_snow_samples,
            max_high_elevation_gap_ratio: config.max_high_elevation_gap_ratio,
        }
    }

    pub fn method(&self) -> SpatialCorrectionMethod {
        self.method
    }

    /// Correct the remaining gaps of `grid`, returning the new grid and per-day counts.
    ///
    /// `fused` supplies the SnowValid verdicts behind the elevation statistic.
    pub fn correct(
        &self,
        grid: &SnowGrid,
        fused: &FusedGrid,
        elevation: &ElevationGrid,
    ) -> SnowResult<(SnowGrid, Vec<PixelCounts>)> {
        let shape = grid.shape();
        if elevation.dim() != shape.spatial() {
            return Err(SnowError::shape_mismatch(
                "elevation",
                format!("{}x{}", shape.rows, shape.cols),
                format!("{}x{}", elevation.nrows(), elevation.ncols()),
            ));
        }
        if fused.grid().shape() != shape {
            return Err(SnowError::shape_mismatch("fused grid", shape, fused.grid().shape()));
        }

        log::info!("Spatial correction ({})", self.method);

        let (corrected, filled) = match self.method {
            SpatialCorrectionMethod::None => (grid.clone(), vec![0; shape.days]),
            SpatialCorrectionMethod::ElevationMean => {
                let statistics = map_days(shape.days, |day| {
                    self.elevation_statistics(grid, fused, elevation, day)
                });

                let skipped = statistics.iter().filter(|s| s.is_none()).count();
                if skipped > 0 {
                    log::warn!(
                        "Elevation-mean correction skipped on {} of {} days (insufficient snow evidence)",
                        skipped,
                        shape.days
                    );
                }

                grid.fill_gaps(|day, row, col| {
                    let stats = statistics[day]?;
                    let z = elevation[[row, col]] as f64;
                    if z > stats.upper() {
                        Some(self.snow_value)
                    } else if z < stats.lower() {
                        Some(self.no_snow_value)
                    } else {
                        None
                    }
                })
            }
            SpatialCorrectionMethod::NeighborBased => {
                grid.fill_gaps(|day, row, col| self.neighbor_vote(grid, elevation, day, row, col))
            }
        };

        let counts: Vec<PixelCounts> = filled
            .iter()
            .enumerate()
            .map(|(day, &spatially_corrected)| PixelCounts {
                spatially_corrected,
                final_remaining: corrected.gaps_in_day(day),
                ..PixelCounts::default()
            })
            .collect();

        let totals: PixelCounts = counts.iter().copied().sum();
        log::info!(
            "Spatial correction filled {} pixel-days, {} gaps remain",
            totals.spatially_corrected,
            totals.final_remaining
        );

        Ok((corrected, counts))
    }

    /// Snow-elevation statistic for one day, or `None` when the day must be left alone
    pub fn elevation_statistics(
        &self,
        grid: &SnowGrid,
        fused: &FusedGrid,
        elevation: &ElevationGrid,
        day: usize,
    ) -> Option<ElevationStatistics> {
        if let Some(max_ratio) = self.max_high_elevation_gap_ratio {
            let mut high = 0usize;
            let mut high_gaps = 0usize;
            for ((row, col), &z) in elevation.indexed_iter() {
                if grid.in_area(row, col) && z > self.altitude_threshold_m {
                    high += 1;
                    if grid.get(day, row, col).is_none() {
                        high_gaps += 1;
                    }
                }
            }
            if high == 0 || high_gaps as f32 / high as f32 >= max_ratio {
                log::debug!("Day {}: high-elevation gaps {}/{}, skipping", day, high_gaps, high);
                return None;
            }
        }

        let verdicts = fused.day_verdicts(day);
        let snow_elevations = verdicts
            .indexed_iter()
            .filter(|(_, verdict)| **verdict == Verdict::SnowValid)
            .map(|((row, col), _)| elevation[[row, col]]);

        let stats = ElevationStatistics::from_elevations(snow_elevations)
            .filter(|stats| stats.samples >= self.min_snow_samples)?;

        log::debug!(
            "Day {}: snow elevation mean {:.1} m, std {:.1} m over {} pixels",
            day,
            stats.mean,
            stats.std_dev,
            stats.samples
        );
        Some(stats)
    }

    /// Snow when a strict majority of valid high-altitude neighbours is snow-covered
    fn neighbor_vote(
        &self,
        grid: &SnowGrid,
        elevation: &ElevationGrid,
        day: usize,
        row: usize,
        col: usize,
    ) -> Option<f32> {
        let threshold = self.altitude_threshold_m;
        if !(elevation[[row, col]] > threshold) {
            return None;
        }

        let (rows, cols) = elevation.dim();
        let mut qualifying = 0usize;
        let mut snow = 0usize;

        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let nr = row as i64 + dr;
                let nc = col as i64 + dc;
                if nr < 0 || nc < 0 || nr >= rows as i64 || nc >= cols as i64 {
                    continue;
                }
                let (nr, nc) = (nr as usize, nc as usize);

                if !grid.in_area(nr, nc) || !(elevation[[nr, nc]] > threshold) {
                    continue;
                }
                if let Some(value) = grid.get(day, nr, nc) {
                    qualifying += 1;
                    if value > self.snow_threshold {
                        snow += 1;
                    }
                }
            }
        }

        if qualifying > 0 && 2 * snow > qualifying {
            Some(self.snow_value)
        } else {
            None
        }
    }
}
