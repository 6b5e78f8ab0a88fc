use crate::core::config::InterpolationMethod;
use crate::core::statistics::PixelCounts;
use crate::types::{SnowGrid, SNOW_COVER_MAX, SNOW_COVER_MIN};

/// Days before the target day covered by the interpolation window
pub const WINDOW_DAYS_BEFORE: usize = 3;

/// Days after the target day covered by the interpolation window
pub const WINDOW_DAYS_AFTER: usize = 2;

const WINDOW_LEN: usize = WINDOW_DAYS_BEFORE + WINDOW_DAYS_AFTER;

/// Valid (day offset, value) pairs around a target day
#[derive(Debug, Clone, Copy)]
struct WindowSamples {
    points: [(i32, f32); WINDOW_LEN],
    len: usize,
}

impl WindowSamples {
    fn collect(grid: &SnowGrid, day: usize, row: usize, col: usize) -> Self {
        let days = grid.shape().days as i64;
        let mut samples = WindowSamples {
            points: [(0, 0.0); WINDOW_LEN],
            len: 0,
        };

        let before = -(WINDOW_DAYS_BEFORE as i32);
        let after = WINDOW_DAYS_AFTER as i32;
        for offset in before..=after {
            if offset == 0 {
                continue;
            }
            let source = day as i64 + offset as i64;
            if source < 0 || source >= days {
                continue;
            }
            if let Some(value) = grid.get(source as usize, row, col) {
                samples.points[samples.len] = (offset, value);
                samples.len += 1;
            }
        }

        samples
    }

    fn from_points(points: &[(i32, f32)]) -> Self {
        let mut samples = WindowSamples {
            points: [(0, 0.0); WINDOW_LEN],
            len: 0,
        };
        for &point in points.iter().take(WINDOW_LEN) {
            samples.points[samples.len] = point;
            samples.len += 1;
        }
        samples
    }

    fn as_slice(&self) -> &[(i32, f32)] {
        &self.points[..self.len]
    }
}

/// Fills gaps from a fixed six-day window around each target day.
///
/// Only the fused grid is read, so every target day sees the same snapshot and
/// values produced by this stage never feed other targets.
pub struct TemporalInterpolator {
    method: InterpolationMethod,
}

impl TemporalInterpolator {
    pub fn new(method: InterpolationMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Interpolate every gap of `fused`, returning the new grid and per-day counts
    pub fn interpolate(&self, fused: &SnowGrid) -> (SnowGrid, Vec<PixelCounts>) {
        log::info!(
            "Temporal interpolation ({}, window -{}..+{} days)",
            self.method,
            WINDOW_DAYS_BEFORE,
            WINDOW_DAYS_AFTER
        );

        let (filled, per_day) = fused.fill_gaps(|day, row, col| {
            let samples = WindowSamples::collect(fused, day, row, col);
            self.estimate_samples(&samples)
        });

        let counts: Vec<PixelCounts> = per_day
            .iter()
            .enumerate()
            .map(|(day, &interpolated)| PixelCounts {
                interpolated,
                remaining_after_temporal: filled.gaps_in_day(day),
                ..PixelCounts::default()
            })
            .collect();

        let totals: PixelCounts = counts.iter().copied().sum();
        log::info!(
            "Temporal interpolation filled {} pixel-days, {} gaps remain",
            totals.interpolated,
            totals.remaining_after_temporal
        );

        (filled, counts)
    }

    /// Estimate the value at offset 0 from `(day offset, value)` pairs.
    ///
    /// Falls back cubic -> linear -> nearest when the evidence is too thin for
    /// the configured method. The estimate is clamped to [0, 100]; `None`
    /// when there are no points at all.
    pub fn estimate(&self, points: &[(i32, f32)]) -> Option<f32> {
        self.estimate_samples(&WindowSamples::from_points(points))
    }

    fn estimate_samples(&self, samples: &WindowSamples) -> Option<f32> {
        let points = samples.as_slice();
        let estimate = match self.method {
            InterpolationMethod::Cubic => cubic(points)
                .or_else(|| linear(points))
                .or_else(|| nearest(points)),
            InterpolationMethod::Linear => linear(points).or_else(|| nearest(points)),
            InterpolationMethod::Nearest => nearest(points),
        };
        estimate
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(SNOW_COVER_MIN, SNOW_COVER_MAX))
    }
}

/// Value with the smallest absolute offset; the earlier day wins a tie
fn nearest(points: &[(i32, f32)]) -> Option<f32> {
    points
        .iter()
        .min_by_key(|(offset, _)| (offset.unsigned_abs(), *offset > 0))
        .map(|(_, value)| *value)
}

/// Linear interpolation between the closest valid days on either side
fn linear(points: &[(i32, f32)]) -> Option<f32> {
    let before = points
        .iter()
        .filter(|(offset, _)| *offset < 0)
        .max_by_key(|(offset, _)| *offset)?;
    let after = points
        .iter()
        .filter(|(offset, _)| *offset > 0)
        .min_by_key(|(offset, _)| *offset)?;

    let (t0, v0) = (before.0 as f32, before.1);
    let (t1, v1) = (after.0 as f32, after.1);
    let alpha = -t0 / (t1 - t0);
    Some(v0 + alpha * (v1 - v0))
}

/// Least-squares cubic through all points, evaluated at offset 0.
///
/// With exactly four distinct offsets the fit passes through every point.
fn cubic(points: &[(i32, f32)]) -> Option<f32> {
    if points.len() < 4 {
        return None;
    }

    // Normal equations: sum(x^(i+j)) c_j = sum(y x^i)
    let mut a = [[0.0f64; 5]; 4];
    for &(offset, value) in points {
        let x = offset as f64;
        let y = value as f64;
        let powers = [1.0, x, x * x, x * x * x];
        for i in 0..4 {
            for j in 0..4 {
                a[i][j] += powers[i] * powers[j];
            }
            a[i][4] += powers[i] * y;
        }
    }

    let coefficients = solve_4x4(a)?;
    Some(coefficients[0] as f32)
}

/// Gaussian elimination with partial pivoting on an augmented 4x5 system
fn solve_4x4(mut a: [[f64; 5]; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot = (col..4).max_by(|&r1, &r2| {
            a[r1][col]
                .abs()
                .partial_cmp(&a[r2][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-9 {
            return None;
        }
        a.swap(col, pivot);

        for row in (col + 1)..4 {
            let factor = a[row][col] / a[col][col];
            for k in col..5 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut x = [0.0f64; 4];
    for row in (0..4).rev() {
        let mut sum = a[row][4];
        for k in (row + 1)..4 {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    const ND: f32 = f32::NAN;

    fn series(values: &[f32]) -> SnowGrid {
        let stack = Array3::from_shape_vec((values.len(), 1, 1), values.to_vec()).unwrap();
        SnowGrid::from_observations(&stack)
    }

    #[test]
    fn test_cubic_falls_back_to_linear() {
        let interpolator = TemporalInterpolator::new(InterpolationMethod::Cubic);
        let value = interpolator.estimate(&[(-3, 10.0), (2, 60.0)]).unwrap();
        assert_abs_diff_eq!(value, 40.0, epsilon = 1e-5);
    }

    #[test]
    fn test_single_point_falls_back_to_nearest() {
        for method in InterpolationMethod::ALL {
            let interpolator = TemporalInterpolator::new(method);
            assert_eq!(interpolator.estimate(&[(-1, 35.0)]), Some(35.0), "{}", method);
        }
    }

    #[test]
    fn test_nearest_prefers_past_on_tie() {
        let interpolator = TemporalInterpolator::new(InterpolationMethod::Nearest);
        assert_eq!(interpolator.estimate(&[(2, 70.0), (-2, 30.0)]), Some(30.0));
        assert_eq!(interpolator.estimate(&[(-3, 10.0), (1, 90.0)]), Some(90.0));
    }

    #[test]
    fn test_linear_one_sided_uses_nearest() {
        let interpolator = TemporalInterpolator::new(InterpolationMethod::Linear);
        assert_eq!(interpolator.estimate(&[(-3, 10.0), (-1, 20.0)]), Some(20.0));
    }

    #[test]
    fn test_no_points_stays_unresolved() {
        let interpolator = TemporalInterpolator::new(InterpolationMethod::Cubic);
        assert_eq!(interpolator.estimate(&[]), None);
    }

    #[test]
    fn test_cubic_recovers_cubic_signal() {
        // f(x) = 50 + 2x + x^2 - 0.5x^3
        let f = |x: f32| 50.0 + 2.0 * x + x * x - 0.5 * x * x * x;
        let points: Vec<(i32, f32)> = [-3, -2, -1, 1, 2].iter().map(|&o| (o, f(o as f32))).collect();

        let interpolator = TemporalInterpolator::new(InterpolationMethod::Cubic);
        assert_abs_diff_eq!(interpolator.estimate(&points).unwrap(), 50.0, epsilon = 1e-3);
        assert_abs_diff_eq!(interpolator.estimate(&points[1..]).unwrap(), 50.0, epsilon = 1e-3);
    }

    #[test]
    fn test_linear_series_scenario() {
        let grid = series(&[ND, 20.0, ND, ND, 80.0, ND]);
        let (filled, counts) = TemporalInterpolator::new(InterpolationMethod::Linear).interpolate(&grid);

        assert_abs_diff_eq!(filled.get(2, 0, 0).unwrap(), 40.0, epsilon = 1e-4);
        assert_abs_diff_eq!(filled.get(3, 0, 0).unwrap(), 60.0, epsilon = 1e-4);
        assert_eq!(filled.get(0, 0, 0), Some(20.0));
        assert_eq!(filled.get(5, 0, 0), Some(80.0));
        assert_eq!(filled.get(1, 0, 0), Some(20.0));
        assert_eq!(filled.get(4, 0, 0), Some(80.0));

        let interpolated: usize = counts.iter().map(|c| c.interpolated).sum();
        assert_eq!(interpolated, 4);
        assert_eq!(filled.gap_count(), 0);
    }

    #[test]
    fn test_reads_fused_snapshot_only() {
        let grid = series(&[10.0, ND, ND, ND, ND, ND, ND, ND]);
        let (filled, counts) = TemporalInterpolator::new(InterpolationMethod::Nearest).interpolate(&grid);

        assert_eq!(filled.get(3, 0, 0), Some(10.0));
        assert_eq!(filled.get(4, 0, 0), None);
        assert_eq!(counts[4].remaining_after_temporal, 1);
        assert_eq!(counts[3].interpolated, 1);
    }

    #[test]
    fn test_cubic_output_clamped() {
        let grid = series(&[0.0, 0.0, 100.0, ND, 100.0, 0.0]);
        let (filled, _) = TemporalInterpolator::new(InterpolationMethod::Cubic).interpolate(&grid);
        let value = filled.get(3, 0, 0).unwrap();
        assert!((0.0..=100.0).contains(&value));

        // Overshooting fits are clamped on the direct path too
        let interpolator = TemporalInterpolator::new(InterpolationMethod::Cubic);
        let peak = [(-3, 0.0), (-2, 0.0), (-1, 100.0), (1, 100.0), (2, 0.0)];
        assert_eq!(interpolator.estimate(&peak), Some(100.0));
        let trough = [(-3, 100.0), (-2, 0.0), (1, 0.0), (2, 100.0)];
        assert_eq!(interpolator.estimate(&trough), Some(0.0));
    }
}
