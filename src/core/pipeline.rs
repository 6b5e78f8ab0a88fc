use crate::core::config::GapFillConfig;
use crate::core::fusion::{SensorFusion, SensorObservations};
use crate::core::quality::QualityClassifier;
use crate::core::spatial::SpatialCorrector;
use crate::core::statistics::{RunStatistics, StatisticsAggregator};
use crate::core::temporal::{TemporalInterpolator, WINDOW_DAYS_AFTER, WINDOW_DAYS_BEFORE};
use crate::core::timeline::DailyTimeAxis;
use crate::types::{ElevationGrid, GridShape, SnowError, SnowGrid, SnowResult};
use ndarray::Array2;

/// Everything a gap-filling run consumes
#[derive(Debug, Clone)]
pub struct GapFillInputs {
    /// Morning pass, preferred by fusion
    pub primary: SensorObservations,
    /// Afternoon pass, used only where the primary is unusable
    pub secondary: SensorObservations,
    pub elevation: ElevationGrid,
    pub study_area: Option<Array2<bool>>,
    pub time_axis: Option<DailyTimeAxis>,
}

impl GapFillInputs {
    pub fn new(
        primary: SensorObservations,
        secondary: SensorObservations,
        elevation: ElevationGrid,
    ) -> Self {
        Self {
            primary,
            secondary,
            elevation,
            study_area: None,
            time_axis: None,
        }
    }

    pub fn with_study_area(mut self, study_area: Array2<bool>) -> Self {
        self.study_area = Some(study_area);
        self
    }

    pub fn with_time_axis(mut self, time_axis: DailyTimeAxis) -> Self {
        self.time_axis = Some(time_axis);
        self
    }

    pub fn shape(&self) -> GridShape {
        self.primary.shape()
    }

    /// Check every input against the primary sensor's shape
    pub fn validate(&self) -> SnowResult<GridShape> {
        let shape = self.shape();
        let spatial = format!("{}x{}", shape.rows, shape.cols);

        self.primary.checked_shape("primary")?;
        if self.secondary.checked_shape("secondary")? != shape {
            return Err(SnowError::shape_mismatch(
                "secondary observations",
                shape,
                self.secondary.shape(),
            ));
        }
        if self.elevation.dim() != shape.spatial() {
            return Err(SnowError::shape_mismatch(
                "elevation",
                &spatial,
                format!("{}x{}", self.elevation.nrows(), self.elevation.ncols()),
            ));
        }
        if let Some(area) = &self.study_area {
            if area.dim() != shape.spatial() {
                return Err(SnowError::shape_mismatch(
                    "study area",
                    &spatial,
                    format!("{}x{}", area.nrows(), area.ncols()),
                ));
            }
        }
        if let Some(axis) = &self.time_axis {
            if axis.days() != shape.days {
                return Err(SnowError::shape_mismatch(
                    "time axis",
                    format!("{} days", shape.days),
                    format!("{} days", axis.days()),
                ));
            }
        }

        let inside = |row: usize, col: usize| {
            self.study_area.as_ref().map_or(true, |area| area[[row, col]])
        };
        if let Some(((row, col), _)) = self
            .elevation
            .indexed_iter()
            .find(|((row, col), z)| inside(*row, *col) && !z.is_finite())
        {
            return Err(SnowError::InvalidInput(format!(
                "Elevation at pixel ({}, {}) is not finite",
                row, col
            )));
        }

        Ok(shape)
    }
}

/// Result of a gap-filling run
#[derive(Debug, Clone)]
pub struct GapFillOutput {
    pub grid: SnowGrid,
    pub statistics: RunStatistics,
}

/// Runs fusion, temporal interpolation and spatial correction in order
pub struct GapFillProcessor {
    config: GapFillConfig,
    fusion: SensorFusion,
    temporal: TemporalInterpolator,
    spatial: SpatialCorrector,
}

impl GapFillProcessor {
    /// Create a processor; the configuration is validated up front
    pub fn new(config: GapFillConfig) -> SnowResult<Self> {
        config.validate()?;
        Ok(Self {
            fusion: SensorFusion::with_table(&config.class_table),
            temporal: TemporalInterpolator::new(config.interpolation_method),
            spatial: SpatialCorrector::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &GapFillConfig {
        &self.config
    }

    pub fn classifier(&self) -> &QualityClassifier {
        self.fusion.classifier()
    }

    /// Fill the gaps of one run.
    ///
    /// Shape and input errors are reported before any stage runs; after that
    /// the run cannot fail.
    pub fn process(&self, inputs: &GapFillInputs) -> SnowResult<GapFillOutput> {
        let shape = inputs.validate()?;

        log::info!("Starting gap filling for {} grid", shape);
        log::info!(
            "Moving window: {} days before, {} days after",
            WINDOW_DAYS_BEFORE,
            WINDOW_DAYS_AFTER
        );
        log::info!("Interpolation: {}", self.config.interpolation_method);
        log::info!("Spatial correction: {}", self.config.spatial_correction_method);
        log::debug!(
            "Estimated memory: {:.1} MiB",
            shape.estimated_memory_bytes() as f64 / (1024.0 * 1024.0)
        );
        if let Some(axis) = &inputs.time_axis {
            log::info!("Time range: {} ({} days)", axis.start(), axis.days());
        }

        let mut aggregator = StatisticsAggregator::new(shape.days);

        let (fused, fusion_counts) = self.fusion.fuse(
            &inputs.primary,
            &inputs.secondary,
            inputs.study_area.as_ref(),
        )?;
        aggregator.record(&fusion_counts);

        let (interpolated, temporal_counts) = self.temporal.interpolate(fused.grid());
        aggregator.record(&temporal_counts);

        let (corrected, spatial_counts) =
            self.spatial.correct(&interpolated, &fused, &inputs.elevation)?;
        aggregator.record(&spatial_counts);

        let statistics = aggregator.finalize(inputs.time_axis.as_ref());
        let totals = statistics.totals();
        log::info!(
            "Gap filling complete: {} of {} pixel-days resolved ({:.1}%), {} gaps remain",
            totals.total - totals.final_remaining,
            totals.total,
            totals.resolved_fraction() * 100.0,
            totals.final_remaining
        );

        Ok(GapFillOutput {
            grid: corrected,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{InterpolationMethod, SpatialCorrectionMethod};
    use ndarray::Array3;

    fn inputs(days: usize, rows: usize, cols: usize) -> GapFillInputs {
        let shape = GridShape::new(days, rows, cols);
        let primary = SensorObservations::new(
            Array3::from_elem((days, rows, cols), 60.0),
            Array3::from_elem((days, rows, cols), 60),
        )
        .unwrap();
        let secondary = SensorObservations::unavailable(shape, 255);
        GapFillInputs::new(primary, secondary, Array2::from_elem((rows, cols), 2000.0))
    }

    #[test]
    fn test_invalid_config_rejected_before_processing() {
        let mut config = GapFillConfig::default();
        config.no_snow_value = -5.0;
        assert!(matches!(
            GapFillProcessor::new(config),
            Err(SnowError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_elevation_shape_mismatch() {
        let mut inputs = inputs(3, 2, 2);
        inputs.elevation = Array2::zeros((2, 3));

        let processor = GapFillProcessor::new(GapFillConfig::default()).unwrap();
        assert!(matches!(
            processor.process(&inputs),
            Err(SnowError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_secondary_shape_mismatch() {
        let mut inputs = inputs(3, 2, 2);
        inputs.secondary = SensorObservations::unavailable(GridShape::new(4, 2, 2), 255);
        assert!(matches!(inputs.validate(), Err(SnowError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_time_axis_length_checked() {
        let start = chrono::NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let inputs = inputs(3, 1, 1).with_time_axis(DailyTimeAxis::new(start, 4));
        assert!(matches!(inputs.validate(), Err(SnowError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_nan_elevation_inside_area_rejected() {
        let mut inputs = inputs(2, 1, 2);
        inputs.elevation[[0, 1]] = f32::NAN;
        assert!(matches!(inputs.validate(), Err(SnowError::InvalidInput(_))));

        let inputs = inputs.with_study_area(ndarray::array![[true, false]]);
        assert!(inputs.validate().is_ok());
    }

    #[test]
    fn test_clear_sky_run_passes_through() {
        let inputs = inputs(4, 2, 2);
        let processor = GapFillProcessor::new(GapFillConfig::new(
            InterpolationMethod::Cubic,
            SpatialCorrectionMethod::NeighborBased,
        ))
        .unwrap();

        let output = processor.process(&inputs).unwrap();
        let totals = output.statistics.totals();

        assert_eq!(output.grid.gap_count(), 0);
        assert_eq!(totals.total, 16);
        assert_eq!(totals.primary_sourced, 16);
        assert_eq!(totals.interpolated, 0);
        assert!(totals.is_consistent());
    }
}
