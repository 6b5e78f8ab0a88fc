use crate::core::map_days;
use crate::core::quality::{ClassTable, QualityClassifier};
use crate::core::statistics::PixelCounts;
use crate::types::{
    is_snow_cover, ClassCode, ClassStack, GridShape, ObservationStack, SnowError, SnowGrid,
    SnowResult, Verdict,
};
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// Observation stack and parallel class codes from one sensor
#[derive(Debug, Clone)]
pub struct SensorObservations {
    pub values: ObservationStack,
    pub classes: ClassStack,
}

impl SensorObservations {
    pub fn new(values: ObservationStack, classes: ClassStack) -> SnowResult<Self> {
        if values.dim() != classes.dim() {
            return Err(SnowError::shape_mismatch(
                "sensor class codes",
                GridShape::of(&values),
                GridShape::of(&classes),
            ));
        }
        Ok(Self { values, classes })
    }

    /// Build from a class raster stored with a wider integer type.
    ///
    /// Codes outside the classifier's range are replaced by a code the
    /// classifier rejects, so they can never pass as observations.
    pub fn from_wide_codes(
        values: ObservationStack,
        codes: &Array3<i64>,
        classifier: &QualityClassifier,
    ) -> SnowResult<Self> {
        let mut foreign = 0usize;
        let classes = match classifier.invalid_code() {
            Some(invalid) => codes.mapv(|code| {
                ClassCode::try_from(code).unwrap_or_else(|_| {
                    foreign += 1;
                    invalid
                })
            }),
            None if codes.iter().all(|code| ClassCode::try_from(*code).is_ok()) => {
                codes.mapv(|code| code as ClassCode)
            }
            None => {
                return Err(SnowError::InvalidInput(
                    "Class codes exceed the table range and the table has no invalid code to map them to"
                        .to_string(),
                ))
            }
        };
        if foreign > 0 {
            log::debug!("{} class codes outside 0..=255 treated as invalid", foreign);
        }
        Self::new(values, classes)
    }

    /// A sensor that delivered nothing: every value missing, every code `fill_code`
    pub fn unavailable(shape: GridShape, fill_code: ClassCode) -> Self {
        let dim = (shape.days, shape.rows, shape.cols);
        Self {
            values: Array3::from_elem(dim, f32::NAN),
            classes: Array3::from_elem(dim, fill_code),
        }
    }

    pub fn shape(&self) -> GridShape {
        GridShape::of(&self.values)
    }

    /// Shape of the sensor, once its class codes are known to cover every value.
    ///
    /// The fields are public, so a stack can be swapped after construction.
    pub fn checked_shape(&self, what: &str) -> SnowResult<GridShape> {
        let shape = self.shape();
        if self.classes.dim() != self.values.dim() {
            return Err(SnowError::shape_mismatch(
                format!("{} class codes", what),
                shape,
                GridShape::of(&self.classes),
            ));
        }
        Ok(shape)
    }

    /// The observation at a pixel-day, if both its class and value are usable
    #[inline]
    fn usable(
        &self,
        classifier: &QualityClassifier,
        day: usize,
        row: usize,
        col: usize,
    ) -> Option<(f32, Verdict)> {
        let verdict = classifier.classify(self.classes[[day, row, col]]);
        let value = self.values[[day, row, col]];
        if verdict.is_valid() && is_snow_cover(value) {
            Some((value, verdict))
        } else {
            None
        }
    }
}

/// Fused grid plus the verdict of the observation each cell came from
#[derive(Debug, Clone)]
pub struct FusedGrid {
    grid: SnowGrid,
    verdicts: Array3<Verdict>,
}

impl FusedGrid {
    pub fn grid(&self) -> &SnowGrid {
        &self.grid
    }

    /// Verdict behind a fused cell; `Invalid` where fusion left a gap
    pub fn verdict(&self, day: usize, row: usize, col: usize) -> Verdict {
        self.verdicts[[day, row, col]]
    }

    pub fn day_verdicts(&self, day: usize) -> ArrayView2<'_, Verdict> {
        self.verdicts.index_axis(Axis(0), day)
    }

    pub fn into_grid(self) -> SnowGrid {
        self.grid
    }
}

/// Merges the primary (morning) and secondary (afternoon) passes of a day.
///
/// The primary observation wins whenever it is usable; the secondary only
/// fills in where the primary is flagged or missing.
pub struct SensorFusion {
    classifier: QualityClassifier,
}

impl SensorFusion {
    pub fn new(classifier: QualityClassifier) -> Self {
        Self { classifier }
    }

    pub fn with_table(table: &ClassTable) -> Self {
        Self::new(QualityClassifier::new(table))
    }

    pub fn classifier(&self) -> &QualityClassifier {
        &self.classifier
    }

    /// Fuse both sensors, returning the fused grid and per-day fusion counts.
    ///
    /// Pixels outside `study_area` stay unresolved and are not counted.
    pub fn fuse(
        &self,
        primary: &SensorObservations,
        secondary: &SensorObservations,
        study_area: Option<&Array2<bool>>,
    ) -> SnowResult<(FusedGrid, Vec<PixelCounts>)> {
        let shape = primary.checked_shape("primary")?;
        let secondary_shape = secondary.checked_shape("secondary")?;
        if secondary_shape != shape {
            return Err(SnowError::shape_mismatch(
                "secondary sensor",
                shape,
                secondary_shape,
            ));
        }
        if let Some(area) = study_area {
            if area.dim() != shape.spatial() {
                return Err(SnowError::shape_mismatch(
                    "study area",
                    format!("{}x{}", shape.rows, shape.cols),
                    format!("{}x{}", area.nrows(), area.ncols()),
                ));
            }
        }

        log::info!("Fusing primary and secondary observations ({})", shape);

        let inside = |row: usize, col: usize| study_area.map_or(true, |area| area[[row, col]]);

        let per_day = map_days(shape.days, |day| {
            let mut cells = Array2::from_elem(shape.spatial(), None);
            let mut verdicts = Array2::from_elem(shape.spatial(), Verdict::Invalid);
            let mut counts = PixelCounts::default();

            for row in 0..shape.rows {
                for col in 0..shape.cols {
                    if !inside(row, col) {
                        continue;
                    }
                    counts.total += 1;

                    if let Some((value, verdict)) = primary.usable(&self.classifier, day, row, col) {
                        cells[[row, col]] = Some(value);
                        verdicts[[row, col]] = verdict;
                        counts.primary_sourced += 1;
                    } else if let Some((value, verdict)) =
                        secondary.usable(&self.classifier, day, row, col)
                    {
                        cells[[row, col]] = Some(value);
                        verdicts[[row, col]] = verdict;
                        counts.secondary_sourced += 1;
                    } else {
                        counts.unresolved_after_fusion += 1;
                    }
                }
            }

            (cells, verdicts, counts)
        });

        let dim = (shape.days, shape.rows, shape.cols);
        let mut cells = Array3::from_elem(dim, None);
        let mut verdicts = Array3::from_elem(dim, Verdict::Invalid);
        let mut daily_counts = Vec::with_capacity(shape.days);
        for (day, (day_cells, day_verdicts, counts)) in per_day.into_iter().enumerate() {
            cells.index_axis_mut(Axis(0), day).assign(&day_cells);
            verdicts.index_axis_mut(Axis(0), day).assign(&day_verdicts);
            daily_counts.push(counts);
        }

        let mut grid = SnowGrid::from_cells(cells)?;
        if let Some(area) = study_area {
            grid = grid.with_study_area(area.clone())?;
        }

        let totals: PixelCounts = daily_counts.iter().copied().sum();
        log::info!(
            "Fusion complete: {} primary, {} secondary, {} unresolved of {} pixel-days",
            totals.primary_sourced,
            totals.secondary_sourced,
            totals.unresolved_after_fusion,
            totals.total
        );

        Ok((FusedGrid { grid, verdicts }, daily_counts))
    }
}

impl Default for SensorFusion {
    fn default() -> Self {
        Self::new(QualityClassifier::default())
    }
}
