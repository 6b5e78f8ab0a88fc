use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// Lower bound of the snow-cover fraction domain (percent)
pub const SNOW_COVER_MIN: f32 = 0.0;

/// Upper bound of the snow-cover fraction domain (percent)
pub const SNOW_COVER_MAX: f32 = 100.0;

/// Raw observation value (NDSI snow cover, percent). `NaN` marks no data.
pub type SnowCover = f32;

/// Raw per-pixel quality class code as delivered by the snow product
pub type ClassCode = u8;

/// Day-major observation stack (days x rows x cols)
pub type ObservationStack = Array3<SnowCover>;

/// Day-major class-code stack (days x rows x cols)
pub type ClassStack = Array3<ClassCode>;

/// Static elevation surface in meters (rows x cols)
pub type ElevationGrid = Array2<f32>;

/// Returns true when `value` is a concrete snow-cover fraction
#[inline]
pub fn is_snow_cover(value: f32) -> bool {
    value.is_finite() && (SNOW_COVER_MIN..=SNOW_COVER_MAX).contains(&value)
}

/// Dimensions shared by every grid of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub days: usize,
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn new(days: usize, rows: usize, cols: usize) -> Self {
        Self { days, rows, cols }
    }

    /// Shape of a day-major stack
    pub fn of<T>(stack: &Array3<T>) -> Self {
        let (days, rows, cols) = stack.dim();
        Self { days, rows, cols }
    }

    pub fn spatial(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn pixels(&self) -> usize {
        self.rows * self.cols
    }

    pub fn pixel_days(&self) -> usize {
        self.days * self.pixels()
    }

    /// Approximate bytes held in memory by one gap-filling run of this shape.
    ///
    /// Counts both sensor stacks and their class codes, the fused grid with
    /// its verdicts, the two stage outputs, the elevation surface and the
    /// study-area mask.
    pub fn estimated_memory_bytes(&self) -> usize {
        let value = std::mem::size_of::<SnowCover>();
        let code = std::mem::size_of::<ClassCode>();
        let cell = std::mem::size_of::<Option<f32>>();
        let verdict = std::mem::size_of::<Verdict>();

        let per_pixel_day = 2 * (value + code) + 3 * cell + verdict;
        let per_pixel = std::mem::size_of::<f32>() + std::mem::size_of::<bool>();

        self.pixel_days() * per_pixel_day + self.pixels() * per_pixel
    }
}

impl std::fmt::Display for GridShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.days, self.rows, self.cols)
    }
}

/// Usability verdict for one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    SnowValid,
    LandValid,
    Invalid,
}

impl Verdict {
    #[inline]
    pub fn is_valid(self) -> bool {
        !matches!(self, Verdict::Invalid)
    }
}

/// Day-major grid of snow-cover cells.
///
/// A cell is either `Some(value)` with `value` in [0, 100] or `None` (a gap).
/// Pixels outside the study area are always gaps and are ignored by every
/// count and fill operation. Stages never mutate a grid: they derive a new one
/// through [`SnowGrid::fill_gaps`], which only ever writes cells that are still
/// gaps, so a resolved value is final.
#[derive(Debug, Clone, PartialEq)]
pub struct SnowGrid {
    cells: Array3<Option<f32>>,
    area: Array2<bool>,
}

impl SnowGrid {
    /// Grid with every cell unresolved and every pixel inside the study area
    pub fn empty(shape: GridShape) -> Self {
        Self {
            cells: Array3::from_elem((shape.days, shape.rows, shape.cols), None),
            area: Array2::from_elem(shape.spatial(), true),
        }
    }

    /// Build a grid from raw values; `NaN` and out-of-range values become gaps
    pub fn from_observations(values: &ObservationStack) -> Self {
        let cells = values.mapv(|v| if is_snow_cover(v) { Some(v) } else { None });
        let (_, rows, cols) = values.dim();
        Self {
            cells,
            area: Array2::from_elem((rows, cols), true),
        }
    }

    /// Build a grid from explicit cells, rejecting values outside [0, 100]
    pub fn from_cells(cells: Array3<Option<f32>>) -> SnowResult<Self> {
        if let Some(bad) = cells.iter().flatten().find(|v| !is_snow_cover(**v)) {
            return Err(SnowError::InvalidInput(format!(
                "snow-cover value {} is outside [{}, {}]",
                bad, SNOW_COVER_MIN, SNOW_COVER_MAX
            )));
        }
        let (_, rows, cols) = cells.dim();
        Ok(Self {
            cells,
            area: Array2::from_elem((rows, cols), true),
        })
    }

    /// Restrict the grid to a study area; cells outside it are cleared
    pub fn with_study_area(mut self, area: Array2<bool>) -> SnowResult<Self> {
        let shape = self.shape();
        if area.dim() != shape.spatial() {
            return Err(SnowError::shape_mismatch(
                "study area",
                format!("{}x{}", shape.rows, shape.cols),
                format!("{}x{}", area.nrows(), area.ncols()),
            ));
        }

        for mut day in self.cells.axis_iter_mut(Axis(0)) {
            ndarray::Zip::from(&mut day).and(&area).for_each(|cell, &inside| {
                if !inside {
                    *cell = None;
                }
            });
        }
        self.area = area;
        Ok(self)
    }

    pub fn shape(&self) -> GridShape {
        GridShape::of(&self.cells)
    }

    #[inline]
    pub fn get(&self, day: usize, row: usize, col: usize) -> Option<f32> {
        self.cells[[day, row, col]]
    }

    #[inline]
    pub fn in_area(&self, row: usize, col: usize) -> bool {
        self.area[[row, col]]
    }

    pub fn cells(&self) -> ArrayView3<'_, Option<f32>> {
        self.cells.view()
    }

    pub fn day(&self, day: usize) -> ArrayView2<'_, Option<f32>> {
        self.cells.index_axis(Axis(0), day)
    }

    pub fn study_area(&self) -> ArrayView2<'_, bool> {
        self.area.view()
    }

    /// Number of pixels inside the study area
    pub fn area_pixel_count(&self) -> usize {
        self.area.iter().filter(|inside| **inside).count()
    }

    /// Unresolved cells inside the study area, over all days
    pub fn gap_count(&self) -> usize {
        (0..self.shape().days).map(|day| self.gaps_in_day(day)).sum()
    }

    /// Unresolved cells inside the study area on one day
    pub fn gaps_in_day(&self, day: usize) -> usize {
        ndarray::Zip::from(&self.day(day))
            .and(&self.area)
            .fold(0, |acc, cell, &inside| if inside && cell.is_none() { acc + 1 } else { acc })
    }

    /// Export as plain values with `nodata` standing in for gaps
    pub fn to_array(&self, nodata: f32) -> ObservationStack {
        self.cells.mapv(|cell| cell.unwrap_or(nodata))
    }

    pub fn into_cells(self) -> Array3<Option<f32>> {
        self.cells
    }

    /// Derive a new grid in which gaps may be resolved by `fill`.
    ///
    /// `fill(day, row, col)` is only invoked for in-area cells that are still
    /// gaps; resolved cells are copied untouched. Returned values are clamped
    /// to [0, 100] and non-finite results leave the gap open. Also returns the
    /// number of cells filled on each day.
    pub(crate) fn fill_gaps<F>(&self, fill: F) -> (SnowGrid, Vec<usize>)
    where
        F: Fn(usize, usize, usize) -> Option<f32> + Sync,
    {
        let shape = self.shape();
        let days = crate::core::map_days(shape.days, |day| {
            let mut out = self.day(day).to_owned();
            let mut filled = 0usize;
            for ((row, col), cell) in out.indexed_iter_mut() {
                if cell.is_some() || !self.area[[row, col]] {
                    continue;
                }
                if let Some(value) = fill(day, row, col).filter(|v| v.is_finite()) {
                    *cell = Some(value.clamp(SNOW_COVER_MIN, SNOW_COVER_MAX));
                    filled += 1;
                }
            }
            (out, filled)
        });

        let mut cells = Array3::from_elem((shape.days, shape.rows, shape.cols), None);
        let mut filled_per_day = Vec::with_capacity(shape.days);
        for (day, (values, filled)) in days.into_iter().enumerate() {
            cells.index_axis_mut(Axis(0), day).assign(&values);
            filled_per_day.push(filled);
        }

        (
            SnowGrid {
                cells,
                area: self.area.clone(),
            },
            filled_per_day,
        )
    }
}

/// Error types for snow-cover gap filling
#[derive(Debug, thiserror::Error)]
pub enum SnowError {
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl SnowError {
    pub(crate) fn shape_mismatch(
        what: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        SnowError::ShapeMismatch {
            what: what.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type for gap-filling operations
pub type SnowResult<T> = Result<T, SnowError>;
