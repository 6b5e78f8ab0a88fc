//! snowfill: gap filling for daily snow-cover raster time series
//!
//! Two daily observation stacks (a morning and an afternoon pass) are fused,
//! remaining gaps are interpolated over a moving six-day window, and what is
//! still missing is corrected from terrain elevation or neighbouring pixels.

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod types;
pub mod core;
pub mod io;

// Re-export main types and functions for easier access
pub use types::{
    ClassCode, ElevationGrid, GridShape, ObservationStack, SnowCover, SnowError, SnowGrid,
    SnowResult, Verdict,
};

pub use core::{
    ClassCategory, ClassTable, DailyTimeAxis, GapFillConfig, GapFillInputs, GapFillOutput,
    GapFillProcessor, InterpolationMethod, PixelCounts, QualityClassifier, RunStatistics,
    SensorFusion, SensorObservations, SpatialCorrectionMethod, SpatialCorrector,
    StatisticsAggregator, TemporalInterpolator,
};

pub use io::{write_statistics_json, DemReader};

#[cfg(feature = "python")]
mod python {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::Array3;
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::types::PyDict;

    fn to_py_err(e: SnowError) -> PyErr {
        PyErr::new::<PyValueError, _>(format!("{}", e))
    }

    /// Class codes from any integer numpy array, widened to i64
    fn class_codes(array: &PyAny) -> PyResult<Array3<i64>> {
        if let Ok(codes) = array.extract::<PyReadonlyArray3<u8>>() {
            return Ok(codes.as_array().mapv(i64::from));
        }
        if let Ok(codes) = array.extract::<PyReadonlyArray3<i16>>() {
            return Ok(codes.as_array().mapv(i64::from));
        }
        if let Ok(codes) = array.extract::<PyReadonlyArray3<u16>>() {
            return Ok(codes.as_array().mapv(i64::from));
        }
        if let Ok(codes) = array.extract::<PyReadonlyArray3<i32>>() {
            return Ok(codes.as_array().mapv(i64::from));
        }
        if let Ok(codes) = array.extract::<PyReadonlyArray3<i64>>() {
            return Ok(codes.as_array().to_owned());
        }
        Err(PyErr::new::<PyValueError, _>(
            "Class codes must be a 3-D integer array (uint8, int16, uint16, int32 or int64)",
        ))
    }

    /// Python module definition
    #[pymodule]
    fn _snowfill(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(fill_gaps, m)?)?;
        m.add("__version__", env!("CARGO_PKG_VERSION"))?;
        Ok(())
    }

    /// Fill the gaps of a (days, rows, cols) snow-cover stack pair.
    ///
    /// Class arrays may use any common integer dtype; codes outside 0..=255
    /// are invalid. Returns the filled float32 stack, NaN where no value could
    /// be produced, and a dict of the run counters.
    #[pyfunction]
    #[pyo3(signature = (
        primary_values,
        primary_classes,
        secondary_values,
        secondary_classes,
        elevation,
        interpolation = "nearest",
        spatial_correction = "elevation_mean",
        start_date = None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn fill_gaps<'py>(
        py: Python<'py>,
        primary_values: PyReadonlyArray3<f32>,
        primary_classes: &PyAny,
        secondary_values: PyReadonlyArray3<f32>,
        secondary_classes: &PyAny,
        elevation: PyReadonlyArray2<f32>,
        interpolation: &str,
        spatial_correction: &str,
        start_date: Option<&str>,
    ) -> PyResult<(&'py PyArray3<f32>, &'py PyDict)> {
        let config =
            GapFillConfig::from_method_names(interpolation, spatial_correction).map_err(to_py_err)?;
        let processor = GapFillProcessor::new(config).map_err(to_py_err)?;

        let primary = SensorObservations::from_wide_codes(
            primary_values.as_array().to_owned(),
            &class_codes(primary_classes)?,
            processor.classifier(),
        )
        .map_err(to_py_err)?;
        let secondary = SensorObservations::from_wide_codes(
            secondary_values.as_array().to_owned(),
            &class_codes(secondary_classes)?,
            processor.classifier(),
        )
        .map_err(to_py_err)?;
        let elevation = elevation.as_array().to_owned();
        let study_area = DemReader::study_area_mask(&elevation);

        let mut inputs =
            GapFillInputs::new(primary, secondary, elevation).with_study_area(study_area);
        if let Some(start) = start_date {
            let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").map_err(|e| {
                PyErr::new::<PyValueError, _>(format!("Invalid start date '{}': {}", start, e))
            })?;
            let days = inputs.shape().days;
            inputs = inputs.with_time_axis(DailyTimeAxis::new(start, days));
        }

        let output = py
            .allow_threads(|| processor.process(&inputs))
            .map_err(to_py_err)?;

        let totals = output.statistics.totals();
        let counters = PyDict::new(py);
        counters.set_item("total", totals.total)?;
        counters.set_item("primary_sourced", totals.primary_sourced)?;
        counters.set_item("secondary_sourced", totals.secondary_sourced)?;
        counters.set_item("unresolved_after_fusion", totals.unresolved_after_fusion)?;
        counters.set_item("interpolated", totals.interpolated)?;
        counters.set_item("remaining_after_temporal", totals.remaining_after_temporal)?;
        counters.set_item("spatially_corrected", totals.spatially_corrected)?;
        counters.set_item("final_remaining", totals.final_remaining)?;

        let filled = output.grid.to_array(f32::NAN).into_pyarray(py);
        Ok((filled, counters))
    }
}
