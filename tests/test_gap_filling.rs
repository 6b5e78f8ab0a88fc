use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use ndarray::{Array2, Array3};
use snowfill::core::{
    GapFillConfig, GapFillInputs, GapFillProcessor, InterpolationMethod, PixelCounts, SensorFusion,
    SensorObservations, SpatialCorrectionMethod,
};
use snowfill::io::DemReader;
use snowfill::types::{GridShape, SnowError};
use snowfill::DailyTimeAxis;

const ND: f32 = f32::NAN;
const CLOUD: u8 = 250;
const FILL: u8 = 255;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sensor whose MODIS class codes follow its values: NaN is cloud, 0 is land
fn sensor(values: Array3<f32>) -> SensorObservations {
    let classes = values.mapv(|v| {
        if v.is_nan() {
            CLOUD
        } else if v > 0.0 {
            v.round() as u8
        } else {
            0
        }
    });
    SensorObservations::new(values, classes).expect("matching shapes")
}

fn series(values: &[f32]) -> SensorObservations {
    sensor(Array3::from_shape_vec((values.len(), 1, 1), values.to_vec()).unwrap())
}

fn processor(interpolation: InterpolationMethod, spatial: SpatialCorrectionMethod) -> GapFillProcessor {
    GapFillProcessor::new(GapFillConfig::new(interpolation, spatial)).expect("valid config")
}

/// Deterministic cloudy stack for property checks
fn cloudy_stack(shape: GridShape, seed: u64, cloud_percent: u64) -> Array3<f32> {
    let mut state = seed;
    Array3::from_shape_fn((shape.days, shape.rows, shape.cols), |_| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let draw = (state >> 33) % 100;
        if draw < cloud_percent {
            ND
        } else {
            ((state >> 17) % 101) as f32
        }
    })
}

fn elevation_ramp(rows: usize, cols: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| 600.0 + 180.0 * (r * cols + c) as f32)
}

#[test]
fn test_fusion_prefers_primary() {
    init_logging();

    let primary = series(&[70.0, ND, ND]);
    let mut secondary = series(&[20.0, 40.0, ND]);
    secondary.classes[[2, 0, 0]] = FILL;

    let (fused, counts) = SensorFusion::default()
        .fuse(&primary, &secondary, None)
        .expect("fusion succeeds");

    assert_eq!(fused.grid().get(0, 0, 0), Some(70.0));
    assert_eq!(fused.grid().get(1, 0, 0), Some(40.0));
    assert_eq!(fused.grid().get(2, 0, 0), None);
    assert_eq!(counts[0].primary_sourced, 1);
    assert_eq!(counts[1].secondary_sourced, 1);
    assert_eq!(counts[2].unresolved_after_fusion, 1);
}

#[test]
fn test_invalid_class_code_discards_value() {
    init_logging();

    // A plausible value carrying a cloud code is not an observation
    let mut primary = series(&[55.0, 60.0]);
    primary.classes[[0, 0, 0]] = CLOUD;
    let secondary = SensorObservations::unavailable(primary.shape(), FILL);

    let (fused, _) = SensorFusion::default()
        .fuse(&primary, &secondary, None)
        .expect("fusion succeeds");
    assert_eq!(fused.grid().get(0, 0, 0), None);
    assert_eq!(fused.grid().get(1, 0, 0), Some(60.0));
}

#[test]
fn test_linear_end_to_end() {
    init_logging();

    let primary = series(&[ND, 20.0, ND, ND, 80.0, ND]);
    let secondary = SensorObservations::unavailable(primary.shape(), FILL);
    let inputs = GapFillInputs::new(primary, secondary, Array2::from_elem((1, 1), 1500.0));

    let output = processor(InterpolationMethod::Linear, SpatialCorrectionMethod::None)
        .process(&inputs)
        .expect("run succeeds");

    let filled = output.grid.to_array(ND);
    let expected = [20.0, 20.0, 40.0, 60.0, 80.0, 80.0];
    for (day, value) in expected.iter().enumerate() {
        assert_abs_diff_eq!(filled[[day, 0, 0]], *value, epsilon = 1e-4);
    }
    assert_eq!(output.statistics.interpolated(), 4);
    assert_eq!(output.statistics.final_remaining(), 0);
}

#[test]
fn test_cubic_with_two_points_matches_linear() {
    init_logging();

    let primary = series(&[10.0, ND, ND, ND, ND, 60.0]);
    let secondary = SensorObservations::unavailable(primary.shape(), FILL);
    let inputs = GapFillInputs::new(primary, secondary, Array2::from_elem((1, 1), 1500.0));

    let output = processor(InterpolationMethod::Cubic, SpatialCorrectionMethod::None)
        .process(&inputs)
        .expect("run succeeds");

    // Day 3 sees 10 at -3 and 60 at +2
    assert_abs_diff_eq!(output.grid.get(3, 0, 0).unwrap(), 40.0, epsilon = 1e-4);
}

#[test]
fn test_nearest_tie_takes_past_day() {
    init_logging();

    let primary = series(&[ND, 30.0, ND, 70.0, ND]);
    let secondary = SensorObservations::unavailable(primary.shape(), FILL);
    let inputs = GapFillInputs::new(primary, secondary, Array2::from_elem((1, 1), 1500.0));

    let output = processor(InterpolationMethod::Nearest, SpatialCorrectionMethod::None)
        .process(&inputs)
        .expect("run succeeds");

    assert_eq!(output.grid.get(2, 0, 0), Some(30.0));
    assert_eq!(output.grid.get(4, 0, 0), Some(70.0));
}

#[test]
fn test_gap_without_evidence_stays_unresolved() {
    init_logging();

    let primary = series(&[50.0, ND, ND, ND, ND, ND, ND, ND]);
    let secondary = SensorObservations::unavailable(primary.shape(), FILL);
    let inputs = GapFillInputs::new(primary, secondary, Array2::from_elem((1, 1), 1500.0));

    let output = processor(InterpolationMethod::Cubic, SpatialCorrectionMethod::ElevationMean)
        .process(&inputs)
        .expect("run succeeds");

    // Days 4+ have no valid day within -3..+2 and no snow evidence on their own day
    for day in 4..8 {
        assert_eq!(output.grid.get(day, 0, 0), None, "day {}", day);
    }
    assert_eq!(output.statistics.final_remaining(), 4);
}

#[test]
fn test_all_methods_keep_range_and_resolved_values() {
    init_logging();

    let shape = GridShape::new(12, 5, 5);
    let primary = sensor(cloudy_stack(shape, 7, 55));
    let secondary = sensor(cloudy_stack(shape, 11, 70));
    let elevation = elevation_ramp(shape.rows, shape.cols);

    let (fused, _) = SensorFusion::default()
        .fuse(&primary, &secondary, None)
        .expect("fusion succeeds");
    let inputs = GapFillInputs::new(primary, secondary, elevation);

    for interpolation in InterpolationMethod::ALL {
        for spatial in SpatialCorrectionMethod::ALL {
            let output = processor(interpolation, spatial)
                .process(&inputs)
                .expect("run succeeds");
            let totals = output.statistics.totals();

            println!(
                "{} / {}: {} interpolated, {} corrected, {} remaining",
                interpolation, spatial, totals.interpolated, totals.spatially_corrected, totals.final_remaining
            );

            for ((day, row, col), cell) in output.grid.cells().indexed_iter() {
                if let Some(value) = cell {
                    assert!((0.0..=100.0).contains(value), "{} out of range", value);
                }
                if let Some(observed) = fused.grid().get(day, row, col) {
                    assert_eq!(*cell, Some(observed), "resolved value changed at {:?}", (day, row, col));
                }
            }

            assert!(totals.is_consistent(), "{:?}", totals);
            assert!(totals.unresolved_after_fusion >= totals.remaining_after_temporal);
            assert!(totals.remaining_after_temporal >= totals.final_remaining);
            assert_eq!(totals.final_remaining, output.grid.gap_count());
        }
    }
}

#[test]
fn test_daily_counts_sum_to_totals() {
    init_logging();

    let shape = GridShape::new(9, 4, 3);
    let primary = sensor(cloudy_stack(shape, 3, 60));
    let secondary = sensor(cloudy_stack(shape, 5, 60));
    let start = NaiveDate::from_ymd_opt(2019, 12, 30).unwrap();
    let inputs = GapFillInputs::new(primary, secondary, elevation_ramp(shape.rows, shape.cols))
        .with_time_axis(DailyTimeAxis::new(start, shape.days));

    let output = processor(InterpolationMethod::Linear, SpatialCorrectionMethod::NeighborBased)
        .process(&inputs)
        .expect("run succeeds");
    let statistics = &output.statistics;

    let summed: PixelCounts = statistics.daily().iter().map(|d| d.counts).sum();
    assert_eq!(*statistics.totals(), summed);
    assert_eq!(statistics.total_pixel_days(), shape.pixel_days());
    for daily in statistics.daily() {
        assert_eq!(daily.counts.total, shape.pixels());
        assert!(daily.counts.is_consistent());
    }
    assert_eq!(statistics.daily()[2].date, NaiveDate::from_ymd_opt(2020, 1, 1));
}

#[test]
fn test_study_area_from_elevation_excludes_pixels() {
    init_logging();

    let primary = sensor(Array3::from_elem((3, 1, 2), ND));
    let secondary = SensorObservations::unavailable(primary.shape(), FILL);
    let elevation = ndarray::array![[1800.0, ND]];
    let area = DemReader::study_area_mask(&elevation);
    let inputs = GapFillInputs::new(primary, secondary, elevation).with_study_area(area);

    let output = processor(InterpolationMethod::Nearest, SpatialCorrectionMethod::ElevationMean)
        .process(&inputs)
        .expect("run succeeds");

    assert_eq!(output.statistics.total_pixel_days(), 3);
    assert!(!output.grid.in_area(0, 1));
    assert!(output.grid.to_array(-1.0)[[0, 0, 1]] == -1.0);
}

#[test]
fn test_nan_elevation_inside_area_rejected() {
    init_logging();

    let primary = series(&[10.0, 20.0]);
    let secondary = SensorObservations::unavailable(primary.shape(), FILL);
    let inputs = GapFillInputs::new(primary, secondary, Array2::from_elem((1, 1), ND));

    let result = processor(InterpolationMethod::Nearest, SpatialCorrectionMethod::None).process(&inputs);
    assert!(matches!(result, Err(SnowError::InvalidInput(_))));
}

#[test]
fn test_sensor_shape_mismatch_rejected() {
    init_logging();

    let primary = series(&[10.0, 20.0, 30.0]);
    let secondary = SensorObservations::unavailable(GridShape::new(2, 1, 1), FILL);
    let inputs = GapFillInputs::new(primary, secondary, Array2::from_elem((1, 1), 900.0));

    let result = processor(InterpolationMethod::Nearest, SpatialCorrectionMethod::None).process(&inputs);
    match result {
        Err(SnowError::ShapeMismatch { what, .. }) => assert_eq!(what, "secondary observations"),
        other => panic!("expected shape mismatch, got {:?}", other.map(|o| o.statistics)),
    }
}

#[test]
fn test_method_names_from_config() {
    let config = GapFillConfig::from_method_names("cubic", "new").expect("known names");
    assert_eq!(config.interpolation_method, InterpolationMethod::Cubic);
    assert_eq!(config.spatial_correction_method, SpatialCorrectionMethod::NeighborBased);

    assert!(matches!(
        GapFillConfig::from_method_names("spline", "old"),
        Err(SnowError::InvalidConfig(_))
    ));

    let config = GapFillConfig::from_json_str(
        r#"{ "interpolation_method": "linear", "spatial_correction_method": "none" }"#,
    )
    .expect("valid json config");
    assert!(GapFillProcessor::new(config).is_ok());
}
