use crate::core::quality::ClassTable;
use crate::types::{is_snow_cover, SnowError, SnowResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Temporal gap-filling method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InterpolationMethod {
    /// Closest valid day in the window, earlier day on ties
    #[default]
    Nearest,
    /// Straight line between the closest valid days either side
    Linear,
    /// Least-squares cubic through every valid day in the window
    Cubic,
}

impl InterpolationMethod {
    pub const ALL: [InterpolationMethod; 3] = [
        InterpolationMethod::Nearest,
        InterpolationMethod::Linear,
        InterpolationMethod::Cubic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InterpolationMethod::Nearest => "nearest",
            InterpolationMethod::Linear => "linear",
            InterpolationMethod::Cubic => "cubic",
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Config files go through the same name parsing as callers do
impl TryFrom<String> for InterpolationMethod {
    type Error = SnowError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<InterpolationMethod> for String {
    fn from(method: InterpolationMethod) -> String {
        method.as_str().to_string()
    }
}

impl FromStr for InterpolationMethod {
    type Err = SnowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(InterpolationMethod::Nearest),
            "linear" => Ok(InterpolationMethod::Linear),
            "cubic" => Ok(InterpolationMethod::Cubic),
            _ => Err(SnowError::InvalidConfig(format!(
                "Invalid interpolation method '{}'. Must be one of: nearest, linear, cubic",
                s
            ))),
        }
    }
}

/// Elevation-aware correction applied after temporal interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SpatialCorrectionMethod {
    /// Snow above mean+std of the day's snow elevations, bare below mean-std
    #[default]
    ElevationMean,
    /// Majority vote of high-altitude 8-neighbours
    NeighborBased,
    None,
}

impl SpatialCorrectionMethod {
    pub const ALL: [SpatialCorrectionMethod; 3] = [
        SpatialCorrectionMethod::ElevationMean,
        SpatialCorrectionMethod::NeighborBased,
        SpatialCorrectionMethod::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SpatialCorrectionMethod::ElevationMean => "elevation_mean",
            SpatialCorrectionMethod::NeighborBased => "neighbor_based",
            SpatialCorrectionMethod::None => "none",
        }
    }
}

impl std::fmt::Display for SpatialCorrectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SpatialCorrectionMethod {
    type Error = SnowError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<SpatialCorrectionMethod> for String {
    fn from(method: SpatialCorrectionMethod) -> String {
        method.as_str().to_string()
    }
}

impl FromStr for SpatialCorrectionMethod {
    type Err = SnowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "elevation_mean" | "old" => Ok(SpatialCorrectionMethod::ElevationMean),
            "neighbor_based" | "new" => Ok(SpatialCorrectionMethod::NeighborBased),
            "none" => Ok(SpatialCorrectionMethod::None),
            _ => Err(SnowError::InvalidConfig(format!(
                "Invalid spatial correction method '{}'. Must be one of: elevation_mean, neighbor_based, none",
                s
            ))),
        }
    }
}

/// Gap-filling run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GapFillConfig {
    pub interpolation_method: InterpolationMethod,
    pub spatial_correction_method: SpatialCorrectionMethod,
    /// Pixels at or below this elevation are never touched by neighbour voting (meters)
    pub altitude_threshold_m: f32,
    /// Value written for pixels corrected to snow
    pub snow_value: f32,
    /// Value written for pixels corrected to bare ground
    pub no_snow_value: f32,
    /// A neighbour counts as snow-covered when its value exceeds this
    pub snow_threshold: f32,
    /// Minimum SnowValid pixels a day needs before its elevation statistic is trusted
    pub min_snow_samples: usize,
    /// Skip elevation-mean correction on days whose high-elevation gap share reaches this
    pub max_high_elevation_gap_ratio: Option<f32>,
    pub class_table: ClassTable,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            interpolation_method: InterpolationMethod::Nearest,
            spatial_correction_method: SpatialCorrectionMethod::ElevationMean,
            altitude_threshold_m: 1000.0,
            snow_value: 100.0,
            no_snow_value: 0.0,
            snow_threshold: 50.0,
            min_snow_samples: 1,
            max_high_elevation_gap_ratio: None,
            class_table: ClassTable::modis_c6(),
        }
    }
}

impl GapFillConfig {
    pub fn new(
        interpolation_method: InterpolationMethod,
        spatial_correction_method: SpatialCorrectionMethod,
    ) -> Self {
        Self {
            interpolation_method,
            spatial_correction_method,
            ..Self::default()
        }
    }

    /// Build from method names as a caller would pass them in
    pub fn from_method_names(interpolation: &str, spatial: &str) -> SnowResult<Self> {
        let config = Self::new(interpolation.parse()?, spatial.parse()?);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SnowResult<()> {
        for (name, value) in [
            ("snow_value", self.snow_value),
            ("no_snow_value", self.no_snow_value),
            ("snow_threshold", self.snow_threshold),
        ] {
            if !is_snow_cover(value) {
                return Err(SnowError::InvalidConfig(format!(
                    "{} must lie within [0, 100], got {}",
                    name, value
                )));
            }
        }

        if !self.altitude_threshold_m.is_finite() {
            return Err(SnowError::InvalidConfig(
                "altitude_threshold_m must be finite".to_string(),
            ));
        }

        if self.min_snow_samples == 0 {
            return Err(SnowError::InvalidConfig(
                "min_snow_samples must be at least 1".to_string(),
            ));
        }

        if let Some(ratio) = self.max_high_elevation_gap_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(SnowError::InvalidConfig(format!(
                    "max_high_elevation_gap_ratio must lie within (0, 1], got {}",
                    ratio
                )));
            }
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> SnowResult<Self> {
        let config: GapFillConfig = serde_json::from_str(json)
            .map_err(|e| SnowError::InvalidConfig(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SnowResult<Self> {
        log::info!("Reading gap-fill configuration from: {}", path.as_ref().display());
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> SnowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
