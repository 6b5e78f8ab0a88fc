use crate::types::ElevationGrid;
use ndarray::Array2;

#[cfg(feature = "gdal")]
use crate::types::{ClassStack, ObservationStack, SnowError, SnowResult};
#[cfg(feature = "gdal")]
use gdal::Dataset;
#[cfg(feature = "gdal")]
use ndarray::Array3;
#[cfg(feature = "gdal")]
use std::path::Path;

/// Elevation model and raster stack reader
pub struct DemReader;

impl DemReader {
    /// Pixels with a finite elevation form the study area
    pub fn study_area_mask(elevation: &ElevationGrid) -> Array2<bool> {
        let mask = elevation.mapv(f32::is_finite);

        let outside = mask.iter().filter(|inside| !**inside).count();
        if outside > 0 {
            log::info!(
                "Excluded {} of {} pixels without elevation from the study area",
                outside,
                mask.len()
            );
        }

        mask
    }

    /// Read the first band of an elevation raster; no-data becomes NaN
    #[cfg(feature = "gdal")]
    pub fn read_elevation<P: AsRef<Path>>(dem_path: P) -> SnowResult<ElevationGrid> {
        log::info!("Reading DEM from: {}", dem_path.as_ref().display());

        let dataset = Dataset::open(dem_path.as_ref())?;
        let (width, height) = dataset.raster_size();
        log::debug!("DEM size: {}x{}", width, height);

        let rasterband = dataset.rasterband(1)?;
        let no_data = rasterband.no_data_value();
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        let mut dem = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| SnowError::InvalidInput(format!("Failed to reshape DEM data: {}", e)))?;
        if let Some(no_data) = no_data {
            dem.mapv_inplace(|z| if z as f64 == no_data { f32::NAN } else { z });
        }

        Ok(dem)
    }

    /// Read every band of a raster as one day of snow-cover values
    #[cfg(feature = "gdal")]
    pub fn read_band_stack<P: AsRef<Path>>(path: P) -> SnowResult<ObservationStack> {
        let (mut stack, no_data) = Self::read_stack::<f32, _>(path.as_ref())?;
        if let Some(no_data) = no_data {
            stack.mapv_inplace(|v| if v as f64 == no_data { f32::NAN } else { v });
        }
        Ok(stack)
    }

    /// Read every band of a raster as one day of quality class codes
    #[cfg(feature = "gdal")]
    pub fn read_class_stack<P: AsRef<Path>>(path: P) -> SnowResult<ClassStack> {
        Self::read_stack::<u8, _>(path.as_ref()).map(|(stack, _)| stack)
    }

    #[cfg(feature = "gdal")]
    fn read_stack<T, P>(path: P) -> SnowResult<(Array3<T>, Option<f64>)>
    where
        T: gdal::raster::GdalType + Copy,
        P: AsRef<Path>,
    {
        log::info!("Reading raster stack from: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let bands = dataset.raster_count().max(0) as usize;
        if bands == 0 {
            return Err(SnowError::InvalidInput(format!(
                "Raster {} has no bands",
                path.as_ref().display()
            )));
        }
        log::debug!("Raster stack: {} bands of {}x{}", bands, width, height);

        let mut data = Vec::with_capacity(bands * width * height);
        let mut no_data = None;
        for band in 1..=bands {
            let rasterband = dataset.rasterband(band as isize)?;
            if band == 1 {
                no_data = rasterband.no_data_value();
            }
            let buffer = rasterband.read_as::<T>((0, 0), (width, height), (width, height), None)?;
            data.extend_from_slice(&buffer.data);
        }

        let stack = Array3::from_shape_vec((bands, height, width), data)
            .map_err(|e| SnowError::InvalidInput(format!("Failed to reshape raster stack: {}", e)))?;
        Ok((stack, no_data))
    }
}
