use crate::core::fusion::SensorObservations;
use crate::types::{ClassCode, SnowError, SnowResult};
use chrono::{Duration, NaiveDate};
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

/// Continuous daily time axis starting at `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTimeAxis {
    start: NaiveDate,
    days: usize,
}

impl DailyTimeAxis {
    pub fn new(start: NaiveDate, days: usize) -> Self {
        Self { start, days }
    }

    /// Axis covering every calendar day from the first to the last acquisition.
    ///
    /// Acquisition dates must be strictly increasing.
    pub fn spanning(dates: &[NaiveDate]) -> SnowResult<Self> {
        let (first, last) = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(SnowError::InvalidInput(
                    "Cannot build a time axis from zero acquisition dates".to_string(),
                ))
            }
        };

        if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(SnowError::InvalidInput(format!(
                "Acquisition dates must be strictly increasing: {} followed by {}",
                pair[0], pair[1]
            )));
        }

        let days = (last - first).num_days() as usize + 1;
        log::debug!("Daily time axis {} to {} ({} days)", first, last, days);
        Ok(Self::new(first, days))
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn date(&self, day: usize) -> Option<NaiveDate> {
        if day >= self.days {
            return None;
        }
        self.start.checked_add_signed(Duration::days(day as i64))
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.start).num_days();
        if offset < 0 || offset as usize >= self.days {
            None
        } else {
            Some(offset as usize)
        }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.days).filter_map(move |day| self.date(day))
    }

    /// Scatter a stack of acquisitions onto this axis.
    ///
    /// `stack` holds one slice per entry of `dates`, which must be strictly
    /// increasing; days with no acquisition are filled with `fill`.
    pub fn align<T: Clone>(&self, dates: &[NaiveDate], stack: &Array3<T>, fill: T) -> SnowResult<Array3<T>> {
        let (slices, rows, cols) = stack.dim();
        if slices != dates.len() {
            return Err(SnowError::shape_mismatch(
                "acquisition stack",
                format!("{} slices", dates.len()),
                format!("{} slices", slices),
            ));
        }

        if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(SnowError::InvalidInput(format!(
                "Acquisition dates must be strictly increasing: {} followed by {}",
                pair[0], pair[1]
            )));
        }

        let mut aligned = Array3::from_elem((self.days, rows, cols), fill);
        for (slice, date) in dates.iter().enumerate() {
            let day = self.index_of(*date).ok_or_else(|| {
                SnowError::InvalidInput(format!(
                    "Acquisition date {} lies outside the time axis starting {}",
                    date, self.start
                ))
            })?;
            aligned
                .index_axis_mut(Axis(0), day)
                .assign(&stack.index_axis(Axis(0), slice));
        }

        let missing = self.days - dates.len().min(self.days);
        if missing > 0 {
            log::debug!("Filled {} days without acquisitions", missing);
        }

        Ok(aligned)
    }

    /// Align both stacks of a sensor; missing days get no-data values and `fill_code`
    pub fn align_sensor(
        &self,
        dates: &[NaiveDate],
        sensor: &SensorObservations,
        fill_code: ClassCode,
    ) -> SnowResult<SensorObservations> {
        SensorObservations::new(
            self.align(dates, &sensor.values, f32::NAN)?,
            self.align(dates, &sensor.classes, fill_code)?,
        )
    }
}
