//! Temperature readings submitted with a completion and their range check.

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub equipment_ref: String,
    pub recorded_temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
}

impl Reading {
    /// Bounds are inclusive.
    pub fn in_range(&self) -> bool {
        self.recorded_temp >= self.temp_min && self.recorded_temp <= self.temp_max
    }

    fn validate(&self) -> Result<(), String> {
        if self.equipment_ref.trim().is_empty() {
            return Err("equipment_ref is required".into());
        }
        if !(self.recorded_temp.is_finite() && self.temp_min.is_finite() && self.temp_max.is_finite()) {
            return Err(format!("reading for {} is not a finite number", self.equipment_ref));
        }
        if self.temp_min > self.temp_max {
            return Err(format!(
                "reading for {} has temp_min {} above temp_max {}",
                self.equipment_ref, self.temp_min, self.temp_max
            ));
        }
        Ok(())
    }
}

/// A reading that violated its thresholds, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingBreach {
    pub equipment_ref: String,
    pub recorded_temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Distance outside the nearest bound; positive means too warm.
    pub deviation: f64,
}

impl From<&Reading> for ReadingBreach {
    fn from(r: &Reading) -> Self {
        let deviation = if r.recorded_temp > r.temp_max {
            r.recorded_temp - r.temp_max
        } else {
            r.recorded_temp - r.temp_min
        };
        Self {
            equipment_ref: r.equipment_ref.clone(),
            recorded_temp: r.recorded_temp,
            temp_min: r.temp_min,
            temp_max: r.temp_max,
            deviation,
        }
    }
}

/// Validates every reading, then collects the ones outside their range in
/// request order. Malformed input wins over range violations.
pub fn find_breaches(readings: &[Reading]) -> ServiceResult<Vec<ReadingBreach>> {
    for r in readings {
        r.validate().map_err(ServiceError::Validation)?;
    }
    Ok(readings.iter().filter(|r| !r.in_range()).map(ReadingBreach::from).collect())
}

/// Passes only when every reading is well-formed and within range.
pub fn evaluate(readings: &[Reading]) -> ServiceResult<()> {
    let breaches = find_breaches(readings)?;
    if breaches.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::OutOfRange(breaches))
    }
}
