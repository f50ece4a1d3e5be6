use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{NYC_MAX_LATITUDE, NYC_MAX_LONGITUDE, NYC_MIN_LATITUDE, NYC_MIN_LONGITUDE};
use crate::dataset::Dataset;
use crate::error::{CleaningError, Result};

/// Inclusive longitude/latitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub min_latitude: f64,
    pub max_latitude: f64,
}

pub const NYC_BOUNDING_BOX: BoundingBox = BoundingBox {
    min_longitude: NYC_MIN_LONGITUDE,
    max_longitude: NYC_MAX_LONGITUDE,
    min_latitude: NYC_MIN_LATITUDE,
    max_latitude: NYC_MAX_LATITUDE,
};

impl Default for BoundingBox {
    fn default() -> Self {
        NYC_BOUNDING_BOX
    }
}

impl BoundingBox {
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.min_longitude..=self.max_longitude).contains(&longitude)
            && (self.min_latitude..=self.max_latitude).contains(&latitude)
    }

    /// Reject boxes that could never hold a point.
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.min_longitude,
            self.max_longitude,
            self.min_latitude,
            self.max_latitude,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CleaningError::Config(
                "bounding box coordinates must be finite numbers".to_string(),
            ));
        }
        if self.min_longitude > self.max_longitude || self.min_latitude > self.max_latitude {
            return Err(CleaningError::Config(format!(
                "bounding box is inverted: longitude [{}, {}], latitude [{}, {}]",
                self.min_longitude, self.max_longitude, self.min_latitude, self.max_latitude
            )));
        }
        Ok(())
    }
}

/// Restrict records to `bbox`. Returns `None` when the dataset lacks either
/// coordinate column, in which case nothing is filtered.
pub fn filter_geo(dataset: &Dataset, bbox: &BoundingBox) -> Option<Dataset> {
    if !dataset.schema().has_coordinates() {
        debug!("longitude/latitude not both present; skipping bounding box filter");
        return None;
    }
    Some(dataset.filter(|record| match (record.longitude, record.latitude) {
        (Some(lon), Some(lat)) => bbox.contains(lon, lat),
        _ => false,
    }))
}
