use tracing::warn;

use crate::dataset::Dataset;

/// Inclusive price window. `min > max` is allowed and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_inverted(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min <= price && price <= self.max
    }
}

/// Keep records whose price lies in `[min_price, max_price]`. Records with no
/// usable price are dropped.
pub fn filter_price(dataset: &Dataset, range: PriceRange) -> Dataset {
    if range.is_inverted() {
        warn!(
            min_price = range.min,
            max_price = range.max,
            "min_price is greater than max_price; no record can match"
        );
    }
    dataset.filter(|record| record.price.is_some_and(|p| range.contains(p)))
}
