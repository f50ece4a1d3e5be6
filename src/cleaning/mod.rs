//! The cleaning stages and the pipeline that runs them in order:
//! schema validation, price range, date normalization, bounding box.

pub mod dates;
pub mod geo;
pub mod price;
pub mod schema;

use serde::Serialize;
use tracing::{info, info_span};

use crate::dataset::{Dataset, Table};
use crate::error::Result;
use crate::metrics::{time_stage, CleaningMetrics};
use crate::run_state::{RunState, RunTracker};

use dates::{normalize_dates, DatePolicy, DateStats};
use geo::{filter_geo, BoundingBox};
use price::{filter_price, PriceRange};
use schema::validate_schema;

/// Parameters of the cleaning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningOptions {
    pub price_range: PriceRange,
    pub date_policy: DatePolicy,
    pub bounding_box: BoundingBox,
}

impl CleaningOptions {
    pub fn new(price_range: PriceRange) -> Self {
        Self {
            price_range,
            date_policy: DatePolicy::default(),
            bounding_box: BoundingBox::default(),
        }
    }
}

/// Row counts after each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningSummary {
    pub input_rows: usize,
    pub after_price: usize,
    pub output_rows: usize,
    pub geo_applied: bool,
    pub dates_normalized: usize,
    pub dates_missing: usize,
    pub dates_coerced: usize,
}

#[derive(Debug, Clone)]
pub struct CleaningOutput {
    pub dataset: Dataset,
    pub summary: CleaningSummary,
}

pub struct CleaningPipeline {
    options: CleaningOptions,
}

impl CleaningPipeline {
    pub fn new(options: CleaningOptions) -> Self {
        Self { options }
    }

    /// Clean a snapshot that is already in memory.
    pub fn clean(&self, table: Table) -> Result<CleaningOutput> {
        let mut tracker = RunTracker::new();
        tracker.advance(RunState::Fetching)?;
        self.clean_tracked(table, &mut tracker)
    }

    /// Clean `table`, reporting each stage to `tracker`. The tracker must be in
    /// `Fetching`; on success it is left in `GeoFiltering`.
    pub fn clean_tracked(&self, table: Table, tracker: &mut RunTracker) -> Result<CleaningOutput> {
        let input_rows = table.rows.len();
        CleaningMetrics::record_input_rows(input_rows);

        tracker.advance(RunState::Validating)?;
        let dataset = {
            let _span = info_span!("validate", rows = input_rows).entered();
            let _timing = time_stage(RunState::Validating);
            let schema = validate_schema(&table)?;
            Dataset::from_table(table, schema)
        };

        tracker.advance(RunState::PriceFiltering)?;
        let dataset = {
            let range = self.options.price_range;
            let _span = info_span!("price_filter", min_price = range.min, max_price = range.max)
                .entered();
            let _timing = time_stage(RunState::PriceFiltering);
            filter_price(&dataset, range)
        };
        let after_price = dataset.len();
        CleaningMetrics::record_retained(RunState::PriceFiltering, after_price);
        info!(
            retained = after_price,
            dropped = input_rows - after_price,
            "price range filter applied"
        );

        tracker.advance(RunState::DateNormalizing)?;
        let (dataset, date_stats) = {
            let _span = info_span!("normalize_dates", policy = ?self.options.date_policy).entered();
            let _timing = time_stage(RunState::DateNormalizing);
            normalize_dates(&dataset, self.options.date_policy)?
        };
        if date_stats.coerced > 0 {
            CleaningMetrics::record_dates_coerced(date_stats.coerced);
        }

        tracker.advance(RunState::GeoFiltering)?;
        let (dataset, geo_applied) = {
            let _span = info_span!("geo_filter").entered();
            let _timing = time_stage(RunState::GeoFiltering);
            match filter_geo(&dataset, &self.options.bounding_box) {
                Some(filtered) => (filtered, true),
                None => (dataset, false),
            }
        };
        CleaningMetrics::record_retained(RunState::GeoFiltering, dataset.len());

        let summary = summarize(input_rows, after_price, &dataset, geo_applied, date_stats);
        info!(
            input_rows = summary.input_rows,
            after_price = summary.after_price,
            output_rows = summary.output_rows,
            geo_applied = summary.geo_applied,
            "cleaning finished"
        );
        Ok(CleaningOutput { dataset, summary })
    }
}

fn summarize(
    input_rows: usize,
    after_price: usize,
    dataset: &Dataset,
    geo_applied: bool,
    dates: DateStats,
) -> CleaningSummary {
    CleaningSummary {
        input_rows,
        after_price,
        output_rows: dataset.len(),
        geo_applied,
        dates_normalized: dates.normalized,
        dates_missing: dates.missing,
        dates_coerced: dates.coerced,
    }
}
