use std::collections::HashSet;

use crate::constants::{
    LAST_REVIEW_COLUMN, LATITUDE_COLUMN, LONGITUDE_COLUMN, PRICE_COLUMN, REQUIRED_COLUMNS,
};
use crate::dataset::Table;
use crate::error::{CleaningError, Result};

/// Positions of the columns the cleaning stages read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    pub price: usize,
    pub last_review: usize,
    pub longitude: Option<usize>,
    pub latitude: Option<usize>,
}

impl DatasetSchema {
    /// Both coordinate columns are present, so the bounding box applies.
    pub fn has_coordinates(&self) -> bool {
        self.longitude.is_some() && self.latitude.is_some()
    }
}

/// Check that `price` and `last_review` exist and locate the optional
/// coordinate columns. Every missing required column is reported at once.
pub fn validate_schema(table: &Table) -> Result<DatasetSchema> {
    let mut seen = HashSet::new();
    for column in &table.columns {
        if !seen.insert(column.as_str()) {
            return Err(CleaningError::DuplicateColumn(column.clone()));
        }
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !table.has_column(name))
        .map(|name| name.to_string())
        .collect();

    match (
        table.column_index(PRICE_COLUMN),
        table.column_index(LAST_REVIEW_COLUMN),
    ) {
        (Some(price), Some(last_review)) => Ok(DatasetSchema {
            price,
            last_review,
            longitude: table.column_index(LONGITUDE_COLUMN),
            latitude: table.column_index(LATITUDE_COLUMN),
        }),
        _ => Err(CleaningError::Schema { missing }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str]) -> Table {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    #[test]
    fn locates_required_and_optional_columns() {
        let schema =
            validate_schema(&table(&["id", "latitude", "longitude", "price", "last_review"]))
                .unwrap();
        assert_eq!(schema.price, 3);
        assert_eq!(schema.last_review, 4);
        assert_eq!(schema.latitude, Some(1));
        assert_eq!(schema.longitude, Some(2));
        assert!(schema.has_coordinates());
    }

    #[test]
    fn coordinates_are_optional() {
        let schema = validate_schema(&table(&["price", "last_review", "latitude"])).unwrap();
        assert!(!schema.has_coordinates());
    }

    #[test]
    fn reports_missing_price() {
        let err = validate_schema(&table(&["id", "last_review"])).unwrap_err();
        match err {
            CleaningError::Schema { missing } => assert_eq!(missing, vec!["price"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_both_missing_columns() {
        let err = validate_schema(&table(&["id", "name"])).unwrap_err();
        match err {
            CleaningError::Schema { missing } => {
                assert_eq!(missing, vec!["price", "last_review"])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_duplicate_headers() {
        let err = validate_schema(&table(&["price", "price", "last_review"])).unwrap_err();
        assert!(matches!(err, CleaningError::DuplicateColumn(c) if c == "price"));
    }
}
