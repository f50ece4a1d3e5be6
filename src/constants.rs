/// Column names the cleaning step understands.
pub const PRICE_COLUMN: &str = "price";
pub const LAST_REVIEW_COLUMN: &str = "last_review";
pub const LONGITUDE_COLUMN: &str = "longitude";
pub const LATITUDE_COLUMN: &str = "latitude";

/// Columns the schema validator insists on, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 2] = [PRICE_COLUMN, LAST_REVIEW_COLUMN];

// New York City bounding box
pub const NYC_MIN_LONGITUDE: f64 = -74.25;
pub const NYC_MAX_LONGITUDE: f64 = -73.50;
pub const NYC_MIN_LATITUDE: f64 = 40.5;
pub const NYC_MAX_LATITUDE: f64 = 41.2;

/// Job type recorded on every run session opened by this step.
pub const JOB_TYPE: &str = "basic_cleaning";

/// Version tag that resolves to the newest version of an artifact.
pub const LATEST_TAG: &str = "latest";

/// Cell values read as missing, mirroring the usual CSV reader defaults.
pub const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "NaT", "n/a", "nan", "null",
];

/// Default settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "basic_cleaning.toml";
pub const SETTINGS_ENV: &str = "BASIC_CLEANING_SETTINGS";
pub const REGISTRY_ENV: &str = "BASIC_CLEANING_REGISTRY";

pub const DEFAULT_REGISTRY_ROOT: &str = "artifacts";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Whether a raw cell should be treated as a missing value.
pub fn is_null_token(cell: &str) -> bool {
    NULL_TOKENS.contains(&cell.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_common_missing_markers() {
        assert!(is_null_token(""));
        assert!(is_null_token("  NaN "));
        assert!(is_null_token("NULL"));
        assert!(!is_null_token("0"));
        assert!(!is_null_token("2019-05-21"));
    }
}
