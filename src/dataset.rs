//! In-memory tabular data for a single cleaning run.
//!
//! A [`Table`] is the raw CSV snapshot exactly as fetched. Once the schema
//! validator has located the columns the step relies on, the table is typed
//! into a [`Dataset`]: numeric columns are parsed once here, and every filter
//! afterwards works on typed [`Record`]s while the original cells ride along
//! untouched for serialization.

use chrono::{NaiveDateTime, Timelike};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::cleaning::schema::DatasetSchema;
use crate::constants::is_null_token;
use crate::error::{CleaningError, Result};

/// Raw CSV contents: header plus string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            CleaningError::Registry(format!("cannot open snapshot {}: {}", path.display(), e))
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }
}

/// State of the `last_review` cell of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDate {
    Missing,
    /// Not yet normalized; holds the cell as read.
    Raw(String),
    Normalized(NaiveDateTime),
}

impl ReviewDate {
    fn from_cell(cell: &str) -> Self {
        if is_null_token(cell) {
            ReviewDate::Missing
        } else {
            ReviewDate::Raw(cell.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based data row number in the input snapshot.
    pub row: usize,
    pub cells: Vec<String>,
    pub price: Option<f64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub last_review: ReviewDate,
}

/// Schema-checked, typed dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    schema: DatasetSchema,
    records: Vec<Record>,
}

/// Parse a numeric cell; missing markers and non-numeric text yield `None`.
pub fn parse_number(cell: &str) -> Option<f64> {
    if is_null_token(cell) {
        return None;
    }
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

impl Dataset {
    pub fn from_table(table: Table, schema: DatasetSchema) -> Self {
        let Table { columns, rows } = table;
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| {
                let get = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");
                Record {
                    row: i + 1,
                    price: parse_number(get(schema.price)),
                    longitude: schema.longitude.and_then(|idx| parse_number(get(idx))),
                    latitude: schema.latitude.and_then(|idx| parse_number(get(idx))),
                    last_review: ReviewDate::from_cell(get(schema.last_review)),
                    cells,
                }
            })
            .collect();
        Self {
            columns,
            schema,
            records,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// New dataset holding the records that satisfy `keep`, in their original order.
    pub fn filter<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            schema: self.schema.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    pub(crate) fn with_records(&self, records: Vec<Record>) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            schema: self.schema.clone(),
            records,
        }
    }

    /// Write the canonical CSV encoding: header row, original column order,
    /// no index column, `\n` line endings.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        wtr.write_record(&self.columns)?;

        let style = DateStyle::for_records(&self.records);
        let review_idx = self.schema.last_review;
        for record in &self.records {
            let rendered = style.render(&record.last_review);
            let row = record.cells.iter().enumerate().map(|(idx, cell)| {
                if idx == review_idx {
                    rendered.as_str()
                } else {
                    cell.as_str()
                }
            });
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(buf)
    }
}

/// How normalized dates render: date only when every value falls on
/// midnight, full timestamps otherwise, with as many fractional digits as the
/// most precise value needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateStyle {
    DateOnly,
    Seconds,
    Micros,
    Nanos,
}

impl DateStyle {
    fn for_records(records: &[Record]) -> Self {
        let mut style = DateStyle::DateOnly;
        for record in records {
            if let ReviewDate::Normalized(dt) = &record.last_review {
                let nanos = dt.nanosecond();
                if nanos % 1_000 != 0 {
                    return DateStyle::Nanos;
                }
                if nanos != 0 {
                    style = DateStyle::Micros;
                } else if dt.num_seconds_from_midnight() != 0 && style == DateStyle::DateOnly {
                    style = DateStyle::Seconds;
                }
            }
        }
        style
    }

    fn render(self, value: &ReviewDate) -> String {
        match value {
            ReviewDate::Missing => String::new(),
            ReviewDate::Raw(raw) => raw.clone(),
            ReviewDate::Normalized(dt) => match self {
                DateStyle::DateOnly => dt.format("%Y-%m-%d").to_string(),
                DateStyle::Seconds => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
                DateStyle::Micros => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                DateStyle::Nanos => dt.format("%Y-%m-%d %H:%M:%S%.9f").to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::schema::validate_schema;
    use chrono::NaiveDate;

    fn dataset(csv: &str) -> Dataset {
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        let schema = validate_schema(&table).unwrap();
        Dataset::from_table(table, schema)
    }

    #[test]
    fn types_numeric_columns_once() {
        let ds = dataset("id,price,last_review\n1,150,2019-05-21\n2,abc,\n3, 42.5 ,NaN\n");
        let prices: Vec<Option<f64>> = ds.records().iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![Some(150.0), None, Some(42.5)]);
        assert_eq!(ds.records()[1].last_review, ReviewDate::Missing);
        assert_eq!(ds.records()[2].last_review, ReviewDate::Missing);
        assert_eq!(ds.records()[2].row, 3);
    }

    #[test]
    fn coordinates_stay_empty_without_columns() {
        let ds = dataset("price,last_review\n10,\n");
        assert_eq!(ds.records()[0].longitude, None);
        assert!(ds.schema().longitude.is_none());
    }

    #[test]
    fn writes_original_cells_and_renders_dates() {
        let ds = dataset("name,price,last_review\n\"Loft, Soho\",150,2019-05-21\nStudio,80,\n");
        let mut records = ds.records().to_vec();
        records[0].last_review = ReviewDate::Normalized(
            NaiveDate::from_ymd_opt(2019, 5, 21).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        );
        let out = ds.with_records(records).to_csv_bytes().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name,price,last_review\n\"Loft, Soho\",150,2019-05-21\nStudio,80,\n"
        );
    }

    #[test]
    fn any_time_component_switches_to_full_timestamps() {
        let ds = dataset("price,last_review\n1,a\n2,b\n");
        let day = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let mut records = ds.records().to_vec();
        records[0].last_review = ReviewDate::Normalized(day.and_hms_opt(0, 0, 0).unwrap());
        records[1].last_review = ReviewDate::Normalized(day.and_hms_opt(13, 5, 9).unwrap());
        let out = String::from_utf8(ds.with_records(records).to_csv_bytes().unwrap()).unwrap();
        assert_eq!(
            out,
            "price,last_review\n1,2020-01-02 00:00:00\n2,2020-01-02 13:05:09\n"
        );
    }

    #[test]
    fn fractional_seconds_keep_their_precision() {
        let ds = dataset("price,last_review\n1,a\n2,b\n");
        let day = NaiveDate::from_ymd_opt(2019, 5, 21).unwrap();
        let mut records = ds.records().to_vec();
        records[0].last_review = ReviewDate::Normalized(day.and_hms_opt(0, 0, 0).unwrap());
        records[1].last_review =
            ReviewDate::Normalized(day.and_hms_micro_opt(10, 0, 0, 250_000).unwrap());
        let out = String::from_utf8(ds.with_records(records.clone()).to_csv_bytes().unwrap()).unwrap();
        assert_eq!(
            out,
            "price,last_review\n1,2019-05-21 00:00:00.000000\n2,2019-05-21 10:00:00.250000\n"
        );

        records[0].last_review = ReviewDate::Normalized(day.and_hms_nano_opt(0, 0, 0, 500).unwrap());
        let out = String::from_utf8(ds.with_records(records).to_csv_bytes().unwrap()).unwrap();
        assert_eq!(
            out,
            "price,last_review\n1,2019-05-21 00:00:00.000000500\n2,2019-05-21 10:00:00.250000000\n"
        );
    }

    #[test]
    fn empty_dataset_keeps_header() {
        let ds = dataset("price,last_review,longitude\n");
        assert!(ds.is_empty());
        let out = String::from_utf8(ds.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(out, "price,last_review,longitude\n");
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Table::from_reader("price,last_review\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CleaningError::Csv(_)));
    }
}
