//! Generic schema-driven CSV reader.
//!
//! Rows are read as [`csv::ByteRecord`]s so that one cell with broken
//! encoding does not abort the table: the cell is treated as absent and
//! counted in [`LoadReport::invalid_text`].

use std::{cell::Cell, fs::File, io::Read, path::Path};

use chrono::NaiveDateTime;
use csv::ByteRecord;
use geo::Geometry;
use wildfire_geometry::GeometryError;
use wildfire_reference_models::LoadReport;

use crate::{
    LoadError, parsing,
    schema::{ResolvedColumns, TableSchema},
};

/// Why a row did not become a record.
#[derive(Debug)]
pub enum RowSkip {
    /// A required field was empty or unparseable.
    Missing { field: &'static str },
    /// The geometry cell did not decode.
    Geometry {
        field: &'static str,
        error: GeometryError,
    },
    /// The row repeats the key of an earlier row.
    Duplicate,
}

/// Read access to one data row through the table's logical field names.
pub struct RowView<'a> {
    row: u64,
    record: &'a ByteRecord,
    columns: &'a ResolvedColumns,
    invalid_text: Cell<u64>,
}

impl<'a> RowView<'a> {
    /// 1-based data row number within the file.
    #[must_use]
    pub const fn row(&self) -> u64 {
        self.row
    }

    /// Whether the schema maps `field` at all.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.columns.index(field).is_some()
    }

    /// Trimmed cell text. Empty cells, `nan` and invalid UTF-8 are `None`.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&'a str> {
        let bytes = self.record.get(self.columns.index(field)?)?;
        let Ok(text) = std::str::from_utf8(bytes) else {
            self.invalid_text.set(self.invalid_text.get() + 1);
            return None;
        };
        let text = text.trim().trim_start_matches('\u{feff}');
        (!text.is_empty() && !text.eq_ignore_ascii_case("nan")).then_some(text)
    }

    #[must_use]
    pub fn number(&self, field: &str) -> Option<f64> {
        self.text(field).and_then(parsing::parse_number)
    }

    #[must_use]
    pub fn integer(&self, field: &str) -> Option<i64> {
        self.text(field).and_then(parsing::parse_integer)
    }

    #[must_use]
    pub fn year(&self, field: &str) -> Option<i32> {
        self.text(field).and_then(parsing::parse_year)
    }

    #[must_use]
    pub fn timestamp(&self, field: &str) -> Option<NaiveDateTime> {
        self.text(field).and_then(parsing::parse_timestamp)
    }

    /// # Errors
    ///
    /// Returns [`RowSkip::Missing`] if the cell is absent.
    pub fn required_text(&self, field: &'static str) -> Result<&'a str, RowSkip> {
        self.text(field).ok_or(RowSkip::Missing { field })
    }

    /// # Errors
    ///
    /// Returns [`RowSkip::Missing`] if the cell is absent or not a number.
    pub fn required_number(&self, field: &'static str) -> Result<f64, RowSkip> {
        self.number(field).ok_or(RowSkip::Missing { field })
    }

    /// # Errors
    ///
    /// Returns [`RowSkip::Missing`] if the cell is absent or not an integer.
    pub fn required_integer(&self, field: &'static str) -> Result<i64, RowSkip> {
        self.integer(field).ok_or(RowSkip::Missing { field })
    }

    /// # Errors
    ///
    /// Returns [`RowSkip::Missing`] if the cell is absent or not a year.
    pub fn required_year(&self, field: &'static str) -> Result<i32, RowSkip> {
        self.year(field).ok_or(RowSkip::Missing { field })
    }

    /// # Errors
    ///
    /// Returns [`RowSkip::Missing`] if the cell is absent or not a timestamp.
    pub fn required_timestamp(&self, field: &'static str) -> Result<NaiveDateTime, RowSkip> {
        self.timestamp(field).ok_or(RowSkip::Missing { field })
    }

    /// Decodes a WKB/EWKB/WKT geometry cell.
    ///
    /// # Errors
    ///
    /// Returns [`RowSkip::Missing`] if the cell is absent, or
    /// [`RowSkip::Geometry`] if it does not decode.
    pub fn geometry(&self, field: &'static str) -> Result<Geometry<f64>, RowSkip> {
        let text = self.required_text(field)?;
        wildfire_geometry::parse(text).map_err(|error| RowSkip::Geometry { field, error })
    }
}

/// Reads every row of `path` through `build`, counting outcomes in
/// `report`.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be opened or read, or if a
/// named column in the schema is missing from the header row. Bad rows
/// are never errors.
pub fn read_table<T, F>(
    path: &Path,
    schema: &TableSchema,
    report: &mut LoadReport,
    build: F,
) -> Result<Vec<T>, LoadError>
where
    F: FnMut(&RowView<'_>) -> Result<T, RowSkip>,
{
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_from(file, path, schema, report, build)
}

/// Reads one table file into its rows and a fresh [`LoadReport`].
///
/// # Errors
///
/// See [`read_table`].
pub fn load_table<T, F>(
    path: &Path,
    schema: &TableSchema,
    build: F,
) -> Result<(Vec<T>, LoadReport), LoadError>
where
    F: FnMut(&RowView<'_>) -> Result<T, RowSkip>,
{
    let mut report = LoadReport::new(&schema.name);
    let rows = read_table(path, schema, &mut report, build)?;
    log_report(&report);
    Ok((rows, report))
}

/// Same as [`read_table`] over any reader; `path` is only used in errors.
///
/// # Errors
///
/// See [`read_table`].
pub fn read_from<R, T, F>(
    input: R,
    path: &Path,
    schema: &TableSchema,
    report: &mut LoadReport,
    mut build: F,
) -> Result<Vec<T>, LoadError>
where
    R: Read,
    F: FnMut(&RowView<'_>) -> Result<T, RowSkip>,
{
    let csv_error = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(schema.delimiter_byte())
        .has_headers(schema.has_headers)
        .comment(schema.comment_byte())
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = if schema.has_headers {
        reader
            .byte_headers()
            .map_err(csv_error)?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim()
                    .trim_start_matches('\u{feff}')
                    .to_string()
            })
            .collect()
    } else {
        Vec::new()
    };
    let columns = schema.resolve(&headers)?;

    let mut records = Vec::new();
    let mut record = ByteRecord::new();
    let mut row = 0_u64;

    loop {
        match reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {}
            Err(e) if e.is_io_error() => return Err(csv_error(e)),
            Err(e) => {
                row += 1;
                report.rows_read += 1;
                report.skipped_missing += 1;
                log::debug!("{}: malformed row {row}: {e}", schema.name);
                continue;
            }
        }
        row += 1;
        report.rows_read += 1;

        if let Some((index, accepted)) = &columns.filter {
            let value = record
                .get(*index)
                .and_then(|bytes| std::str::from_utf8(bytes).ok())
                .map_or("", str::trim);
            if !accepted.iter().any(|a| a == value) {
                report.rows_filtered += 1;
                continue;
            }
        }

        let view = RowView {
            row,
            record: &record,
            columns: &columns,
            invalid_text: Cell::new(0),
        };
        let outcome = build(&view);
        report.invalid_text += view.invalid_text.get();

        match outcome {
            Ok(item) => {
                report.rows_loaded += 1;
                records.push(item);
            }
            Err(RowSkip::Missing { field }) => {
                report.skipped_missing += 1;
                log::debug!("{}: row {row} missing {field}", schema.name);
            }
            Err(RowSkip::Geometry { field, error }) => {
                report.skipped_geometry += 1;
                log::debug!("{}: row {row} bad {field}: {error}", schema.name);
            }
            Err(RowSkip::Duplicate) => {
                report.skipped_duplicate += 1;
                log::debug!("{}: row {row} duplicate", schema.name);
            }
        }
    }

    Ok(records)
}

/// Logs the outcome of a table load.
pub fn log_report(report: &LoadReport) {
    if report.skipped() > 0 || report.invalid_text > 0 {
        log::warn!(
            "{}: loaded {} of {} rows ({} filtered, {} bad geometry, {} missing fields, \
             {} duplicates, {} invalid text cells)",
            report.table,
            report.rows_loaded,
            report.rows_read,
            report.rows_filtered,
            report.skipped_geometry,
            report.skipped_missing,
            report.skipped_duplicate,
            report.invalid_text,
        );
    } else {
        log::info!(
            "{}: loaded {} of {} rows ({} filtered)",
            report.table,
            report.rows_loaded,
            report.rows_read,
            report.rows_filtered,
        );
    }
}
