//! Column readers for register extracts
//!
//! Registers deliver the same logical field with different physical types
//! across years (integer or string identifiers, integer years or dates).
//! These readers normalise a named column into plain Rust values once per
//! batch, using Arrow's cast kernel where a cast is lossless enough.

use arrow::array::{Array, ArrayRef, Date32Array, Date64Array, Int64Array, StringArray};
use arrow::compute::kernels::cast;
use arrow_schema::DataType;
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};

use crate::error::{PanelError, Result};

/// Date formats accepted in string-typed year columns
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%Y"];

/// Look up a declared column
pub fn get_column<'a>(batch: &'a RecordBatch, dataset: &str, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PanelError::MissingColumn {
            dataset: dataset.to_string(),
            column: name.to_string(),
        })
}

fn cast_column(array: &ArrayRef, to: &DataType, dataset: &str, column: &str, expected: &'static str) -> Result<ArrayRef> {
    if !cast::can_cast_types(array.data_type(), to) {
        return Err(PanelError::ColumnType {
            dataset: dataset.to_string(),
            column: column.to_string(),
            expected,
        });
    }
    Ok(cast::cast(array, to)?)
}

/// Read a column as trimmed strings; blanks become `None`
pub fn read_text(batch: &RecordBatch, dataset: &str, column: &str) -> Result<Vec<Option<String>>> {
    let array = get_column(batch, dataset, column)?;
    let utf8 = cast_column(array, &DataType::Utf8, dataset, column, "text")?;
    let strings = utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PanelError::ColumnType {
            dataset: dataset.to_string(),
            column: column.to_string(),
            expected: "text",
        })?;

    Ok(strings
        .iter()
        .map(|value| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        })
        .collect())
}

/// Read a column as integers; unparseable values become `None`
pub fn read_int(batch: &RecordBatch, dataset: &str, column: &str) -> Result<Vec<Option<i32>>> {
    let array = get_column(batch, dataset, column)?;
    let ints = cast_column(array, &DataType::Int64, dataset, column, "integer")?;
    let ints = ints
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| PanelError::ColumnType {
            dataset: dataset.to_string(),
            column: column.to_string(),
            expected: "integer",
        })?;

    Ok(ints
        .iter()
        .map(|value| value.and_then(|v| i32::try_from(v).ok()))
        .collect())
}

/// Parse a year from a string holding either a bare year or a date
#[must_use]
pub fn parse_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if let Ok(year) = value.parse::<i32>() {
        return Some(year);
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(|date| date.year())
}

/// Read a column as calendar years from integer, date or string values
pub fn read_year(batch: &RecordBatch, dataset: &str, column: &str) -> Result<Vec<Option<i32>>> {
    let array = get_column(batch, dataset, column)?;
    match array.data_type() {
        DataType::Date32 => {
            let dates = array
                .as_any()
                .downcast_ref::<Date32Array>()
                .ok_or_else(|| PanelError::ColumnType {
                    dataset: dataset.to_string(),
                    column: column.to_string(),
                    expected: "date",
                })?;
            Ok((0..dates.len())
                .map(|row| {
                    if dates.is_null(row) {
                        None
                    } else {
                        dates.value_as_date(row).map(|d| d.year())
                    }
                })
                .collect())
        }
        DataType::Date64 => {
            let dates = array
                .as_any()
                .downcast_ref::<Date64Array>()
                .ok_or_else(|| PanelError::ColumnType {
                    dataset: dataset.to_string(),
                    column: column.to_string(),
                    expected: "date",
                })?;
            Ok((0..dates.len())
                .map(|row| {
                    if dates.is_null(row) {
                        None
                    } else {
                        dates.value_as_date(row).map(|d| d.year())
                    }
                })
                .collect())
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let text = read_text(batch, dataset, column)?;
            Ok(text
                .into_iter()
                .map(|value| value.as_deref().and_then(parse_year))
                .collect())
        }
        _ => read_int(batch, dataset, column),
    }
}
