//! Row normalization: title-cased names and day-first dates.

use crate::constants::{DATE_COLUMNS, NAME_COLUMN};
use crate::error::TransformError;
use crate::types::{FieldValue, NormalizedRecord, RawRow};
use chrono::NaiveDate;

/// Lower-case the name, then capitalize the first character of every
/// whitespace-separated token. Hyphens and apostrophes are not token
/// boundaries. Returns `None` when nothing but whitespace is left.
pub fn normalize_name(raw: &str) -> Option<String> {
    let lowered = raw.to_lowercase();
    let words: Vec<String> = lowered.split_whitespace().map(capitalize).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Upper-case the first character only. When that expands to several
/// characters (`ß` to `SS`) the tail of the expansion stays lower-case, so
/// "ßen" becomes "Ssen", not "SSen".
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut upper = first.to_uppercase();
    let mut out = String::with_capacity(word.len());
    out.extend(upper.next());
    out.extend(upper.flat_map(char::to_lowercase));
    out.extend(chars);
    out
}

/// Strict `DD/MM/YYYY`. Shape is checked before the calendar so that
/// `5/3/2021` or `2021-03-05` never slip through a lenient parser.
pub fn parse_day_first_date(field: &str, raw: &str) -> Result<NaiveDate, TransformError> {
    let invalid = || TransformError::DateFormat {
        field: field.to_string(),
        value: raw.to_string(),
    };

    let bytes = raw.as_bytes();
    if bytes.len() != 10 || bytes[2] != b'/' || bytes[5] != b'/' {
        return Err(invalid());
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !digits_ok {
        return Err(invalid());
    }

    let day: u32 = raw[0..2].parse().map_err(|_| invalid())?;
    let month: u32 = raw[3..5].parse().map_err(|_| invalid())?;
    let year: i32 = raw[6..10].parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Normalize one row. Only the name and the two date columns are touched.
pub fn transform_row(row: &RawRow) -> Result<NormalizedRecord, TransformError> {
    let name = row
        .get(NAME_COLUMN)
        .and_then(normalize_name)
        .ok_or_else(|| TransformError::MissingField(NAME_COLUMN.to_string()))?;

    for column in DATE_COLUMNS {
        if row.get(column).is_none() {
            return Err(TransformError::MissingField(column.to_string()));
        }
    }

    let mut fields = Vec::with_capacity(row.len());
    for (column, value) in row.iter() {
        let normalized = if column == NAME_COLUMN {
            FieldValue::Text(name.clone())
        } else if DATE_COLUMNS.iter().any(|c| *c == column) {
            FieldValue::Date(parse_day_first_date(column, value)?)
        } else {
            FieldValue::Text(value.to_string())
        };
        fields.push((column.to_string(), normalized));
    }

    Ok(NormalizedRecord::new(fields))
}
