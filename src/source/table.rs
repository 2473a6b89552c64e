//! Small readers over result frames. Remote engines disagree on cell types
//! (the statement API returns strings, sqlite returns integers), so the
//! accessors coerce where it is unambiguous.

use polars::prelude::*;

use crate::error::{DashError, Result};

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

fn cell_to_string(value: AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        other => Some(other.to_string()),
    }
}

/// Text of every non-null cell in the column at `index`, in row order.
pub fn text_values(df: &DataFrame, index: usize) -> Vec<String> {
    let Some(column) = df.get_columns().get(index) else {
        return Vec::new();
    };
    (0..column.len())
        .filter_map(|row| column.get(row).ok().and_then(cell_to_string))
        .collect()
}

/// Text of cell `(row, column index)`
pub fn text_at(df: &DataFrame, row: usize, index: usize) -> Option<String> {
    df.get_columns()
        .get(index)
        .and_then(|c| c.get(row).ok())
        .and_then(cell_to_string)
}

pub fn get_text(df: &DataFrame, name: &str, row: usize) -> Result<Option<String>> {
    let column = df
        .column(name)
        .map_err(|e| DashError::Decode(format!("missing column {name}: {e}")))?;
    Ok(cell_to_string(column.get(row)?))
}

pub fn get_i64(df: &DataFrame, name: &str, row: usize) -> Result<Option<i64>> {
    let column = df
        .column(name)
        .map_err(|e| DashError::Decode(format!("missing column {name}: {e}")))?;
    let value = match column.get(row)? {
        AnyValue::Null => None,
        AnyValue::Int64(v) => Some(v),
        AnyValue::Int32(v) => Some(v as i64),
        AnyValue::Int16(v) => Some(v as i64),
        AnyValue::Int8(v) => Some(v as i64),
        AnyValue::UInt32(v) => Some(v as i64),
        AnyValue::UInt64(v) => Some(v as i64),
        AnyValue::Float64(v) => Some(v as i64),
        AnyValue::String(s) => Some(parse_i64(name, s)?),
        AnyValue::StringOwned(s) => Some(parse_i64(name, s.as_str())?),
        other => {
            return Err(DashError::Decode(format!(
                "column {name} holds {other:?}, expected an integer"
            )));
        }
    };
    Ok(value)
}

fn parse_i64(name: &str, s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| DashError::Decode(format!("column {name}: {s:?} is not an integer ({e})")))
}

/// Required integer cell
pub fn require_i64(df: &DataFrame, name: &str, row: usize) -> Result<i64> {
    get_i64(df, name, row)?.ok_or_else(|| DashError::Decode(format!("column {name} is null at row {row}")))
}

/// Required text cell; null reads as empty
pub fn text_or_empty(df: &DataFrame, name: &str, row: usize) -> Result<String> {
    Ok(get_text(df, name, row)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        let ids = Series::new("id".into(), [Some(1i64), None, Some(3)]);
        let names = Series::new("name".into(), [Some("a"), Some("b"), None]);
        let text_ids = Series::new("text_id".into(), ["10", "x", " 12 "]);
        DataFrame::new(vec![ids.into(), names.into(), text_ids.into()]).unwrap()
    }

    #[test]
    fn test_column_names() {
        assert_eq!(column_names(&sample_df()), vec!["id", "name", "text_id"]);
    }

    #[test]
    fn test_text_values_skip_nulls() {
        let df = sample_df();
        assert_eq!(text_values(&df, 1), vec!["a", "b"]);
        assert!(text_values(&df, 9).is_empty());
    }

    #[test]
    fn test_get_i64_variants() {
        let df = sample_df();
        assert_eq!(get_i64(&df, "id", 0).unwrap(), Some(1));
        assert_eq!(get_i64(&df, "id", 1).unwrap(), None);
        assert_eq!(get_i64(&df, "text_id", 0).unwrap(), Some(10));
        assert_eq!(get_i64(&df, "text_id", 2).unwrap(), Some(12));
        assert!(get_i64(&df, "text_id", 1).is_err());
        assert!(get_i64(&df, "nope", 0).is_err());
    }

    #[test]
    fn test_get_text() {
        let df = sample_df();
        assert_eq!(get_text(&df, "name", 0).unwrap().as_deref(), Some("a"));
        assert_eq!(get_text(&df, "name", 2).unwrap(), None);
        assert_eq!(text_or_empty(&df, "name", 2).unwrap(), "");
        assert_eq!(text_at(&df, 0, 0).as_deref(), Some("1"));
    }
}
