//! CSV ingestion with simple column type inference

use super::{Column, Table, TableError, TableResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::io::Read;
use std::path::Path;

/// Read a CSV file with a header row into a `Table`
///
/// Columns named in `datetime_columns` are parsed as timestamps. Every
/// other column is numeric when all of its non-empty cells parse as `f64`
/// (empty cells become NaN), and text otherwise.
pub fn read_csv(path: &Path, datetime_columns: &[String]) -> TableResult<Table> {
    let reader = ::csv::Reader::from_path(path)
        .map_err(|e| TableError::Csv(format!("{}: {}", path.display(), e)))?;
    read_from(reader, datetime_columns)
}

/// Same as [`read_csv`] over any reader
pub fn read_csv_from<R: Read>(input: R, datetime_columns: &[String]) -> TableResult<Table> {
    read_from(::csv::Reader::from_reader(input), datetime_columns)
}

fn read_from<R: Read>(
    mut reader: ::csv::Reader<R>,
    datetime_columns: &[String],
) -> TableResult<Table> {
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| TableError::Csv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    for name in datetime_columns {
        if !headers.contains(name) {
            return Err(TableError::MissingColumn(name.clone()));
        }
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| TableError::Csv(e.to_string()))?;
        for (idx, cell) in record.iter().enumerate() {
            cells[idx].push(cell.to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| {
            if datetime_columns.contains(&name) {
                parse_datetime_column(name, values)
            } else {
                Ok(infer_column(name, values))
            }
        })
        .collect::<TableResult<Vec<_>>>()?;

    Table::new(columns)
}

fn infer_column(name: String, values: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = values
        .iter()
        .map(|v| {
            let v = v.trim();
            if v.is_empty() {
                Some(f64::NAN)
            } else {
                v.parse::<f64>().ok()
            }
        })
        .collect();

    match parsed {
        Some(numbers) => Column::numeric(name, numbers),
        None => Column::text(name, values),
    }
}

fn parse_datetime_column(name: String, values: Vec<String>) -> TableResult<Column> {
    let parsed = values
        .iter()
        .map(|v| {
            parse_datetime(v.trim()).ok_or_else(|| {
                TableError::Csv(format!("column '{}': invalid datetime '{}'", name, v))
            })
        })
        .collect::<TableResult<Vec<_>>>()?;
    Ok(Column::datetime(name, parsed))
}

/// Parse RFC 3339, `%Y-%m-%d %H:%M:%S` or `%Y-%m-%d` (midnight UTC)
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnData;

    #[test]
    fn test_infers_numeric_text_and_datetime() {
        let input = "store,day,sales,note\na,2024-01-01,1.5,x\nb,2024-01-02,,y\n";
        let table = read_csv_from(input.as_bytes(), &["day".to_string()]).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert!(matches!(table.column("store").unwrap().data, ColumnData::Text(_)));
        assert!(matches!(table.column("day").unwrap().data, ColumnData::Datetime(_)));
        let sales = table.numeric("sales").unwrap();
        assert_eq!(sales[0], 1.5);
        assert!(sales[1].is_nan());
    }

    #[test]
    fn test_invalid_datetime_is_an_error() {
        let input = "day\nnot-a-date\n";
        let err = read_csv_from(input.as_bytes(), &["day".to_string()]).unwrap_err();
        assert!(matches!(err, TableError::Csv(msg) if msg.contains("not-a-date")));
    }

    #[test]
    fn test_unknown_datetime_column() {
        let input = "a\n1\n";
        let err = read_csv_from(input.as_bytes(), &["b".to_string()]).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn(name) if name == "b"));
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2024-03-01T12:00:00Z").is_some());
        assert!(parse_datetime("2024-03-01 12:00:00").is_some());
        assert!(parse_datetime("2024-03-01").is_some());
        assert!(parse_datetime("03/01/2024").is_none());
    }
}
