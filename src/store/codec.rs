//! Little-endian element encoding for raw arrays
//!
//! All functions are pure: they turn typed values into bytes and back and
//! validate sizes against the expected element width.

use chrono::{DateTime, TimeZone, Utc};

use super::error::{StorageError, StorageResult};
use super::types::ElementType;

/// Pack numeric columns row-major into one block
///
/// `Float32` blocks narrow every value; reads widen them back to `f64`.
pub fn encode_numeric_block(
    columns: &[&[f64]],
    rows: usize,
    element_type: ElementType,
) -> StorageResult<Vec<u8>> {
    if !element_type.is_float() {
        return Err(StorageError::invalid_input(format!(
            "numeric block must be float64 or float32, got {:?}",
            element_type
        )));
    }
    let mut bytes = Vec::with_capacity(rows * columns.len() * element_type.width());
    for row in 0..rows {
        for column in columns {
            let value = column[row];
            match element_type {
                ElementType::Float32 => bytes.extend_from_slice(&(value as f32).to_le_bytes()),
                _ => bytes.extend_from_slice(&value.to_le_bytes()),
            }
        }
    }
    Ok(bytes)
}

/// Split a row-major block back into `columns` column vectors
pub fn decode_numeric_block(
    bytes: &[u8],
    columns: usize,
    element_type: ElementType,
    location: &str,
) -> StorageResult<Vec<Vec<f64>>> {
    let values = decode_floats(bytes, element_type, location)?;
    if columns == 0 {
        return Ok(Vec::new());
    }
    if values.len() % columns != 0 {
        return Err(StorageError::corruption(
            location,
            format!("{} values do not fill rows of {} columns", values.len(), columns),
        ));
    }
    let rows = values.len() / columns;
    let mut out = vec![Vec::with_capacity(rows); columns];
    for (idx, value) in values.into_iter().enumerate() {
        out[idx % columns].push(value);
    }
    Ok(out)
}

/// Encode `f64` values
pub fn encode_f64(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Encode `i64` values
pub fn encode_i64(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a float array of either width into `f64`
pub fn decode_floats(
    bytes: &[u8],
    element_type: ElementType,
    location: &str,
) -> StorageResult<Vec<f64>> {
    let width = element_type.width();
    check_width(bytes, width, location)?;
    match element_type {
        ElementType::Float64 => Ok(bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap_or([0; 8])))
            .collect()),
        ElementType::Float32 => Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap_or([0; 4])) as f64)
            .collect()),
        other => Err(StorageError::corruption(
            location,
            format!("expected a float array, found {:?}", other),
        )),
    }
}

/// Decode an `Int64` array
pub fn decode_i64(bytes: &[u8], location: &str) -> StorageResult<Vec<i64>> {
    check_width(bytes, 8, location)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| i64::from_le_bytes(c.try_into().unwrap_or([0; 8])))
        .collect())
}

/// Encode datetimes as nanoseconds since the Unix epoch
pub fn encode_timestamps(column: &str, values: &[DateTime<Utc>]) -> StorageResult<Vec<u8>> {
    let nanos = values
        .iter()
        .map(|dt| {
            dt.timestamp_nanos_opt().ok_or_else(|| {
                StorageError::invalid_input(format!(
                    "column '{}': {} is outside the nanosecond timestamp range",
                    column, dt
                ))
            })
        })
        .collect::<StorageResult<Vec<_>>>()?;
    Ok(encode_i64(&nanos))
}

/// Decode nanosecond timestamps
pub fn decode_timestamps(bytes: &[u8], location: &str) -> StorageResult<Vec<DateTime<Utc>>> {
    Ok(decode_i64(bytes, location)?
        .into_iter()
        .map(|nanos| Utc.timestamp_nanos(nanos))
        .collect())
}

/// Encode text as zero-padded fixed-width UTF-8
///
/// Returns the bytes and the chosen width (the longest value, at least 1).
pub fn encode_text(column: &str, values: &[String]) -> StorageResult<(Vec<u8>, usize)> {
    if let Some(bad) = values.iter().find(|v| v.contains('\0')) {
        return Err(StorageError::invalid_input(format!(
            "column '{}': value {:?} contains a NUL byte",
            column, bad
        )));
    }
    let width = values.iter().map(String::len).max().unwrap_or(0).max(1);
    let mut bytes = Vec::with_capacity(values.len() * width);
    for value in values {
        bytes.extend_from_slice(value.as_bytes());
        bytes.resize(bytes.len() + width - value.len(), 0);
    }
    Ok((bytes, width))
}

/// Decode zero-padded fixed-width UTF-8
pub fn decode_text(bytes: &[u8], width: usize, location: &str) -> StorageResult<Vec<String>> {
    if width == 0 {
        return Err(StorageError::corruption(location, "text width is zero"));
    }
    check_width(bytes, width, location)?;
    bytes
        .chunks_exact(width)
        .map(|cell| {
            let end = cell.iter().position(|&b| b == 0).unwrap_or(width);
            String::from_utf8(cell[..end].to_vec())
                .map_err(|e| StorageError::corruption(location, format!("invalid UTF-8: {}", e)))
        })
        .collect()
}

fn check_width(bytes: &[u8], width: usize, location: &str) -> StorageResult<()> {
    if bytes.len() % width != 0 {
        return Err(StorageError::corruption(
            location,
            format!("{} bytes is not a multiple of element width {}", bytes.len(), width),
        ));
    }
    Ok(())
}
