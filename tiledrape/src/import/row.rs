//! Record parser for the tool's multi-percentile building CSV.
//!
//! Column order: `id`, six ground percentiles, then roof and roof RMSE
//! alternating for eight percentiles, `roof_flat`, ground point count and
//! roof point count. The tool may leave a trailing comma.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::merge::{BuildingRecord, GROUND_PERCENTILES, ROOF_PERCENTILES};
use crate::tile::TileId;

/// Value the tool writes for a missing measurement.
pub const NULL_VALUE: &str = "-99.99";

const MEASURED_COLUMNS: usize = 1 + GROUND_PERCENTILES.len() + 2 * ROOF_PERCENTILES.len() + 3;

/// CSV reader over tool output. The header row is skipped and rows may
/// carry one extra empty column.
pub fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(input)
}

/// Parse one data record into a record for `tile`.
///
/// Coverage version and file date are left empty.
pub fn parse_record(row: &StringRecord, tile: &TileId) -> Result<BuildingRecord, String> {
    let mut fields: Vec<&str> = row.iter().collect();
    if fields.len() == MEASURED_COLUMNS + 1 && fields.last() == Some(&"") {
        fields.pop();
    }
    if fields.len() != MEASURED_COLUMNS {
        return Err(format!(
            "expected {} columns, found {}",
            MEASURED_COLUMNS,
            fields.len()
        ));
    }

    let id = fields[0]
        .parse::<i64>()
        .map_err(|_| format!("invalid building id '{}'", fields[0]))?;
    let mut record = BuildingRecord::new(id, tile.clone());

    let mut column = 1;
    for slot in record.ground.iter_mut() {
        *slot = height(fields[column])?;
        column += 1;
    }
    for i in 0..ROOF_PERCENTILES.len() {
        record.roof[i] = height(fields[column])?;
        record.rmse[i] = height(fields[column + 1])?;
        column += 2;
    }
    record.roof_flat = flag(fields[column])?;
    record.ground_points = count(fields[column + 1])?;
    record.roof_points = count(fields[column + 2])?;
    Ok(record)
}

fn is_null(value: &str) -> bool {
    value.is_empty() || value == NULL_VALUE
}

fn height(value: &str) -> Result<Option<f32>, String> {
    if is_null(value) {
        return Ok(None);
    }
    value
        .parse::<f32>()
        .map(Some)
        .map_err(|_| format!("invalid height '{}'", value))
}

fn count(value: &str) -> Result<Option<i64>, String> {
    if is_null(value) {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| format!("invalid point count '{}'", value))
}

fn flag(value: &str) -> Result<Option<bool>, String> {
    if is_null(value) {
        return Ok(None);
    }
    match value.to_lowercase().as_str() {
        "true" | "t" | "1" => Ok(Some(true)),
        "false" | "f" | "0" => Ok(Some(false)),
        _ => Err(format!("invalid flag '{}'", value)),
    }
}
