//! `GET /api/gridvalue`: point lookup into a previously written raw grid
//! (§4.8). Validates the query, verifies the `(run_id, time)` pair is on
//! record, converts lat/lon to a `(row, col)` index using the run's stored
//! bounds, and reads a single cell out of the `.bin` file the writer (C7)
//! produced for that frame.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M";

#[derive(Deserialize)]
pub struct GridValueQuery {
    pub timestamp: String,
    pub parameters: i64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize)]
pub struct GridValueResponse {
    pub value: f64,
}

pub async fn gridvalue_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GridValueQuery>,
) -> Result<Json<GridValueResponse>, ApiError> {
    let naive = NaiveDateTime::parse_from_str(&query.timestamp, TIMESTAMP_FORMAT)
        .map_err(|e| ApiError::BadRequest(format!("malformed timestamp '{}': {e}", query.timestamp)))?;
    let time = Utc.from_utc_datetime(&naive);

    if !state.catalog.verify_raingrid(query.parameters, time).await? {
        return Err(ApiError::NotFound(format!(
            "no grid for run {} at {}",
            query.parameters, query.timestamp
        )));
    }

    let run = state
        .catalog
        .get_run(query.parameters)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no such run {}", query.parameters)))?;

    let (row, col) = run
        .bbox
        .row_col(query.longitude, query.latitude, run.resolution_deg)
        .ok_or_else(|| ApiError::BadRequest(format!(
            "point ({}, {}) falls outside run {}'s bounds",
            query.longitude, query.latitude, query.parameters
        )))?;

    let raw_path = state.outputs_raw.join(format!("{}.bin", naive.format(TIMESTAMP_FORMAT)));
    let mut file = std::fs::File::open(&raw_path).map_err(ApiError::from)?;
    let value = cml_render::raw::read_cell(&mut file, row, col).map_err(ApiError::from)?;

    let rounded = (value * 10_000.0).round() / 10_000.0;
    Ok(Json(GridValueResponse { value: rounded }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parses_in_the_expected_format() {
        let parsed = NaiveDateTime::parse_from_str("2024-06-01_1230", TIMESTAMP_FORMAT);
        assert!(parsed.is_ok());
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let parsed = NaiveDateTime::parse_from_str("not-a-timestamp", TIMESTAMP_FORMAT);
        assert!(parsed.is_err());
    }

    #[test]
    fn rounding_matches_four_decimal_places() {
        let value: f64 = 1.234_567_8;
        let rounded = (value * 10_000.0).round() / 10_000.0;
        assert_eq!(rounded, 1.2346);
    }
}
