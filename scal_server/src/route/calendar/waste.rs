use axum::{extract::Query, http::StatusCode, response::Response};
use scal_core::{
    stream::WasteStreamBitmask,
    waste_client::{self, WasteOptions},
};
use serde::Deserialize;

use crate::route::calendar::{calendar_response, internal_error};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    property_id: String,
    #[serde(default)]
    include_last: bool,
    #[serde(default)]
    exclude_refuse: bool,
    #[serde(default)]
    exclude_recycling: bool,
    #[serde(default)]
    exclude_food: bool,
    #[serde(default)]
    exclude_garden: bool,
}

impl From<&QueryParams> for WasteStreamBitmask {
    fn from(value: &QueryParams) -> Self {
        let mut waste_stream_bitmask = WasteStreamBitmask::none();
        if value.exclude_refuse {
            waste_stream_bitmask |= WasteStreamBitmask::Refuse;
        }
        if value.exclude_recycling {
            waste_stream_bitmask |= WasteStreamBitmask::Recycling;
        }
        if value.exclude_food {
            waste_stream_bitmask |= WasteStreamBitmask::Food;
        }
        if value.exclude_garden {
            waste_stream_bitmask |= WasteStreamBitmask::Garden;
        }
        waste_stream_bitmask
    }
}

/// Handle waste calendar requests.
///
/// The `property_id` must be given in the query string.
pub async fn handler(
    Query(query_params): Query<QueryParams>,
) -> Result<Response, (StatusCode, String)> {
    let options = WasteOptions {
        include_last: query_params.include_last,
        excluded_streams: WasteStreamBitmask::from(&query_params),
        ..WasteOptions::default()
    };
    let waste_calendar = waste_client::get(&query_params.property_id, &options)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                String::from("no collection data found"),
            )
        })?;
    Ok(calendar_response(&waste_calendar.calendar))
}
