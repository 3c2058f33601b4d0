use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use scal_core::{
    cache::PageCache,
    society_client::{self, SocietyOptions},
};
use serde::Deserialize;

use crate::{
    config::ServerConfig,
    route::calendar::{calendar_response, internal_error},
};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    year: Option<i32>,
    #[serde(default = "default_months")]
    months: u32,
}

/// Upper bound of months per request, each month is one page download.
const MAX_MONTHS: u32 = 12;

fn default_months() -> u32 {
    2
}

impl QueryParams {
    fn months(&self) -> u32 {
        self.months.min(MAX_MONTHS)
    }
}

/// Handle society calendar requests, downloaded pages are cached.
pub async fn handler(
    State(config): State<ServerConfig>,
    Query(query_params): Query<QueryParams>,
) -> Result<Response, (StatusCode, String)> {
    let options = SocietyOptions {
        year: query_params.year,
        months: query_params.months(),
        ..SocietyOptions::new(PageCache::new(&config.cache_dir, true))
    };
    let ical_calendar = society_client::get(&options)
        .await
        .map_err(internal_error)?;
    Ok(calendar_response(&ical_calendar))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_months_are_clamped() {
        let query_params = |months| QueryParams { year: None, months };
        assert_eq!(query_params(0).months(), 0);
        assert_eq!(query_params(3).months(), 3);
        assert_eq!(query_params(12).months(), 12);
        assert_eq!(query_params(10_000).months(), MAX_MONTHS);
    }
}
