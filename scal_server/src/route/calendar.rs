pub mod society;
pub mod waste;

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use scal_core::ical::generator::{Emitter, IcalCalendar};

/// Respond with a calendar file.
pub fn calendar_response(ical_calendar: &IcalCalendar) -> Response {
    ([(CONTENT_TYPE, "text/calendar")], ical_calendar.generate()).into_response()
}

pub fn internal_error(err: impl ToString) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
