//! Serialize records and source events into one iCalendar.

use chrono::Duration;
use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEvent, IcalEventBuilder, Property},
    ical_param, ical_property,
};

use crate::record::CalendarRecord;

static TIMEZONE: &str = "Europe/London";
static DATE_FORMAT: &str = "%Y%m%d";
static DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
static STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Build the calendar container holding all records followed by all source events.
pub fn build_calendar(
    prod_id: &str,
    records: &[CalendarRecord],
    source_events: Vec<IcalEvent>,
) -> IcalCalendar {
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(prod_id)
        .build();
    calendar
        .properties
        .push(ical_property!("METHOD", "PUBLISH"));
    calendar
        .events
        .extend(records.iter().map(get_event));
    calendar.events.extend(source_events);
    calendar
}

/// Build an event from a record.
fn get_event(record: &CalendarRecord) -> IcalEvent {
    let builder = IcalEventBuilder::tzid(TIMEZONE)
        .uid(&record.uid)
        .changed(record.stamp.format(STAMP_FORMAT).to_string());
    let mut event = match record.start.date_time() {
        Some(start) => builder
            .start(start.format(DATE_TIME_FORMAT).to_string())
            .end((start + Duration::hours(1)).format(DATE_TIME_FORMAT).to_string())
            .build(),
        None => builder
            .one_day(record.start.date.format(DATE_FORMAT).to_string())
            .build(),
    };
    event
        .properties
        .push(ical_property!("SUMMARY", escape_text(&record.summary)));
    event
        .properties
        .push(ical_property!("DESCRIPTION", escape_text(&record.description)));
    if let Some(category) = &record.category {
        event
            .properties
            .push(ical_property!("CATEGORIES", escape_text(category)));
    }
    event
}

/// Escape a TEXT value, property values are written as they are.
fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Find the value of a property of an event.
pub trait GetIcalProperty {
    fn get_ical_property_value(&self, name: &str) -> Option<&String>;
}

impl GetIcalProperty for IcalEvent {
    fn get_ical_property_value(&self, name: &str) -> Option<&String> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .and_then(|property| property.value.as_ref())
    }
}

/// Whether a date start property carries `VALUE=DATE`.
pub fn is_all_day(event: &IcalEvent) -> bool {
    let date_param = ical_param!("VALUE", "DATE");
    event
        .properties
        .iter()
        .filter(|property| property.name == "DTSTART")
        .any(|property| {
            property
                .params
                .as_ref()
                .is_some_and(|params| params.contains(&date_param))
        })
}
