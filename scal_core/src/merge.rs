//! Merge already formatted source calendars without changing their events.

use std::io::{BufReader, Cursor};

use anyhow::Result;
use ical::{generator::IcalEvent, IcalParser};
use tracing::warn;

/// Events of all source calendars which could be parsed.
#[derive(Debug, Default)]
pub struct Merged {
    pub events: Vec<IcalEvent>,
    /// Number of source calendars which were skipped.
    pub skipped: usize,
}

impl Merged {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Collect the events of every source calendar.
///
/// A malformed source is logged and skipped, the other sources are still merged.
pub fn merge_sources<S: AsRef<str>>(sources: &[S]) -> Merged {
    let mut merged = Merged::default();
    for (index, source) in sources.iter().enumerate() {
        match parse_events(source.as_ref()) {
            Ok(events) => merged.events.extend(events),
            Err(err) => {
                warn!(index, %err, "skipping malformed source calendar");
                merged.skipped += 1;
            }
        }
    }
    merged
}

/// Parse all events of one source, failing on the first malformed calendar.
fn parse_events(ics: &str) -> Result<Vec<IcalEvent>> {
    let parser = IcalParser::new(BufReader::new(Cursor::new(ics)));
    let mut events = vec![];
    for ical_calendar_result in parser {
        let ical_calendar = ical_calendar_result?;
        events.extend(ical_calendar.events);
    }
    Ok(events)
}
