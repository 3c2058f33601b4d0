//! This crate turns scraped calendar text into iCalendar files.
//!
//! Two sources are supported: the bin day page of Brent Council, whose loosely written
//! collection dates are normalized and grouped by day, and the programme of the London
//! Natural History Society, whose per event iCalendar files are merged unchanged.

pub use ical;

pub mod cache;
pub mod calendar;
pub mod merge;
pub mod moment;
pub mod record;
pub mod society_client;
pub mod stream;
pub mod waste_client;
