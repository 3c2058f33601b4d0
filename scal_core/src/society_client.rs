//! This client harvests the society's event ids and merges their iCalendar files.
//!
//! The monthly programme pages only link to event details, each event has its own
//! iCalendar export. Ids found in all requested months are fetched once per run.

use std::{collections::BTreeSet, sync::OnceLock, time::Duration};

use anyhow::Result;
use chrono::{Datelike, Local, Months, NaiveDate};
use ical::generator::IcalCalendar;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::{cache::PageCache, calendar::build_calendar, merge::merge_sources};

pub static BASE_URL: &str = "https://www.lnhs.org.uk";
static PROD_ID: &str = "-//LNHS Calendar Scraper//EN";
static USER_AGENT: &str = "Mozilla/5.0 (compatible; LNHS Calendar Scraper)";
static EVENT_LINK_PATTERN: &str = r"/eventdetail/(\d+)/";
const PAGE_MAX_AGE: Duration = Duration::from_secs(3600);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SocietyOptions {
    /// Year of the first month, the current year if unset.
    pub year: Option<i32>,
    pub months: u32,
    pub cache: PageCache,
    /// Pause after each downloaded event.
    pub request_delay: Duration,
    pub base_url: String,
}

impl SocietyOptions {
    pub fn new(cache: PageCache) -> Self {
        Self {
            year: None,
            months: 2,
            cache,
            request_delay: Duration::from_millis(500),
            base_url: String::from(BASE_URL),
        }
    }
}

/// Get the merged calendar of all events in the requested months.
pub async fn get(options: &SocietyOptions) -> Result<IcalCalendar> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let today = Local::now().date_naive();
    let windows = month_windows(
        options.year.unwrap_or(today.year()),
        today.month(),
        options.months,
    );
    let mut event_ids: BTreeSet<u64> = BTreeSet::new();
    for (year, month) in windows {
        info!(year, month, "scraping calendar");
        let Some(html) = get_calendar_page(&client, options, year, month).await else {
            continue;
        };
        event_ids.extend(extract_event_ids(&html));
    }
    info!(count = event_ids.len(), "unique events to process");
    let mut sources = vec![];
    for event_id in event_ids {
        if let Some(ics) = get_event_ical(&client, options, event_id).await {
            sources.push(ics);
        }
    }
    let merged = merge_sources(&sources);
    info!(
        events = merged.events.len(),
        skipped = merged.skipped,
        "merged events into calendar"
    );
    Ok(build_calendar(PROD_ID, &[], merged.events))
}

/// Get the programme page of one month, from the cache if it is recent.
async fn get_calendar_page(
    client: &reqwest::Client,
    options: &SocietyOptions,
    year: i32,
    month: u32,
) -> Option<String> {
    let cache_name = format!("calendar_{year}_{month:02}.html");
    if let Some(html) = options.cache.read(&cache_name, Some(PAGE_MAX_AGE)) {
        return Some(html);
    }
    let url = calendar_page_url(&options.base_url, year, month);
    info!(%url, "downloading calendar page");
    match get_text(client, &url).await {
        Ok(html) => {
            if let Err(err) = options.cache.write(&cache_name, &html) {
                warn!(%err, "failed to cache calendar page");
            }
            Some(html)
        }
        Err(err) => {
            warn!(%err, "failed to download calendar page");
            None
        }
    }
}

/// Get the iCalendar export of one event, cached without expiry.
async fn get_event_ical(
    client: &reqwest::Client,
    options: &SocietyOptions,
    event_id: u64,
) -> Option<String> {
    let cache_name = format!("event_{event_id}.ics");
    if let Some(ics) = options.cache.read(&cache_name, None) {
        return Some(ics);
    }
    debug!(event_id, "downloading event");
    let result = get_text(client, &event_ical_url(&options.base_url, event_id)).await;
    tokio::time::sleep(options.request_delay).await;
    match result {
        Ok(ics) => {
            if let Err(err) = options.cache.write(&cache_name, &ics) {
                warn!(%err, "failed to cache event");
            }
            Some(ics)
        }
        Err(err) => {
            warn!(event_id, %err, "failed to download event");
            None
        }
    }
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}

pub fn calendar_page_url(base_url: &str, year: i32, month: u32) -> String {
    format!("{base_url}/index.php/activities/full-programme/monthcalendar/{year}/{month}/-")
}

pub fn event_ical_url(base_url: &str, event_id: u64) -> String {
    format!(
        "{base_url}/index.php/activities/full-programme/icals.icalevent/-?tmpl=component&evid={event_id}"
    )
}

/// Consecutive `(year, month)` pairs starting at the given month.
pub fn month_windows(year: i32, month: u32, count: u32) -> Vec<(i32, u32)> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return vec![];
    };
    (0..count)
        .filter_map(|offset| first.checked_add_months(Months::new(offset)))
        .map(|date| (date.year(), date.month()))
        .collect()
}

/// Extract the ids of all linked events, ascending and without duplicates.
pub fn extract_event_ids(html: &str) -> BTreeSet<u64> {
    static LINK_SELECTOR: OnceLock<Selector> = OnceLock::new();
    static EVENT_LINK: OnceLock<Regex> = OnceLock::new();
    let link_selector =
        LINK_SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("link selector is valid"));
    let event_link = EVENT_LINK
        .get_or_init(|| Regex::new(EVENT_LINK_PATTERN).expect("event link regex is valid"));
    let dom = Html::parse_document(html);
    let event_ids: BTreeSet<u64> = dom
        .select(link_selector)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| event_link.captures(href))
        .filter_map(|captures| captures[1].parse().ok())
        .collect();
    debug!(count = event_ids.len(), "found unique event ids");
    event_ids
}
