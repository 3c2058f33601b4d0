//! This client polls the council's bin day page and turns it into a waste calendar.
//!
//! The page is rendered lazily: it says `Loading your bin days...` until the
//! collection data is ready, so it is polled a bounded number of times.

use std::{collections::BTreeSet, sync::OnceLock, time::Duration};

use anyhow::Result;
use ical::generator::IcalCalendar;
use regex::Regex;
use reqwest::header::REFERER;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::{
    cache::PageCache,
    calendar::build_calendar,
    record::{Assembler, Assembly, RawFragment},
    stream::{retain_streams, WasteStreamBitmask},
};

pub static BASE_URL: &str = "https://recyclingservices.brent.gov.uk/waste";
static PROD_ID: &str = "-//Brent Council//Waste Collection Schedule//EN";
static LOADING_MARKER: &str = "Loading your bin days...";
static NEXT_COLLECTION: &str = "Next collection";
static LAST_COLLECTION: &str = "Last collection";
const LOADING_DELAY: Duration = Duration::from_secs(3);
const RETRY_DELAY: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct WasteOptions {
    /// Also turn the last collections into events.
    pub include_last: bool,
    pub excluded_streams: WasteStreamBitmask,
    /// Where each fetched page is saved for inspection.
    pub cache: Option<PageCache>,
    pub max_attempts: u32,
    pub base_url: String,
}

impl Default for WasteOptions {
    fn default() -> Self {
        Self {
            include_last: false,
            excluded_streams: WasteStreamBitmask::none(),
            cache: None,
            max_attempts: 10,
            base_url: String::from(BASE_URL),
        }
    }
}

/// The text which could be extracted from the bin day page.
#[derive(Debug, Default, PartialEq)]
pub struct ScrapedPage {
    pub fragments: Vec<RawFragment>,
    /// Dates found anywhere in the page when no service was found, informational only.
    pub loose_dates: Vec<String>,
}

impl ScrapedPage {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.loose_dates.is_empty()
    }
}

#[derive(Debug)]
pub struct WasteCalendar {
    pub page: ScrapedPage,
    pub assembly: Assembly,
    pub calendar: IcalCalendar,
}

/// Get the waste calendar of a property, `None` if no data could be fetched.
pub async fn get(property_id: &str, options: &WasteOptions) -> Result<Option<WasteCalendar>> {
    let Some(page) = fetch(property_id, options).await? else {
        return Ok(None);
    };
    Ok(Some(get_calendar(page, options, Assembler::now())))
}

/// Get the waste calendar of a saved bin day page.
pub fn from_html(html: &str, options: &WasteOptions) -> WasteCalendar {
    get_calendar(parse(html, options.include_last), options, Assembler::now())
}

fn get_calendar(page: ScrapedPage, options: &WasteOptions, assembler: Assembler) -> WasteCalendar {
    let fragments = retain_streams(page.fragments.clone(), options.excluded_streams);
    let assembly = assembler.assemble(&fragments);
    let calendar = build_calendar(PROD_ID, &assembly.records, vec![]);
    WasteCalendar {
        page,
        assembly,
        calendar,
    }
}

/// Poll the bin day page until it has loaded.
pub async fn fetch(property_id: &str, options: &WasteOptions) -> Result<Option<ScrapedPage>> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let url = format!("{}/{property_id}", options.base_url);
    for attempt in 1..=options.max_attempts {
        info!(attempt, max_attempts = options.max_attempts, "fetching collection data");
        let response = client
            .get(format!("{url}?page_loading=1"))
            .header(REFERER, &url)
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(html) => {
                    if let Some(cache) = &options.cache {
                        let name = format!("brent_waste_{property_id}_attempt_{attempt}.html");
                        if let Err(err) = cache.write(&name, &html) {
                            warn!(%err, "failed to save page");
                        }
                    }
                    if html.contains(LOADING_MARKER) {
                        info!("still loading");
                        tokio::time::sleep(LOADING_DELAY).await;
                        continue;
                    }
                    let page = parse(&html, options.include_last);
                    if !page.is_empty() {
                        return Ok(Some(page));
                    }
                    info!("no collection data found in response");
                }
                Err(err) => warn!(%err, "failed to read response"),
            },
            Ok(response) => warn!(status = %response.status(), "unexpected response"),
            Err(err) => warn!(%err, "request failed"),
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
    Ok(None)
}

fn collapse_whitespace(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE
        .get_or_init(|| Regex::new(r"\s+").expect("whitespace regex is valid"))
        .replace_all(text.trim(), " ")
        .into_owned()
}

fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Parse the bin day page into `(service, date text)` fragments.
pub fn parse(html: &str, include_last: bool) -> ScrapedPage {
    static SERVICE_SELECTOR: OnceLock<Selector> = OnceLock::new();
    static TERM_SELECTOR: OnceLock<Selector> = OnceLock::new();
    let service_selector = SERVICE_SELECTOR.get_or_init(|| {
        Selector::parse("h3.waste-service-name").expect("service selector is valid")
    });
    let term_selector = TERM_SELECTOR
        .get_or_init(|| Selector::parse("dt, dd").expect("term selector is valid"));
    let dom = Html::parse_document(html);
    let mut fragments = vec![];
    for service in dom.select(service_selector) {
        let service_name = element_text(service);
        let Some(details) = service
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|element| {
                element.value().name() == "div"
                    && element.value().classes().any(|class| class == "govuk-grid-row")
            })
        else {
            continue;
        };
        let mut label: Option<String> = None;
        for term in details.select(term_selector) {
            let text = element_text(term);
            if term.value().name() == "dt" {
                label = if text == NEXT_COLLECTION {
                    Some(service_name.clone())
                } else if include_last && text == LAST_COLLECTION {
                    Some(format!("{service_name} (last)"))
                } else {
                    None
                };
            } else if let Some(label) = label.take() {
                if !text.is_empty() {
                    fragments.push(RawFragment::new(label, text));
                }
            }
        }
    }
    let loose_dates = if fragments.is_empty() {
        find_loose_dates(&dom.root_element().text().collect::<String>())
    } else {
        vec![]
    };
    ScrapedPage {
        fragments,
        loose_dates,
    }
}

/// Find anything looking like a date in the page text.
fn find_loose_dates(text: &str) -> Vec<String> {
    static DATE_PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    let date_patterns = DATE_PATTERNS.get_or_init(|| {
        let month = "(?:January|February|March|April|May|June|July|August|September|October|November|December)";
        [
            Regex::new(&format!(
                r"(?i)\b(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday),?\s+\d{{1,2}}(?:st|nd|rd|th)?\s+{month}(?:\s+\d{{4}})?\b"
            ))
            .expect("weekday date regex is valid"),
            Regex::new(&format!(r"(?i)\b\d{{1,2}}(?:st|nd|rd|th)?\s+{month}\s+\d{{4}}\b"))
                .expect("date regex is valid"),
        ]
    });
    let found: BTreeSet<String> = date_patterns
        .iter()
        .flat_map(|pattern| pattern.find_iter(text))
        .map(|found| collapse_whitespace(found.as_str()))
        .collect();
    found.into_iter().collect()
}
