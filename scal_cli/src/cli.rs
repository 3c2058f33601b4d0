//! This module implements the CLI part of the application.

use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scal_core::{
    cache::PageCache,
    ical::generator::Emitter,
    record::FragmentOutcome,
    society_client::{self, SocietyOptions},
    stream::WasteStreamBitmask,
    waste_client::{self, WasteCalendar, WasteOptions},
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Turn scraped calendar pages into iCalendar files")]
pub struct Arguments {
    /// enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract waste collection dates from the Brent Council bin day page
    Waste {
        #[command(flatten)]
        args: WasteArgs,
    },
    /// Merge the London Natural History Society programme into one calendar
    Society {
        #[command(flatten)]
        args: SocietyArgs,
    },
}

#[derive(Debug, Args)]
pub struct WasteArgs {
    /// the property id, or a saved bin day page ending in `.html`
    #[arg(env = "BRENT_PROPERTY_ID")]
    pub property_id: String,
    /// the calendar file to write, none is written if unset
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// also add the last collection dates
    #[arg(long)]
    pub include_last: bool,
    /// save every fetched page in this directory
    #[arg(long, env = "SCAL_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
    /// exclude refuse collection dates
    #[arg(long)]
    pub exclude_refuse: bool,
    /// exclude recycling collection dates
    #[arg(long)]
    pub exclude_recycling: bool,
    /// exclude food waste collection dates
    #[arg(long)]
    pub exclude_food: bool,
    /// exclude garden waste collection dates
    #[arg(long)]
    pub exclude_garden: bool,
}

impl From<&WasteArgs> for WasteStreamBitmask {
    fn from(value: &WasteArgs) -> Self {
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

#[derive(Debug, Args)]
pub struct SocietyArgs {
    /// the year of the first month, defaults to the current year
    #[arg(long)]
    pub year: Option<i32>,
    /// the number of months to scrape
    #[arg(long, default_value_t = 2)]
    pub months: u32,
    /// the calendar file to write
    #[arg(long, default_value = "lnhs_events.ics")]
    pub output: PathBuf,
    /// the directory of downloaded pages
    #[arg(long, env = "SCAL_CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,
    /// download everything again
    #[arg(long)]
    pub no_cache: bool,
}

pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Waste { args } => run_waste(args).await?,
        Command::Society { args } => run_society(args).await?,
    };
    Ok(())
}

async fn run_waste(args: WasteArgs) -> Result<()> {
    let options = WasteOptions {
        include_last: args.include_last,
        excluded_streams: WasteStreamBitmask::from(&args),
        cache: args
            .cache_dir
            .as_ref()
            .map(|cache_dir| PageCache::new(cache_dir, false)),
        ..WasteOptions::default()
    };
    let waste_calendar = if args.property_id.ends_with(".html") {
        info!(path = %args.property_id, "reading saved bin day page");
        let html = read_to_string(&args.property_id)
            .with_context(|| format!("failed to read {}", args.property_id))?;
        Some(waste_client::from_html(&html, &options))
    } else {
        info!(property_id = %args.property_id, "extracting waste collection dates");
        waste_client::get(&args.property_id, &options).await?
    };
    let Some(waste_calendar) = waste_calendar else {
        println!("No collection data found.");
        println!("The property ID may be invalid or the service may be unavailable.");
        return Ok(());
    };
    report(&waste_calendar);
    if let Some(output) = args.output {
        write(&output, waste_calendar.calendar.generate())
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("Saved iCal format to: {}", output.display());
    }
    Ok(())
}

fn report(waste_calendar: &WasteCalendar) {
    let page = &waste_calendar.page;
    if page.fragments.is_empty() && !page.loose_dates.is_empty() {
        println!("Found {} dates without a service:", page.loose_dates.len());
        for (number, date) in page.loose_dates.iter().enumerate() {
            println!("{:2}. {date}", number + 1);
        }
    }
    println!("Found {} collection dates:", page.fragments.len());
    for (number, fragment) in page.fragments.iter().enumerate() {
        println!("{:2}. {}: {}", number + 1, fragment.label, fragment.text);
    }
    for outcome in &waste_calendar.assembly.outcomes {
        if let FragmentOutcome::Unparseable(err) = outcome {
            warn!(%err, "skipping collection date");
        }
    }
    if waste_calendar.assembly.is_empty() {
        println!("No events.");
    } else {
        println!("{} events:", waste_calendar.assembly.records.len());
        for record in &waste_calendar.assembly.records {
            println!("    {}: {}", record.start, record.summary);
        }
    }
}

async fn run_society(args: SocietyArgs) -> Result<()> {
    let options = SocietyOptions {
        year: args.year,
        months: args.months,
        ..SocietyOptions::new(PageCache::new(&args.cache_dir, !args.no_cache))
    };
    let calendar = society_client::get(&options).await?;
    write(&args.output, calendar.generate())
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "Successfully generated calendar with {} events: {}",
        calendar.events.len(),
        args.output.display()
    );
    Ok(())
}
