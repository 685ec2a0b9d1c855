//!  Swoop Fare Scraper
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! CLI for Southwest one-way fare search.

use std::cmp::max;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use swoop_fare_scraper::{
    parse_departure_date, FileDebugSink, FlightResult, FlightSearchResult, SearchRequest,
    SouthwestFlightsClient, WebDriverLauncher, DEFAULT_WEBDRIVER_URL,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Full per-flight report
    Text,
    /// One line per flight, cheapest tier only
    Table,
    /// Machine readable
    Json,
}

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "swoop-flights")]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Origin airport code (e.g., SAN, LAX)
    #[arg(short, long)]
    from: String,

    /// Destination airport code (e.g., DAL, PHX)
    #[arg(short, long)]
    to: String,

    /// Departure date (YYYY-MM-DD or YYYY/MM/DD)
    #[arg(short, long)]
    date: String,

    /// Number of passengers
    #[arg(short, long, default_value = "1")]
    passengers: u32,

    /// Number of adults among the passengers
    #[arg(short, long, default_value = "1")]
    adults: u32,

    /// WebDriver (chromedriver) endpoint
    #[arg(long, env = "SWOOP_WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    /// Show the browser window
    #[arg(long, default_value = "false")]
    headed: bool,

    /// Save the rendered results page into this directory for debugging
    #[arg(long)]
    save_html: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

/// Configure logging based on verbosity level
fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Get terminal width for responsive tables
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(100)
}

fn dash_bar() -> String {
    "-".repeat(get_terminal_width().min(100))
}

fn fmt_times(flight: &FlightResult) -> String {
    format!("{} → {}", flight.departure_time, flight.arrival_time)
}

fn fmt_stops(flight: &FlightResult) -> String {
    let stops = match flight.stop_count.to_string().as_str() {
        "0" => "nonstop".to_string(),
        "1" => "1 stop".to_string(),
        n => format!("{} stops", n),
    };
    match &flight.connection_note {
        Some(note) => format!("{} ({})", stops, note),
        None => stops,
    }
}

fn fmt_cheapest(flight: &FlightResult) -> String {
    match flight.cheapest_fare() {
        Some((tier, amount)) => format!("${} {}", amount, tier.label()),
        None => "sold out".to_string(),
    }
}

/// Calculate terminal-aware column widths
fn calc_column_widths(flights: &[FlightResult]) -> (usize, usize, usize, usize) {
    let mut max_number = 6;
    let mut max_times = 15;
    let mut max_duration = 8;
    let mut max_stops = 10;

    for flight in flights {
        max_number = max(max_number, flight.flight_number.chars().count());
        max_times = max(max_times, fmt_times(flight).chars().count());
        max_duration = max(max_duration, flight.duration.chars().count());
        max_stops = max(max_stops, fmt_stops(flight).chars().count());
    }

    let available_width = get_terminal_width().saturating_sub(40);
    let total_content = max_number + max_times + max_duration + max_stops;
    if total_content > available_width && available_width > 40 {
        // The stops column carries the connection note, shrink it first
        let overflow = total_content - available_width;
        max_stops = max(max_stops.saturating_sub(overflow), 10);
    }

    (max_number, max_times, max_duration, max_stops)
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Render results to stdout as a table
fn render_table(result: &FlightSearchResult, search_url: &str) {
    let request = &result.request;
    println!(
        "================================================================================================\n  🛫  {} → {} on {}\n================================================================================================\n",
        request.origination_airport,
        request.destination_airport,
        request.departure_date.format("%Y-%m-%d")
    );

    match result.cheapest_fare() {
        Ok(amount) => println!("💰 Best Price:  ${}", amount),
        Err(_) => println!("💰 Best Price:  N/A"),
    }
    println!("📊 Total Flights: {}", result.len());
    println!("\n🔗 Search URL: {}", search_url);

    if result.is_empty() {
        return;
    }

    let (nw, tw, dw, sw) = calc_column_widths(&result.flights);
    println!("{}\n", dash_bar());
    println!(
        "  {:<nw$}  {:<tw$}  {:<dw$}  {:<sw$}   CHEAPEST",
        "FLIGHT", "DEP → ARR", "DURATION", "STOPS"
    );
    println!("{}\n", dash_bar());

    for flight in &result.flights {
        let mut badges = String::new();
        if flight.is_fastest {
            badges.push_str(" ⚡");
        }
        if flight.is_lowest_fare {
            badges.push_str(" 🏷️");
        }
        println!(
            "  {:<nw$}  {:<tw$}  {:<dw$}  {:<sw$}   {}{}",
            truncate(&flight.flight_number, nw),
            fmt_times(flight),
            flight.duration,
            truncate(&fmt_stops(flight), sw),
            fmt_cheapest(flight),
            badges
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    tracing::info!("Starting swoop-flights CLI");
    tracing::debug!("Args: {:?}", args);

    let departure_date = parse_departure_date(&args.date)?;
    let request = SearchRequest::builder(
        args.from.to_uppercase(),
        args.to.to_uppercase(),
        departure_date,
    )
    .passengers(args.passengers)
    .adults(args.adults)
    .build()
    .context("Failed to build search request")?;

    let search_url = request.get_search_url()?;
    tracing::debug!("Generated search URL ({} chars)", search_url.len());

    let launcher = WebDriverLauncher {
        headless: !args.headed,
        ..WebDriverLauncher::new(args.webdriver_url.clone())
    };
    let mut client = SouthwestFlightsClient::new(launcher);
    if let Some(dir) = &args.save_html {
        client = client.with_debug_sink(Arc::new(FileDebugSink::new(dir)));
    }

    let result = client
        .search_flights(&request)
        .await
        .context("Search failed")?;

    tracing::info!("Search completed: {} flights found", result.len());

    match args.format {
        OutputFormat::Text => print!("{}", result),
        OutputFormat::Table => render_table(&result, &search_url),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&result.to_api_response())
                .context("Failed to serialize results")?
        ),
    }

    Ok(())
}
