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

//! # Flights Results Parser
//!
//! Side-effect free HTML parsing for Southwest `select-depart` result pages.
//! Every field is located through a class or `data-test` marker of the
//! booking page. Optional markers fall back to `None`/`false`; a missing
//! mandatory marker fails the whole page.

use scraper::{ElementRef, Html, Selector};

use crate::error::SearchError;
use crate::flights_model::{
    FareQuote, FareTier, FlightResult, FlightSearchResult, Price, StopCount,
};
use crate::flights_query_builder::SearchRequest;

impl FlightSearchResult {
    pub fn from_html(html: &str, request: SearchRequest) -> Result<Self, SearchError> {
        let flights = parse_flights_response(html)?;
        Ok(Self::new(request, flights))
    }
}

struct FlightSelectors {
    results_container: Selector,
    indicators: Selector,
    span: Selector,
    fastest_badge: Selector,
    lowest_fare_badge: Selector,
    number_of_stops: Selector,
    stops_badge: Selector,
    change_planes: Selector,
    departure_time: Selector,
    arrival_time: Selector,
    duration: Selector,
    fares: Selector,
    fare_tiers: [Selector; 4],
    price: Selector,
    seats_left: Selector,
}

const FASTEST_BADGE_CLASS: &str = "select-detail--fastest-fare-badge";
const LOWEST_FARE_BADGE_CLASS: &str = "select-detail--lowest-fare-badge";

impl FlightSelectors {
    fn new() -> Self {
        Self {
            results_container: Selector::parse(r#"ul#air-search-results-matrix-0"#).unwrap(),
            indicators: Selector::parse(r#"div.select-detail--indicators"#).unwrap(),
            span: Selector::parse("span").unwrap(),
            fastest_badge: Selector::parse(&format!("span.{}", FASTEST_BADGE_CLASS)).unwrap(),
            lowest_fare_badge: Selector::parse(&format!("span.{}", LOWEST_FARE_BADGE_CLASS))
                .unwrap(),
            number_of_stops: Selector::parse(r#"div.select-detail--number-of-stops"#).unwrap(),
            stops_badge: Selector::parse(r#"div.flight-stops-badge.select-detail--flight-stops-badge"#)
                .unwrap(),
            change_planes: Selector::parse(r#"div.select-detail--change-planes"#).unwrap(),
            departure_time: Selector::parse(
                r#"div[data-test="select-detail--origination-time"] span.time--value"#,
            )
            .unwrap(),
            arrival_time: Selector::parse(
                r#"div[data-test="select-detail--destination-time"] span.time--value"#,
            )
            .unwrap(),
            duration: Selector::parse(r#"div.select-detail--flight-duration"#).unwrap(),
            fares: Selector::parse(r#"div.select-detail--fares"#).unwrap(),
            fare_tiers: FareTier::ALL.map(|tier| {
                Selector::parse(&format!(r#"div[data-test="{}"]"#, tier.data_test())).unwrap()
            }),
            price: Selector::parse(r#"span.swa-g-screen-reader-only"#).unwrap(),
            seats_left: Selector::parse(r#"span.seats-left-indicator-text"#).unwrap(),
        }
    }
}

/// Parse every result item of the first results matrix, in page order.
pub fn parse_flights_response(html: &str) -> Result<Vec<FlightResult>, SearchError> {
    let selectors = FlightSelectors::new();
    let document = Html::parse_document(html);

    let container = document
        .select(&selectors.results_container)
        .next()
        .ok_or_else(|| SearchError::MalformedDocument {
            context: "results page".to_string(),
            field: "results container",
        })?;

    let flights = container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|item| item.value().name() == "li")
        .enumerate()
        .map(|(idx, item)| parse_single_flight(item, idx, &selectors))
        .collect::<Result<Vec<_>, _>>()?;

    if flights.is_empty() {
        tracing::warn!("Results container is present but lists no flights");
    }
    Ok(flights)
}

fn parse_single_flight(
    item: ElementRef,
    idx: usize,
    selectors: &FlightSelectors,
) -> Result<FlightResult, SearchError> {
    let missing = |field: &'static str| SearchError::MalformedDocument {
        context: format!("result item #{}", idx + 1),
        field,
    };

    let indicators = item
        .select(&selectors.indicators)
        .next()
        .ok_or_else(|| missing("flight number"))?;

    // Brittle: the flight number has no marker of its own, it is the first
    // non-empty span of the indicators block that is not part of a badge.
    let flight_number = indicators
        .select(&selectors.span)
        .filter(|span| !within_badge(*span, indicators))
        .map(text_of)
        .find(|s| !s.is_empty())
        .ok_or_else(|| missing("flight number"))?;

    let is_fastest = indicators.select(&selectors.fastest_badge).next().is_some();
    let is_lowest_fare = indicators
        .select(&selectors.lowest_fare_badge)
        .next()
        .is_some();

    let number_of_stops = item
        .select(&selectors.number_of_stops)
        .next()
        .ok_or_else(|| missing("stop count"))?;
    let stops_label = number_of_stops
        .select(&selectors.stops_badge)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("stop count"))?;
    let stop_count = parse_stop_count(&stops_label);

    let connection_note = number_of_stops
        .select(&selectors.change_planes)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty());

    let departure_time = item
        .select(&selectors.departure_time)
        .next()
        .map(|el| strip_label(&text_of(el), "Departs"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("departure time"))?;

    let arrival_time = item
        .select(&selectors.arrival_time)
        .next()
        .map(|el| strip_label(&text_of(el), "Arrives"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("arrival time"))?;

    let duration = item
        .select(&selectors.duration)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("duration"))?;

    let fares = parse_fares(item, selectors);

    Ok(FlightResult {
        flight_number,
        is_fastest,
        is_lowest_fare,
        stop_count,
        connection_note,
        departure_time,
        arrival_time,
        duration,
        fares,
    })
}

fn parse_fares(item: ElementRef, selectors: &FlightSelectors) -> [FareQuote; 4] {
    let fares = item.select(&selectors.fares).next();
    if fares.is_none() {
        tracing::debug!("No fares block on result item, every tier unavailable");
    }

    let mut quotes = FareTier::ALL.map(FareQuote::unavailable);
    let Some(fares) = fares else {
        return quotes;
    };

    for (quote, tier_selector) in quotes.iter_mut().zip(&selectors.fare_tiers) {
        let Some(button) = fares.select(tier_selector).next() else {
            continue;
        };
        let Some(price) = button
            .select(&selectors.price)
            .next()
            .map(text_of)
            .and_then(|text| format_price(&text))
        else {
            continue;
        };
        quote.price = Price::Available(price);
        quote.seats_left = button
            .select(&selectors.seats_left)
            .next()
            .map(text_of)
            .filter(|s| !s.is_empty());
    }
    quotes
}

/// `span` is a badge or sits inside one, below `indicators`.
fn within_badge(span: ElementRef, indicators: ElementRef) -> bool {
    std::iter::once(*span)
        .chain(
            span.ancestors()
                .take_while(|node| node.id() != indicators.id()),
        )
        .filter_map(ElementRef::wrap)
        .any(|el| {
            el.value()
                .classes()
                .any(|c| c == FASTEST_BADGE_CLASS || c == LOWEST_FARE_BADGE_CLASS)
        })
}

/// Text content with whitespace runs collapsed.
fn text_of(el: ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop a screen-reader prefix such as "Departs".
fn strip_label(text: &str, label: &str) -> String {
    text.strip_prefix(label)
        .map(str::trim_start)
        .unwrap_or(text)
        .to_string()
}

/// "85 Dollars" -> "$85". A blank marker carries no price.
fn format_price(screen_reader_text: &str) -> Option<String> {
    let amount = screen_reader_text
        .strip_suffix("Dollars")
        .unwrap_or(screen_reader_text)
        .trim();
    if amount.is_empty() {
        return None;
    }
    Some(format!("${}", amount))
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = text.len().checked_sub(suffix.len())?;
    (text.is_char_boundary(cut) && text[cut..].eq_ignore_ascii_case(suffix)).then(|| &text[..cut])
}

fn parse_stop_count(label: &str) -> StopCount {
    if label.eq_ignore_ascii_case("nonstop") {
        return StopCount::Count(0);
    }
    let stripped = strip_suffix_ignore_case(label, " stops")
        .or_else(|| strip_suffix_ignore_case(label, " stop"))
        .unwrap_or(label)
        .trim();
    match stripped.parse() {
        Ok(n) => StopCount::Count(n),
        Err(_) => {
            tracing::warn!("Could not parse number of stops from: '{}'", label);
            StopCount::Literal(stripped.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_count_parsing() {
        assert_eq!(parse_stop_count("Nonstop"), StopCount::Count(0));
        assert_eq!(parse_stop_count("1 stop"), StopCount::Count(1));
        assert_eq!(parse_stop_count("2 stops"), StopCount::Count(2));
        assert_eq!(parse_stop_count("1 Stop"), StopCount::Count(1));
        assert_eq!(parse_stop_count("2 STOPS"), StopCount::Count(2));
        assert_eq!(
            parse_stop_count("1 stop, change planes"),
            StopCount::Literal("1 stop, change planes".to_string())
        );
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("85 Dollars").as_deref(), Some("$85"));
        assert_eq!(format_price("1,204 Dollars").as_deref(), Some("$1,204"));
        assert_eq!(format_price(""), None);
        assert_eq!(format_price(" Dollars"), None);
    }

    #[test]
    fn test_badge_spans_are_not_flight_numbers() {
        let html = Html::parse_fragment(
            r#"<div class="select-detail--indicators">
                <span class="select-detail--fastest-fare-badge"><span>Fastest</span></span>
                <span></span>
                <span class="flight-numbers--flight-number">#1435</span>
            </div>"#,
        );
        let indicators = html
            .select(&Selector::parse("div").unwrap())
            .next()
            .unwrap();
        let texts: Vec<String> = indicators
            .select(&Selector::parse("span").unwrap())
            .filter(|span| !within_badge(*span, indicators))
            .map(text_of)
            .collect();
        assert_eq!(texts, vec!["".to_string(), "#1435".to_string()]);
    }

    #[test]
    fn test_strip_label() {
        assert_eq!(strip_label("Departs 6:05AM", "Departs"), "6:05AM");
        assert_eq!(strip_label("6:05AM", "Departs"), "6:05AM");
    }

    #[test]
    fn test_text_collapses_whitespace() {
        let html = Html::parse_fragment("<div><span>  2h\n   45m </span></div>");
        let sel = Selector::parse("span").unwrap();
        let el = html.select(&sel).next().unwrap();
        assert_eq!(text_of(el), "2h 45m");
    }

    #[test]
    fn test_missing_container_is_malformed() {
        let err = parse_flights_response("<html><body><p>Loading...</p></body></html>")
            .unwrap_err();
        assert!(matches!(
            err,
            SearchError::MalformedDocument {
                field: "results container",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_container_yields_no_flights() {
        let flights = parse_flights_response(
            r#"<html><body><ul id="air-search-results-matrix-0"></ul></body></html>"#,
        )
        .unwrap();
        assert!(flights.is_empty());
    }
}
