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

//! # Flights Result Model
//!
//! Typed flight and fare records, the aggregate a search returns, and its
//! text and JSON renderings.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::SearchError;
use crate::flights_query_builder::SearchRequest;

/// The four fare classes, in the order the booking page shows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FareTier {
    BusinessSelect,
    Anytime,
    WannaGetAwayPlus,
    WannaGetAway,
}

impl FareTier {
    pub const ALL: [FareTier; 4] = [
        FareTier::BusinessSelect,
        FareTier::Anytime,
        FareTier::WannaGetAwayPlus,
        FareTier::WannaGetAway,
    ];

    /// `data-test` marker of the tier's fare button.
    pub fn data_test(self) -> &'static str {
        match self {
            FareTier::BusinessSelect => "fare-button--business-select",
            FareTier::Anytime => "fare-button--anytime",
            FareTier::WannaGetAwayPlus => "fare-button--wanna-get-away-plus",
            FareTier::WannaGetAway => "fare-button--wanna-get-away",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FareTier::BusinessSelect => "Business Select",
            FareTier::Anytime => "Anytime",
            FareTier::WannaGetAwayPlus => "Wanna Get Away Plus",
            FareTier::WannaGetAway => "Wanna Get Away",
        }
    }
}

static PRICE_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$\s*(\d[\d,]*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Price {
    /// Currency-prefixed, as rendered: `$85`.
    Available(String),
    Unavailable,
}

impl Price {
    /// Whole dollars, when the price is available and numeric.
    pub fn amount(&self) -> Option<u32> {
        match self {
            Price::Available(text) => PRICE_AMOUNT_RE
                .captures(text.trim())
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().replace(',', "").parse().ok()),
            Price::Unavailable => None,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Available(text) => f.write_str(text),
            Price::Unavailable => f.write_str("Unavailable"),
        }
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Stop count. Labels that are not a clean number are kept as written
/// rather than guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StopCount {
    Count(u32),
    Literal(String),
}

impl fmt::Display for StopCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCount::Count(n) => write!(f, "{}", n),
            StopCount::Literal(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FareQuote {
    pub tier: FareTier,
    pub price: Price,
    /// `None` when the page shows no seats-left indicator.
    pub seats_left: Option<String>,
}

impl FareQuote {
    pub(crate) fn unavailable(tier: FareTier) -> Self {
        Self {
            tier,
            price: Price::Unavailable,
            seats_left: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightResult {
    pub flight_number: String,
    pub is_fastest: bool,
    pub is_lowest_fare: bool,
    pub stop_count: StopCount,
    /// e.g. "Change planes DEN"; `None` when not shown.
    pub connection_note: Option<String>,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    /// Always one quote per tier, in `FareTier::ALL` order.
    pub fares: [FareQuote; 4],
}

impl FlightResult {
    pub fn fare(&self, tier: FareTier) -> &FareQuote {
        // fares is built from FareTier::ALL so the positions line up
        &self.fares[FareTier::ALL.iter().position(|t| *t == tier).unwrap_or(0)]
    }

    /// Cheapest available tier of this flight.
    pub fn cheapest_fare(&self) -> Option<(FareTier, u32)> {
        self.fares
            .iter()
            .filter_map(|q| q.price.amount().map(|amount| (q.tier, amount)))
            .min_by_key(|(_, amount)| *amount)
    }
}

const NOT_APPLICABLE: &str = "N/A";

impl fmt::Display for FlightResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "############### Flight Number: {} ###############",
            self.flight_number
        )?;
        writeln!(f, "Fastest: {}", self.is_fastest)?;
        writeln!(f, "Low Fare: {}", self.is_lowest_fare)?;
        writeln!(f, "Number of Stops: {}", self.stop_count)?;
        writeln!(
            f,
            "Change Planes: {}",
            self.connection_note.as_deref().unwrap_or(NOT_APPLICABLE)
        )?;
        writeln!(f, "Departure Time: {}", self.departure_time)?;
        writeln!(f, "Arrival Time: {}", self.arrival_time)?;
        writeln!(f, "Duration: {}", self.duration)?;
        writeln!(f, "Prices:")?;
        for quote in &self.fares {
            writeln!(
                f,
                "  - {}: {} ({})",
                quote.tier.label(),
                quote.price,
                quote.seats_left.as_deref().unwrap_or(NOT_APPLICABLE)
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightSearchResult {
    pub request: SearchRequest,
    /// Page order, never re-sorted.
    pub flights: Vec<FlightResult>,
}

impl FlightSearchResult {
    pub fn new(request: SearchRequest, flights: Vec<FlightResult>) -> Self {
        Self { request, flights }
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Lowest numeric, available price across every flight and tier, in
    /// whole dollars.
    pub fn cheapest_fare(&self) -> Result<u32, SearchError> {
        if self.flights.is_empty() {
            return Err(SearchError::EmptyResultSet(
                "no flights to compare".to_string(),
            ));
        }
        self.flights
            .iter()
            .filter_map(FlightResult::cheapest_fare)
            .map(|(_, amount)| amount)
            .min()
            .ok_or_else(|| {
                SearchError::EmptyResultSet(format!(
                    "none of the {} flights has an available fare",
                    self.flights.len()
                ))
            })
    }

    /// The flight holding the cheapest fare, first in page order on ties.
    pub fn cheapest_flight(&self) -> Result<(&FlightResult, FareTier, u32), SearchError> {
        let target = self.cheapest_fare()?;
        self.flights
            .iter()
            .find_map(|flight| {
                flight
                    .fares
                    .iter()
                    .find(|q| q.price.amount() == Some(target))
                    .map(|q| (flight, q.tier, target))
            })
            .ok_or_else(|| SearchError::EmptyResultSet("cheapest fare vanished".to_string()))
    }

    pub fn to_api_response(&self) -> FlightsApiResponse<'_> {
        FlightsApiResponse {
            departure_date: self.request.departure_date.format("%Y-%m-%d").to_string(),
            origination_airport: &self.request.origination_airport,
            destination_airport: &self.request.destination_airport,
            passenger_count: self.request.passenger_count,
            adult_count: self.request.adult_count,
            total_flights: self.flights.len(),
            cheapest_fare: self.cheapest_fare().ok(),
            flights: &self.flights,
        }
    }
}

impl fmt::Display for FlightSearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request = &self.request;
        writeln!(f, "Departure Date: {}", request.departure_date.format("%Y-%m-%d"))?;
        writeln!(f, "Origination Airport: {}", request.origination_airport)?;
        writeln!(f, "Destination Airport: {}", request.destination_airport)?;
        writeln!(f, "Passenger Count: {}", request.passenger_count)?;
        writeln!(f, "Adult Count: {}", request.adult_count)?;
        writeln!(f, "Total Flights Available: {}", self.flights.len())?;
        match self.cheapest_fare() {
            Ok(amount) => writeln!(f, "Cheapest Flight Price: ${}", amount)?,
            Err(_) => writeln!(f, "Cheapest Flight Price: {}", NOT_APPLICABLE)?,
        }
        for flight in &self.flights {
            writeln!(f)?;
            write!(f, "{}", flight)?;
        }
        Ok(())
    }
}

/// JSON shape returned to callers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FlightsApiResponse<'a> {
    pub departure_date: String,
    pub origination_airport: &'a str,
    pub destination_airport: &'a str,
    pub passenger_count: u32,
    pub adult_count: u32,
    pub total_flights: usize,
    pub cheapest_fare: Option<u32>,
    pub flights: &'a [FlightResult],
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request() -> SearchRequest {
        SearchRequest::builder(
            "SAN".to_string(),
            "DAL".to_string(),
            NaiveDate::from_ymd_opt(2024, 4, 22).unwrap(),
        )
        .build()
        .unwrap()
    }

    fn price(s: &str) -> Price {
        if s == "unavailable" {
            Price::Unavailable
        } else {
            Price::Available(s.to_string())
        }
    }

    /// One flight whose four tiers carry `prices` in tier order.
    fn flight(number: &str, prices: [&str; 4]) -> FlightResult {
        let fares = [0usize, 1, 2, 3].map(|i| FareQuote {
            tier: FareTier::ALL[i],
            price: price(prices[i]),
            seats_left: None,
        });
        FlightResult {
            flight_number: number.to_string(),
            is_fastest: false,
            is_lowest_fare: false,
            stop_count: StopCount::Count(0),
            connection_note: None,
            departure_time: "6:00AM".to_string(),
            arrival_time: "10:45AM".to_string(),
            duration: "2h 45m".to_string(),
            fares,
        }
    }

    #[test]
    fn test_price_amount() {
        assert_eq!(price("$85").amount(), Some(85));
        assert_eq!(price("$1,204").amount(), Some(1204));
        assert_eq!(price("$ 99").amount(), Some(99));
        assert_eq!(price("Sold out").amount(), None);
        assert_eq!(Price::Unavailable.amount(), None);
    }

    #[test]
    fn test_cheapest_ignores_unavailable() {
        let result = FlightSearchResult::new(
            request(),
            vec![
                flight("#100", ["$100", "unavailable", "unavailable", "unavailable"]),
                flight("#200", ["unavailable", "unavailable", "unavailable", "$85"]),
            ],
        );
        assert_eq!(result.cheapest_fare().unwrap(), 85);

        let (flight, tier, amount) = result.cheapest_flight().unwrap();
        assert_eq!(flight.flight_number, "#200");
        assert_eq!(tier, FareTier::WannaGetAway);
        assert_eq!(amount, 85);
    }

    #[test]
    fn test_cheapest_all_unavailable_fails() {
        let result = FlightSearchResult::new(
            request(),
            vec![flight(
                "#100",
                ["unavailable", "unavailable", "unavailable", "unavailable"],
            )],
        );
        assert!(matches!(
            result.cheapest_fare(),
            Err(SearchError::EmptyResultSet(_))
        ));
    }

    #[test]
    fn test_cheapest_no_flights_fails() {
        let result = FlightSearchResult::new(request(), Vec::new());
        assert!(result.is_empty());
        assert!(matches!(
            result.cheapest_fare(),
            Err(SearchError::EmptyResultSet(_))
        ));
    }

    #[test]
    fn test_rendering_lists_tiers_in_order() {
        let mut f = flight("#1435", ["$310", "$290", "unavailable", "$129"]);
        f.fares[3].seats_left = Some("2 left".to_string());
        f.connection_note = Some("Change planes DEN".to_string());
        let result = FlightSearchResult::new(request(), vec![f]);

        let text = result.to_string();
        let expected = "\
Departure Date: 2024-04-22
Origination Airport: SAN
Destination Airport: DAL
Passenger Count: 1
Adult Count: 1
Total Flights Available: 1
Cheapest Flight Price: $129

############### Flight Number: #1435 ###############
Fastest: false
Low Fare: false
Number of Stops: 0
Change Planes: Change planes DEN
Departure Time: 6:00AM
Arrival Time: 10:45AM
Duration: 2h 45m
Prices:
  - Business Select: $310 (N/A)
  - Anytime: $290 (N/A)
  - Wanna Get Away Plus: Unavailable (N/A)
  - Wanna Get Away: $129 (2 left)
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_api_response_shape() {
        let result = FlightSearchResult::new(
            request(),
            vec![flight("#1435", ["$310", "$290", "unavailable", "$129"])],
        );
        let json = serde_json::to_value(result.to_api_response()).unwrap();
        assert_eq!(json["departure_date"], "2024-04-22");
        assert_eq!(json["cheapest_fare"], 129);
        assert_eq!(json["flights"][0]["stop_count"], 0);
        assert_eq!(json["flights"][0]["fares"][2]["price"], "Unavailable");
        assert_eq!(json["flights"][0]["fares"][2]["tier"], "wanna_get_away_plus");
        assert!(json["flights"][0]["fares"][2]["seats_left"].is_null());
    }
}
