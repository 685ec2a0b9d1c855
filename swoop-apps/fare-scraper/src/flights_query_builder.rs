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

//! # Flights Query Builder
//!
//! Side-effect free mapping from a search request onto the query string
//! contract of the Southwest `select-depart` booking page.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

pub const SEARCH_ENDPOINT: &str = "https://www.southwest.com/air/booking/select-depart.html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub departure_date: NaiveDate,
    pub origination_airport: String,
    pub destination_airport: String,
    pub passenger_count: u32,
    pub adult_count: u32,
}

/// Search request as it arrives over JSON, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub struct SearchInput {
    /// Departure date, YYYY-MM-DD
    pub departure_date: String,
    /// Origin airport 3-letter code (SAN, LAX, SFO)
    pub origination: String,
    /// Destination airport 3-letter code (DAL, PHX, LGA)
    pub destination: String,
    #[serde(default = "one")]
    pub passenger_count: u32,
    #[serde(default = "one")]
    pub adult_count: u32,
}

fn one() -> u32 {
    1
}

impl SearchInput {
    pub fn into_request(self) -> Result<SearchRequest, SearchError> {
        let date = parse_departure_date(&self.departure_date)?;
        SearchRequest::builder(self.origination, self.destination, date)
            .passengers(self.passenger_count)
            .adults(self.adult_count)
            .build()
    }
}

/// Accepts `YYYY-MM-DD` and `YYYY/MM/DD`.
pub fn parse_departure_date(s: &str) -> Result<NaiveDate, SearchError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .map_err(|_| SearchError::invalid(format!("unparseable departure date: {:?}", s)))
}

fn is_airport_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

impl SearchRequest {
    pub fn validate(&self) -> Result<(), SearchError> {
        if !is_airport_code(&self.origination_airport) {
            return Err(SearchError::invalid(format!(
                "origin airport must be 3 uppercase letters, got {:?}",
                self.origination_airport
            )));
        }
        if !is_airport_code(&self.destination_airport) {
            return Err(SearchError::invalid(format!(
                "destination airport must be 3 uppercase letters, got {:?}",
                self.destination_airport
            )));
        }
        if self.passenger_count == 0 {
            return Err(SearchError::invalid("at least one passenger is required"));
        }
        if self.adult_count == 0 {
            return Err(SearchError::invalid("at least one adult is required"));
        }
        if self.adult_count > self.passenger_count {
            return Err(SearchError::invalid(format!(
                "cannot have more adults ({}) than passengers ({})",
                self.adult_count, self.passenger_count
            )));
        }
        Ok(())
    }

    /// Query parameters in the order the booking site emits them.
    pub fn query_pairs(&self) -> Result<Vec<(&'static str, String)>, SearchError> {
        self.validate()?;
        let date = self.departure_date.format("%Y-%m-%d").to_string();
        Ok(vec![
            ("adultPassengersCount", self.passenger_count.to_string()),
            ("adultsCount", self.adult_count.to_string()),
            ("departureDate", date),
            ("departureTimeOfDay", "ALL_DAY".to_string()),
            ("destinationAirportCode", self.destination_airport.clone()),
            ("fareType", "USD".to_string()),
            ("from", self.origination_airport.clone()),
            ("int", "HOMEQBOMAIR".to_string()),
            ("originationAirportCode", self.origination_airport.clone()),
            ("passengerType", "ADULT".to_string()),
            ("reset", "true".to_string()),
            ("returnDate", String::new()),
            ("returnTimeOfDay", "ALL_DAY".to_string()),
            ("to", self.destination_airport.clone()),
            ("tripType", "oneway".to_string()),
        ])
    }

    pub fn get_search_url(&self) -> Result<String, SearchError> {
        let query = self
            .query_pairs()?
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        Ok(format!("{}?{}", SEARCH_ENDPOINT, query))
    }

    pub fn builder(
        origination_airport: String,
        destination_airport: String,
        departure_date: NaiveDate,
    ) -> SearchRequestBuilder {
        SearchRequestBuilder {
            origination_airport,
            destination_airport,
            departure_date,
            passenger_count: 1,
            adult_count: 1,
        }
    }
}

#[derive(Clone)]
pub struct SearchRequestBuilder {
    origination_airport: String,
    destination_airport: String,
    departure_date: NaiveDate,
    passenger_count: u32,
    adult_count: u32,
}

impl SearchRequestBuilder {
    pub fn passengers(mut self, passenger_count: u32) -> Self {
        self.passenger_count = passenger_count;
        self
    }

    pub fn adults(mut self, adult_count: u32) -> Self {
        self.adult_count = adult_count;
        self
    }

    pub fn build(self) -> Result<SearchRequest, SearchError> {
        let request = SearchRequest {
            departure_date: self.departure_date,
            origination_airport: self.origination_airport,
            destination_airport: self.destination_airport,
            passenger_count: self.passenger_count,
            adult_count: self.adult_count,
        };
        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 22).unwrap()
    }

    #[test]
    fn test_get_search_url() {
        let request = SearchRequest::builder("SAN".to_string(), "DAL".to_string(), date())
            .build()
            .unwrap();
        assert_eq!(
            request.get_search_url().unwrap(),
            "https://www.southwest.com/air/booking/select-depart.html?adultPassengersCount=1&adultsCount=1&departureDate=2024-04-22&departureTimeOfDay=ALL_DAY&destinationAirportCode=DAL&fareType=USD&from=SAN&int=HOMEQBOMAIR&originationAirportCode=SAN&passengerType=ADULT&reset=true&returnDate=&returnTimeOfDay=ALL_DAY&to=DAL&tripType=oneway"
        );
    }

    #[test]
    fn test_airport_code_validation() {
        for bad in ["sa", "san", "SAN1", "S N", ""] {
            let result = SearchRequest::builder(bad.to_string(), "DAL".to_string(), date()).build();
            assert!(
                matches!(result, Err(SearchError::InvalidRequest(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_passenger_validation() {
        let ok = SearchRequest::builder("SAN".to_string(), "DAL".to_string(), date())
            .passengers(3)
            .adults(2)
            .build();
        assert!(ok.is_ok());

        let no_adults = SearchRequest::builder("SAN".to_string(), "DAL".to_string(), date())
            .passengers(2)
            .adults(0)
            .build();
        assert!(no_adults.is_err(), "Building with 0 adults should fail");
    }

    #[test]
    fn test_input_date_formats() {
        let input = SearchInput {
            departure_date: "2024/04/22".to_string(),
            origination: "SAN".to_string(),
            destination: "DAL".to_string(),
            passenger_count: 1,
            adult_count: 1,
        };
        assert_eq!(input.into_request().unwrap().departure_date, date());

        let garbage = SearchInput {
            departure_date: "next tuesday".to_string(),
            origination: "SAN".to_string(),
            destination: "DAL".to_string(),
            passenger_count: 1,
            adult_count: 1,
        };
        assert!(matches!(
            garbage.into_request(),
            Err(SearchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_input_defaults_to_one_adult() {
        let input: SearchInput = serde_json::from_str(
            r#"{"departure_date": "2024-04-22", "origination": "SAN", "destination": "DAL"}"#,
        )
        .unwrap();
        let request = input.into_request().unwrap();
        assert_eq!(request.passenger_count, 1);
        assert_eq!(request.adult_count, 1);
    }
}
