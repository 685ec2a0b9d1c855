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

// Library for swoop-fare-scraper
// Southwest one-way fare search through a disguised headless browser

pub mod error;
pub mod flights_model;
pub mod flights_query_builder;
mod flights_results_parser;
mod flights_search;
pub mod page_acquirer;
pub mod webdriver_session;

#[cfg(feature = "server")]
pub mod api;

pub use error::SearchError;

// Re-export the request side
pub use flights_query_builder::{
    parse_departure_date, SearchInput, SearchRequest, SearchRequestBuilder, SEARCH_ENDPOINT,
};

// Re-export the result side
pub use flights_model::{
    FareQuote, FareTier, FlightResult, FlightSearchResult, FlightsApiResponse, Price, StopCount,
};
pub use flights_results_parser::parse_flights_response;

pub use flights_search::{debug_artifact_name, SouthwestFlightsClient};
pub use page_acquirer::{
    AcquiredPage, AcquirerConfig, AcquisitionState, BrowserLauncher, BrowserSession, DebugSink,
    FileDebugSink, PageAcquirer,
};
pub use webdriver_session::{WebDriverLauncher, DEFAULT_WEBDRIVER_URL};
