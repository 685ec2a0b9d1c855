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

//! # Southwest Flights Search Client
//!
//! Effectful (time, browser) operations for a one-way fare search:
//! request → URL → rendered page → parsed fares.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;

use crate::error::SearchError;
use crate::flights_model::FlightSearchResult;
use crate::flights_query_builder::SearchRequest;
use crate::page_acquirer::{AcquirerConfig, BrowserLauncher, DebugSink, PageAcquirer};
use crate::webdriver_session::WebDriverLauncher;

const CONFIRM_BUTTON_ID: &str = "form-mixin--submit-button";
const RESULTS_CONTAINER_ID: &str = "air-search-results-matrix-0";

pub struct SouthwestFlightsClient<L = WebDriverLauncher> {
    acquirer: PageAcquirer<L>,
}

impl SouthwestFlightsClient<WebDriverLauncher> {
    pub fn new(launcher: WebDriverLauncher) -> Self {
        Self::with_launcher(launcher, AcquirerConfig::default())
    }
}

impl<L: BrowserLauncher> SouthwestFlightsClient<L> {
    pub fn with_launcher(launcher: L, config: AcquirerConfig) -> Self {
        Self {
            acquirer: PageAcquirer::new(launcher, config),
        }
    }

    /// Keep a copy of every rendered results page.
    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.acquirer = self.acquirer.with_debug_sink(sink);
        self
    }

    pub async fn search_flights(
        &self,
        request: &SearchRequest,
    ) -> Result<FlightSearchResult, SearchError> {
        self.search_flights_as_of(request, chrono::Local::now().date_naive())
            .await
    }

    /// Same as [`Self::search_flights`] with an explicit "today".
    pub async fn search_flights_as_of(
        &self,
        request: &SearchRequest,
        today: NaiveDate,
    ) -> Result<FlightSearchResult, SearchError> {
        let overall_start = Instant::now();
        request.validate()?;
        if request.departure_date < today {
            return Err(SearchError::invalid(format!(
                "departure date {} is in the past",
                request.departure_date.format("%Y-%m-%d")
            )));
        }

        let url = request.get_search_url()?;
        tracing::info!("🔗 Search URL: {}", url);

        let fetch_start = Instant::now();
        let page = self
            .acquirer
            .acquire(&url, &debug_artifact_name(request))
            .await?;
        tracing::info!(
            "Browser fetch completed in {:?}, got {} KB{}",
            fetch_start.elapsed(),
            page.html.len() / 1024,
            if page.confirmed { " (after confirmation)" } else { "" }
        );

        let parse_start = Instant::now();
        match FlightSearchResult::from_html(&page.html, request.clone()) {
            Ok(result) => {
                tracing::debug!(
                    "Parsed {} flights in {:?}",
                    result.len(),
                    parse_start.elapsed()
                );
                tracing::info!("Total search_flights time: {:?}", overall_start.elapsed());
                Ok(result)
            }
            Err(e) => {
                tracing::error!("Parse failed after {:?}: {}", parse_start.elapsed(), e);
                log_parse_diagnostics(&page.html);
                tracing::info!(
                    "Total search_flights time (failed): {:?}",
                    overall_start.elapsed()
                );
                Err(e)
            }
        }
    }
}

/// `debug_<ORIG>_<DEST>_<DATE>.html`
pub fn debug_artifact_name(request: &SearchRequest) -> String {
    format!(
        "debug_{}_{}_{}.html",
        request.origination_airport,
        request.destination_airport,
        request.departure_date.format("%Y-%m-%d")
    )
}

fn log_parse_diagnostics(html: &str) {
    let has_results = html.contains(RESULTS_CONTAINER_ID);
    let still_confirming = html.contains(CONFIRM_BUTTON_ID);

    if !has_results && still_confirming {
        tracing::warn!("Still on the search form: the confirmation click did not go through.");
    } else if !has_results {
        tracing::warn!("No results container in the page. This may indicate:");
        tracing::warn!("  - The site served a bot check instead of fares");
        tracing::warn!("  - The route is not served on that date");
    } else {
        tracing::error!("Results container found but parser failed. Parser may need updating.");
    }

    let preview = html.chars().take(2000).collect::<String>();
    tracing::error!("HTML preview (first 2000 chars):\n{}", preview);
}
