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

//! # Fare search HTTP front end
//!
//! `POST /` takes a [`SearchInput`] body and answers
//! `{"message": <result JSON as a string>, "status": 200}`. Failures keep the
//! same envelope with the error text and a matching status code.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::error::SearchError;
use crate::flights_query_builder::SearchInput;
use crate::flights_search::SouthwestFlightsClient;
use crate::page_acquirer::BrowserLauncher;

#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
    pub status: u16,
}

impl ApiMessage {
    fn reply(status: StatusCode, message: String) -> (StatusCode, Json<ApiMessage>) {
        (
            status,
            Json(ApiMessage {
                message,
                status: status.as_u16(),
            }),
        )
    }
}

/// Shared by every request: one client, and a bound on how many browsers
/// run at once.
pub struct ApiState<L> {
    client: Arc<SouthwestFlightsClient<L>>,
    browser_permits: Arc<Semaphore>,
}

impl<L> Clone for ApiState<L> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            browser_permits: Arc::clone(&self.browser_permits),
        }
    }
}

impl<L> ApiState<L> {
    pub fn new(client: Arc<SouthwestFlightsClient<L>>, browser_permits: Arc<Semaphore>) -> Self {
        Self {
            client,
            browser_permits,
        }
    }
}

pub fn status_for(err: &SearchError) -> StatusCode {
    match err {
        SearchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SearchError::AcquisitionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SearchError::Browser { .. } | SearchError::MalformedDocument { .. } => {
            StatusCode::BAD_GATEWAY
        }
        SearchError::EmptyResultSet(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router<L>(state: ApiState<L>) -> Router
where
    L: BrowserLauncher + 'static,
{
    Router::new()
        .route("/", post(search_fares::<L>))
        .with_state(state)
}

async fn search_fares<L>(
    State(state): State<ApiState<L>>,
    body: axum::body::Bytes,
) -> (StatusCode, Json<ApiMessage>)
where
    L: BrowserLauncher + 'static,
{
    let request = match serde_json::from_slice::<SearchInput>(&body)
        .map_err(|e| SearchError::invalid(format!("request body: {}", e)))
        .and_then(SearchInput::into_request)
    {
        Ok(request) => request,
        Err(e) => return ApiMessage::reply(status_for(&e), e.to_string()),
    };

    let _permit = match state.browser_permits.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            return ApiMessage::reply(
                StatusCode::SERVICE_UNAVAILABLE,
                "server is shutting down".to_string(),
            );
        }
    };

    tracing::info!(
        "POST / {} -> {} on {}",
        request.origination_airport,
        request.destination_airport,
        request.departure_date
    );
    match state.client.search_flights(&request).await {
        Ok(result) => match serde_json::to_string(&result.to_api_response()) {
            Ok(json) => ApiMessage::reply(StatusCode::OK, json),
            Err(e) => ApiMessage::reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => {
            tracing::warn!("Search failed: {}", e);
            ApiMessage::reply(status_for(&e), e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_acquirer::AcquisitionState;
    use std::time::Duration;

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&SearchError::invalid("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SearchError::AcquisitionTimeout {
                state: AcquisitionState::Navigating,
                timeout: Duration::from_secs(30),
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&SearchError::MalformedDocument {
                context: "results page".to_string(),
                field: "results container",
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&SearchError::EmptyResultSet("none".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
