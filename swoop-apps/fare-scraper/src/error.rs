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

//! # Search Errors
//!
//! Every failure a search can end with. None of them are retried inside the
//! crate: they all propagate to the caller.

use std::time::Duration;
use thiserror::Error;

use crate::page_acquirer::AcquisitionState;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Bad input. Raised before any browser is launched.
    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    #[error("browser timed out after {timeout:?} while {state}")]
    AcquisitionTimeout {
        state: AcquisitionState,
        timeout: Duration,
    },

    #[error("browser failure while {state}: {source}")]
    Browser {
        state: AcquisitionState,
        #[source]
        source: anyhow::Error,
    },

    /// A mandatory marker is missing: the page layout changed.
    #[error("malformed results page: missing {field} in {context}")]
    MalformedDocument { context: String, field: &'static str },

    #[error("empty result set: {0}")]
    EmptyResultSet(String),
}

impl SearchError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    /// True when the caller sent something wrong, false when the site or the
    /// browser did.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}
