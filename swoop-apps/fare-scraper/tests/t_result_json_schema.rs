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

//! The JSON handed to API callers matches `tests/schemas/flights-response.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use swoop_fare_scraper::{FlightSearchResult, SearchRequest};

fn load_schema_from_file(name: &str) -> Result<Value> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let schema_path = manifest_dir.join("tests").join("schemas").join(name);

    let content = std::fs::read_to_string(&schema_path)
        .context(format!("Failed to read schema file: {:?}", schema_path))?;

    serde_json::from_str(&content)
        .context(format!("Failed to parse schema file: {:?}", schema_path))
}

fn validate_json_schema(instance: &Value, schema: &Value, schema_name: &str) -> Result<()> {
    let validator = jsonschema::Validator::new(schema)
        .context(format!("Failed to create validator for {}", schema_name))?;

    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| format!("{}: {}", schema_name, e))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "Schema validation failed for {}:\n{}",
            schema_name,
            errors.join("\n")
        )
    }
}

fn parsed(fixture: &str) -> Result<Value> {
    let html = std::fs::read_to_string(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures-flights-parsing")
            .join(fixture),
    )?;
    let request = SearchRequest::builder(
        "SAN".to_string(),
        "DAL".to_string(),
        NaiveDate::from_ymd_opt(2024, 4, 22).unwrap(),
    )
    .passengers(2)
    .adults(2)
    .build()?;
    let result = FlightSearchResult::from_html(&html, request)?;
    Ok(serde_json::to_value(result.to_api_response())?)
}

#[test]
fn test_three_flights_matches_schema() -> Result<()> {
    let schema = load_schema_from_file("flights-response.json")?;
    let instance = parsed("three-flights.html")?;
    validate_json_schema(&instance, &schema, "flights-response")?;

    assert_eq!(instance["flights"][0]["stop_count"], 0);
    assert_eq!(instance["flights"][0]["connection_note"], Value::Null);
    assert_eq!(instance["flights"][2]["fares"][3]["price"], "Unavailable");
    assert_eq!(instance["flights"][1]["fares"][3]["tier"], "wanna_get_away");
    Ok(())
}

#[test]
fn test_empty_result_matches_schema() -> Result<()> {
    let schema = load_schema_from_file("flights-response.json")?;
    let instance = parsed("empty-results.html")?;
    validate_json_schema(&instance, &schema, "flights-response")?;

    assert_eq!(instance["total_flights"], 0);
    assert_eq!(instance["cheapest_fare"], Value::Null);
    Ok(())
}
