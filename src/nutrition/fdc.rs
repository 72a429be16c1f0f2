//! USDA `FoodData` Central client.
//!
//! Responses are read as untyped JSON and every field is treated as
//! optional, since the upstream schema differs between endpoints and data
//! types (flat `nutrientName`/`value` pairs from search, nested
//! `nutrient.name`/`amount` objects from the single-food endpoint).

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::FoodDataApi;
use crate::config::FdcConfig;
use crate::errors::LookupError;

/// Only the first search hit is ever used.
const SEARCH_PAGE_SIZE: &str = "1";

/// A food entry as far as it could be read from an FDC payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoodRecord {
    pub description: Option<String>,
    pub nutrients: HashMap<String, f64>,
}

impl FoodRecord {
    /// Read a food object, skipping anything malformed.
    ///
    /// When a nutrient name occurs more than once the later entry wins.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let nutrients = value
            .get("foodNutrients")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(nutrient_entry)
            .collect();

        Self {
            description,
            nutrients,
        }
    }

    #[must_use]
    pub fn nutrient(&self, name: &str) -> Option<f64> {
        self.nutrients.get(name).copied()
    }
}

fn nutrient_entry(entry: &Value) -> Option<(String, f64)> {
    let name = entry
        .get("nutrientName")
        .or_else(|| entry.get("nutrient").and_then(|n| n.get("name")))
        .and_then(Value::as_str)?;
    let amount = entry
        .get("value")
        .or_else(|| entry.get("amount"))
        .and_then(Value::as_f64)?;
    Some((name.to_owned(), amount))
}

/// Parse the single-food endpoint body. `None` when the payload carries an
/// `error` marker or is not an object.
#[must_use]
pub fn parse_food_response(body: &Value) -> Option<FoodRecord> {
    let object = body.as_object()?;
    if object.contains_key("error") {
        return None;
    }
    Some(FoodRecord::from_json(body))
}

/// Parse a search body. A missing `foods` list counts as no results.
#[must_use]
pub fn parse_search_response(body: &Value) -> Vec<FoodRecord> {
    body.get("foods")
        .and_then(Value::as_array)
        .map(|foods| foods.iter().map(FoodRecord::from_json).collect())
        .unwrap_or_default()
}

fn unavailable(context: &str, err: reqwest::Error) -> LookupError {
    // The request URL carries the api key.
    LookupError::ServiceUnavailable(format!("{context}: {}", err.without_url()))
}

/// HTTP client for the FDC v1 API.
#[derive(Debug, Clone)]
pub struct FdcClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl FdcClient {
    /// Build a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &FdcConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl FoodDataApi for FdcClient {
    async fn food_by_name(&self, name: &str) -> Result<Option<FoodRecord>, LookupError> {
        let response = self
            .http
            .get(self.endpoint(&["food", name]))
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| unavailable("food lookup", e))?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(%status, name, "direct food lookup declined");
            return Ok(None);
        }

        match response.json::<Value>().await {
            Ok(body) => Ok(parse_food_response(&body)),
            Err(e) => {
                debug!(error = %e.without_url(), name, "direct food lookup returned unreadable body");
                Ok(None)
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<FoodRecord>, LookupError> {
        let response = self
            .http
            .get(self.endpoint(&["foods", "search"]))
            .query(&[
                ("query", query),
                ("pageSize", SEARCH_PAGE_SIZE),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| unavailable("food search", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::ServiceUnavailable(format!(
                "food search: HTTP {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| unavailable("food search body", e))?;
        Ok(parse_search_response(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_flat_search_nutrients() {
        let record = FoodRecord::from_json(&json!({
            "description": "Quesadilla with chicken",
            "foodNutrients": [
                {"nutrientName": "Energy", "unitName": "KCAL", "value": 292},
                {"nutrientName": "Protein", "value": 15.6},
            ]
        }));

        assert_eq!(record.description.as_deref(), Some("Quesadilla with chicken"));
        assert_eq!(record.nutrient("Energy"), Some(292.0));
        assert_eq!(record.nutrient("Protein"), Some(15.6));
        assert_eq!(record.nutrient("Total lipid (fat)"), None);
    }

    #[test]
    fn reads_nested_detail_nutrients() {
        let record = FoodRecord::from_json(&json!({
            "description": "Chicken, breast",
            "foodNutrients": [
                {"nutrient": {"name": "Total lipid (fat)", "unitName": "g"}, "amount": 3.57},
                {"nutrient": {"name": "Energy"}},
            ]
        }));

        assert_eq!(record.nutrient("Total lipid (fat)"), Some(3.57));
        assert_eq!(record.nutrient("Energy"), None);
    }

    #[test]
    fn tolerates_missing_and_malformed_fields() {
        let record = FoodRecord::from_json(&json!({
            "foodNutrients": [
                {"nutrientName": 12, "value": 1.0},
                {"value": 2.0},
                "garbage",
                {"nutrientName": "Protein", "value": "lots"},
            ]
        }));
        assert_eq!(record, FoodRecord::default());

        assert_eq!(FoodRecord::from_json(&json!("nope")), FoodRecord::default());
    }

    #[test]
    fn repeated_nutrient_keeps_last_entry() {
        let record = FoodRecord::from_json(&json!({
            "foodNutrients": [
                {"nutrientName": "Energy", "value": 1100.0},
                {"nutrientName": "Energy", "value": 263.0},
            ]
        }));
        assert_eq!(record.nutrient("Energy"), Some(263.0));
    }

    #[test]
    fn error_marker_rejects_direct_hit() {
        assert_eq!(parse_food_response(&json!({"error": "Not Found"})), None);
        assert_eq!(parse_food_response(&json!([1, 2])), None);
        assert!(parse_food_response(&json!({"description": "Pho"})).is_some());
    }

    #[test]
    fn search_without_foods_is_empty() {
        assert!(parse_search_response(&json!({"totalHits": 0})).is_empty());
        assert!(parse_search_response(&json!({"foods": []})).is_empty());
        assert_eq!(parse_search_response(&json!({"foods": [{}, {}]})).len(), 2);
    }
}
