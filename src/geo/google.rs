use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

use super::{GeoProvider, PlaceDescription, REQUEST_TIMEOUT};

const ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// International reverse-geocoding via the Google Maps geocoding API.
pub struct GoogleProvider {
    key: String,
    client: Client,
}

impl GoogleProvider {
    pub fn new(key: String) -> Self {
        Self {
            key,
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl GeoProvider for GoogleProvider {
    fn name(&self) -> &str {
        "Google"
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<PlaceDescription> {
        let resp = self
            .client
            .get(ENDPOINT)
            .query(&[
                ("latlng", format!("{latitude},{longitude}")),
                ("key", self.key.clone()),
                ("language", "en".to_string()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Google geocoding request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("Failed to read Google geocoding response")?;

        if !status.is_success() {
            anyhow::bail!("Google geocoding API error ({status}): {text}");
        }

        let json: Value =
            serde_json::from_str(&text).context("Failed to parse Google geocoding JSON")?;

        let results = match json["results"].as_array() {
            Some(r) if json["status"].as_str() == Some("OK") && !r.is_empty() => r,
            _ => anyhow::bail!(
                "Google geocoding failed: {}",
                json["status"].as_str().unwrap_or("no status")
            ),
        };

        Ok(normalize(results))
    }
}

fn normalize(results: &[Value]) -> PlaceDescription {
    let first = &results[0];
    let components: Vec<Value> = first["address_components"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    PlaceDescription {
        country: component(&components, "country"),
        province: component(&components, "administrative_area_level_1"),
        city: component(&components, "locality")
            .or_else(|| component(&components, "administrative_area_level_2")),
        district: component(&components, "sublocality"),
        street: component(&components, "route"),
        formatted_address: non_empty(&first["formatted_address"]),
        pois: poi_names(results),
    }
}

/// Look up an address component by type.
fn component(components: &[Value], kind: &str) -> Option<String> {
    components
        .iter()
        .find(|c| {
            c["types"]
                .as_array()
                .is_some_and(|types| types.iter().any(|t| t.as_str() == Some(kind)))
        })
        .and_then(|c| non_empty(&c["long_name"]))
}

/// Up to 3 point-of-interest names from the surrounding result list.
fn poi_names(results: &[Value]) -> Option<Vec<String>> {
    let names: Vec<String> = results
        .iter()
        .filter(|r| {
            r["types"].as_array().is_some_and(|types| {
                types
                    .iter()
                    .any(|t| matches!(t.as_str(), Some("point_of_interest" | "establishment")))
            })
        })
        .filter_map(|r| non_empty(&r["address_components"][0]["long_name"]))
        .take(3)
        .collect();
    if names.is_empty() { None } else { Some(names) }
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
