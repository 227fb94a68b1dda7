use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

use super::{GeoProvider, PlaceDescription, REQUEST_TIMEOUT};

const ENDPOINT: &str = "https://restapi.amap.com/v3/geocode/regeo";

/// Domestic reverse-geocoding via the AMap (Gaode) regeo API.
pub struct AmapProvider {
    key: String,
    client: Client,
}

impl AmapProvider {
    pub fn new(key: String) -> Self {
        Self {
            key,
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl GeoProvider for AmapProvider {
    fn name(&self) -> &str {
        "AMap"
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<PlaceDescription> {
        let resp = self
            .client
            .get(ENDPOINT)
            .query(&[
                ("key", self.key.clone()),
                // AMap expects "longitude,latitude" order
                ("location", format!("{longitude},{latitude}")),
                ("extensions", "all".to_string()),
                ("radius", "1000".to_string()),
                ("output", "JSON".to_string()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("AMap request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read AMap response")?;

        if !status.is_success() {
            anyhow::bail!("AMap API error ({status}): {text}");
        }

        let json: Value =
            serde_json::from_str(&text).context("Failed to parse AMap response JSON")?;

        if json["status"].as_str() != Some("1") || json["regeocode"].is_null() {
            anyhow::bail!(
                "AMap geocoding failed: {}",
                json["info"].as_str().unwrap_or("no regeocode in response")
            );
        }

        Ok(normalize(&json["regeocode"]))
    }
}

fn normalize(regeo: &Value) -> PlaceDescription {
    let addr = &regeo["addressComponent"];

    // Municipalities return an empty city; fall back to the province.
    let province = non_empty(&addr["province"]);
    let city = non_empty(&addr["city"]).or_else(|| province.clone());

    PlaceDescription {
        country: non_empty(&addr["country"]),
        province,
        city,
        district: non_empty(&addr["district"]),
        street: non_empty(&addr["township"]),
        formatted_address: non_empty(&regeo["formatted_address"]),
        pois: poi_names(&regeo["pois"]),
    }
}

/// Up to 3 nearby point-of-interest names, when the response carries them.
fn poi_names(value: &Value) -> Option<Vec<String>> {
    let names: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(|p| non_empty(&p["name"]))
        .take(3)
        .collect();
    if names.is_empty() { None } else { Some(names) }
}

/// A string value that is present and non-empty. AMap encodes "no value" as
/// either `""` or an empty array, both of which land here as `None`.
fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
