use crate::tools::{extract_string_arg, fetch_json, missing_key, report, upstream_message};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const NAME: &str = "get_distance";
pub const DEFAULT_BASE_URL: &str = "https://api.opencagedata.com";
pub const API_KEY_ENV: &str = "OPENCAGE_API_KEY";
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Geometry {
    lat: f64,
    lng: f64,
}

/// Great-circle distance between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub struct DistanceTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DistanceTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn geocode(&self, location: &str, api_key: &str) -> anyhow::Result<Result<Geometry, String>> {
        let request = self
            .client
            .get(format!("{}/geocode/v1/json", self.base_url))
            .query(&[("q", location), ("key", api_key), ("limit", "1")]);
        let (status, body) = fetch_json(request).await?;

        if !status.is_success() {
            let reason = body
                .pointer("/status/message")
                .and_then(|m| m.as_str())
                .unwrap_or_else(|| upstream_message(&body));
            return Ok(Err(format!("{location}: {reason}")));
        }

        let parsed: GeocodeResponse = serde_json::from_value(body)?;
        Ok(parsed
            .results
            .first()
            .map(|r| r.geometry)
            .ok_or_else(|| format!("{location}: no match")))
    }
}

#[async_trait]
impl Tool for DistanceTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Calculates the distance in kilometers between two locations. Example: 'Karachi' and 'Lahore'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "location1": {
                    "type": "string",
                    "description": "The first location, e.g. 'New York'"
                },
                "location2": {
                    "type": "string",
                    "description": "The second location, e.g. 'Los Angeles'"
                }
            },
            "required": ["location1", "location2"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let location1 = extract_string_arg(&args, "location1")?;
        let location2 = extract_string_arg(&args, "location2")?;
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(missing_key(NAME, API_KEY_ENV));
        };

        let origin = self.geocode(&location1, api_key).await?;
        let destination = self.geocode(&location2, api_key).await?;

        match (origin, destination) {
            (Ok(a), Ok(b)) => {
                let distance = haversine_km(a.lat, a.lng, b.lat, b.lng);
                Ok(report(
                    NAME,
                    format!("The distance between {location1} and {location2} is {distance:.2} km."),
                ))
            }
            (Err(reason), _) | (_, Err(reason)) => Ok(ToolResult::failure(
                NAME,
                format!("Could not calculate the distance. Check if both locations are valid ({reason})."),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, q: &str, lat: f64, lng: f64) {
        Mock::given(method("GET"))
            .and(path("/geocode/v1/json"))
            .and(query_param("q", q))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"geometry": {"lat": lat, "lng": lng}}]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn haversine_known_distance() {
        // Karachi to Lahore, roughly 1030 km.
        let d = haversine_km(24.8607, 67.0011, 31.5204, 74.3587);
        assert!((d - 1030.0).abs() < 15.0, "got {d}");
        assert_eq!(haversine_km(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[tokio::test]
    async fn distance_between_two_cities() {
        let server = MockServer::start().await;
        mount(&server, "Karachi", 24.8607, 67.0011).await;
        mount(&server, "Lahore", 31.5204, 74.3587).await;

        let tool = DistanceTool::new(reqwest::Client::new(), server.uri(), Some("k".into()));
        let result = tool
            .invoke(json!({"location1": "Karachi", "location2": "Lahore"}))
            .await;

        assert!(result.success);
        assert!(result.output.starts_with("The distance between Karachi and Lahore is "));
        assert!(result.output.contains(" km."));
    }

    #[tokio::test]
    async fn unknown_location_is_a_failure() {
        let server = MockServer::start().await;
        mount(&server, "Karachi", 24.8607, 67.0011).await;
        Mock::given(method("GET"))
            .and(query_param("q", "Nowhere"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let tool = DistanceTool::new(reqwest::Client::new(), server.uri(), Some("k".into()));
        let result = tool
            .invoke(json!({"location1": "Karachi", "location2": "Nowhere"}))
            .await;

        assert!(!result.success);
        assert!(result.output.contains("Nowhere: no match"));
    }

    #[tokio::test]
    async fn second_location_is_required() {
        let tool = DistanceTool::new(reqwest::Client::new(), "http://127.0.0.1:9", Some("k".into()));
        let result = tool.invoke(json!({"location1": "Karachi"})).await;
        assert!(result.output.contains("Missing 'location2' parameter"));
    }
}
