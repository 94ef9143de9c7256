//! Current conditions from OpenWeatherMap.
//!
//! A country name queried with `is_city = false` also reports the weather of
//! that country's major cities, and records the country as the
//! `last_country` turn note.

use crate::tools::{extract_bool_arg_opt, extract_string_arg, fetch_json, missing_key, report, upstream_message};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const NAME: &str = "get_weather";
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const LAST_COUNTRY_NOTE: &str = "last_country";

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    weather: Vec<WeatherCondition>,
    main: WeatherMain,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    feels_like: f64,
}

struct Conditions {
    description: String,
    temp: f64,
    feels_like: f64,
}

enum Lookup {
    Found(Conditions),
    Failed(String),
}

pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    country_cities: BTreeMap<String, Vec<String>>,
}

impl WeatherTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            country_cities: BTreeMap::new(),
        }
    }

    pub fn with_country_cities(mut self, country_cities: BTreeMap<String, Vec<String>>) -> Self {
        self.country_cities = country_cities;
        self
    }

    async fn lookup(&self, location: &str, api_key: &str) -> anyhow::Result<Lookup> {
        let request = self
            .client
            .get(format!("{}/data/2.5/weather", self.base_url))
            .query(&[("q", location), ("appid", api_key), ("units", "metric")]);
        let (status, body) = fetch_json(request).await?;

        if !status.is_success() {
            return Ok(Lookup::Failed(upstream_message(&body).to_string()));
        }

        let parsed: WeatherResponse = serde_json::from_value(body)?;
        let description = parsed
            .weather
            .first()
            .map(|w| capitalize(&w.description))
            .ok_or_else(|| anyhow::anyhow!("Weather response has no conditions"))?;

        Ok(Lookup::Found(Conditions {
            description,
            temp: parsed.main.temp,
            feels_like: parsed.main.feels_like,
        }))
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Fetches the current weather for a given location (country or city). If a country is queried, includes weather for major cities. Example: 'Karachi'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "location_name": {
                    "type": "string",
                    "description": "The name of the location (country or city) for which to fetch the weather"
                },
                "is_city": {
                    "type": "boolean",
                    "description": "Whether the location is a city. Default is false",
                    "default": false
                }
            },
            "required": ["location_name"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let location = extract_string_arg(&args, "location_name")?;
        let is_city = extract_bool_arg_opt(&args, "is_city", false);
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(missing_key(NAME, API_KEY_ENV));
        };

        let conditions = match self.lookup(&location, api_key).await? {
            Lookup::Found(conditions) => conditions,
            Lookup::Failed(reason) => {
                return Ok(ToolResult::failure(
                    NAME,
                    format!("Could not retrieve weather data. Reason: {reason}."),
                ));
            }
        };

        let mut text = format!(
            "The current weather in {} is {} with a temperature of {}°C and feels like {}°C.",
            location, conditions.description, conditions.temp, conditions.feels_like
        );

        let country = (!is_city)
            .then(|| {
                self.country_cities
                    .iter()
                    .find(|(country, _)| country.eq_ignore_ascii_case(&location))
            })
            .flatten();

        let Some((country, cities)) = country else {
            return Ok(report(NAME, text));
        };

        text.push_str("\nMajor cities' weather:");
        for city in cities {
            // A failed city lookup only affects its own line.
            match self.lookup(city, api_key).await {
                Ok(Lookup::Found(c)) => {
                    let _ = write!(
                        text,
                        "\n- {}: {}, {}°C (feels like {}°C)",
                        city, c.description, c.temp, c.feels_like
                    );
                }
                Ok(Lookup::Failed(_)) | Err(_) => {
                    let _ = write!(text, "\n- {city}: Weather data unavailable.");
                }
            }
        }

        Ok(report(NAME, text).with_note(LAST_COUNTRY_NOTE, country.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn conditions(description: &str, temp: f64) -> serde_json::Value {
        json!({
            "weather": [{"description": description}],
            "main": {"temp": temp, "feels_like": temp + 2.0}
        })
    }

    async fn mount_city(server: &MockServer, city: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", city))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn tool(server: &MockServer) -> WeatherTool {
        let cities = BTreeMap::from([(
            "Pakistan".to_string(),
            vec!["Karachi".to_string(), "Lahore".to_string()],
        )]);
        WeatherTool::new(reqwest::Client::new(), server.uri(), Some("test-key".into()))
            .with_country_cities(cities)
    }

    #[tokio::test]
    async fn city_weather_is_formatted() {
        let server = MockServer::start().await;
        mount_city(&server, "Karachi", conditions("haze", 31.0)).await;

        let result = tool(&server)
            .invoke(json!({"location_name": "Karachi", "is_city": true}))
            .await;

        assert!(result.success);
        assert_eq!(
            result.output,
            "The current weather in Karachi is Haze with a temperature of 31°C and feels like 33°C.\nTool used: get_weather"
        );
        assert!(result.notes.is_empty());
    }

    #[tokio::test]
    async fn country_includes_major_cities_and_note() {
        let server = MockServer::start().await;
        mount_city(&server, "Pakistan", conditions("clear sky", 28.5)).await;
        mount_city(&server, "Karachi", conditions("haze", 31.0)).await;
        Mock::given(method("GET"))
            .and(query_param("q", "Lahore"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&server)
            .await;

        let result = tool(&server)
            .invoke(json!({"location_name": "Pakistan"}))
            .await;

        assert!(result.success);
        assert!(result.output.contains("Major cities' weather:"));
        assert!(result.output.contains("- Karachi: Haze, 31°C (feels like 33°C)"));
        assert!(result.output.contains("- Lahore: Weather data unavailable."));
        assert_eq!(
            result.notes,
            vec![(LAST_COUNTRY_NOTE.to_string(), "Pakistan".to_string())]
        );
    }

    #[tokio::test]
    async fn upstream_error_reason_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"cod": "404", "message": "city not found"})),
            )
            .mount(&server)
            .await;

        let result = tool(&server)
            .invoke(json!({"location_name": "Atlantis"}))
            .await;

        assert!(!result.success);
        assert!(result.output.contains("Reason: city not found"));
        assert!(result.output.contains("Tool used: get_weather"));
    }

    #[tokio::test]
    async fn repeated_lookups_agree() {
        let server = MockServer::start().await;
        mount_city(&server, "Quetta", conditions("snow", -1.5)).await;
        let tool = tool(&server);

        let first = tool.invoke(json!({"location_name": "Quetta"})).await;
        let second = tool.invoke(json!({"location_name": "Quetta"})).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let tool = WeatherTool::new(reqwest::Client::new(), "http://127.0.0.1:9", None);
        let result = tool.invoke(json!({"location_name": "Karachi"})).await;
        assert!(!result.success);
        assert!(result.output.contains(API_KEY_ENV));
    }

    #[tokio::test]
    async fn unreachable_upstream_becomes_text() {
        let tool = WeatherTool::new(reqwest::Client::new(), "http://127.0.0.1:9", Some("k".into()));
        let result = tool.invoke(json!({"location_name": "Karachi"})).await;
        assert!(!result.success);
        assert!(result.output.starts_with("Error: Unable to run get_weather."));
    }

    #[test]
    fn capitalize_first_letter_only() {
        assert_eq!(capitalize("broken CLOUDS"), "Broken clouds");
        assert_eq!(capitalize(""), "");
    }
}
