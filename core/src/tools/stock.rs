use crate::tools::{extract_string_arg, fetch_json, missing_key, report};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const NAME: &str = "get_stock_price";
pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
pub const API_KEY_ENV: &str = "POLYGON_API_KEY";

#[derive(Debug, Deserialize)]
struct PrevCloseResponse {
    #[serde(default)]
    results: Vec<Aggregate>,
}

#[derive(Debug, Deserialize)]
struct Aggregate {
    /// Closing price.
    c: Option<f64>,
}

pub struct StockPriceTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl StockPriceTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

fn is_valid_symbol(symbol: &str) -> bool {
    symbol.len() <= 12
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == ':')
}

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Shows the current stock price (previous close) for a given stock symbol. Example: 'AAPL'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "The stock symbol of the company, e.g. 'AAPL' for Apple"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let symbol = extract_string_arg(&args, "symbol")?.to_uppercase();
        if !is_valid_symbol(&symbol) {
            return Ok(ToolResult::failure(NAME, format!("Invalid stock symbol: {symbol}")));
        }
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(missing_key(NAME, API_KEY_ENV));
        };

        let request = self
            .client
            .get(format!("{}/v2/aggs/ticker/{}/prev", self.base_url, symbol))
            .query(&[("apiKey", api_key)]);
        let (status, body) = fetch_json(request).await?;

        if !status.is_success() {
            return Ok(ToolResult::failure(NAME, format!("HTTP error occurred: {status}")));
        }

        let parsed: PrevCloseResponse = serde_json::from_value(body)?;
        match parsed.results.first().and_then(|r| r.c) {
            Some(price) => Ok(report(NAME, format!("The current price of {symbol} is ${price}"))),
            None => Ok(ToolResult::failure(
                NAME,
                format!("Could not retrieve stock data for {symbol}."),
            )),
        }
    }
}
