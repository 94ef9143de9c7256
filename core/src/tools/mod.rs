use crate::config::{ToolsConfig, resolve_key};
use crate::traits::{Tool, ToolResult};
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;

pub mod disk_usage;
pub mod distance;
pub mod image_search;
pub mod ip_address;
pub mod movie;
pub mod news;
pub mod recipe;
pub mod stock;
pub mod timezone;
pub mod weather;

pub use disk_usage::DiskUsageTool;
pub use distance::DistanceTool;
pub use image_search::ImageSearchTool;
pub use ip_address::IpAddressTool;
pub use movie::MovieTool;
pub use news::NewsTool;
pub use recipe::RecipeTool;
pub use stock::StockPriceTool;
pub use timezone::TimezoneTool;
pub use weather::WeatherTool;

pub fn extract_string_arg(args: &Value, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
        .map(|s| s.to_string())
}

pub fn extract_bool_arg_opt(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Success text ending with the name of the tool that produced it.
pub(crate) fn report(tool: &str, text: impl std::fmt::Display) -> ToolResult {
    ToolResult::success(format!("{text}\nTool used: {tool}"))
}

pub(crate) fn missing_key(tool: &str, env_var: &str) -> ToolResult {
    ToolResult::failure(
        tool,
        format!("No API key configured for {tool}. Set {env_var} or add it to the [tools] config section."),
    )
}

/// Sends the request and returns the status with the JSON body.
pub(crate) async fn fetch_json(
    request: reqwest::RequestBuilder,
) -> anyhow::Result<(reqwest::StatusCode, Value)> {
    let response = request.send().await.context("Request failed")?;
    let status = response.status();
    let body = response
        .json::<Value>()
        .await
        .with_context(|| format!("Malformed response body (HTTP {status})"))?;
    Ok((status, body))
}

/// `message` field of an upstream error body, if any.
pub(crate) fn upstream_message(body: &Value) -> &str {
    body.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
}

pub fn http_client(config: &ToolsConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
        .connect_timeout(std::time::Duration::from_secs(10))
        .user_agent(concat!("toolcall/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// All ten built-in tools wired from config and environment.
pub fn builtin_tools(config: &ToolsConfig) -> Vec<Arc<dyn Tool>> {
    let client = http_client(config);

    vec![
        Arc::new(TimezoneTool::new()),
        Arc::new(DiskUsageTool::new(&config.disk_path)),
        Arc::new(
            WeatherTool::new(
                client.clone(),
                config.base_url(weather::NAME, weather::DEFAULT_BASE_URL),
                resolve_key(&[weather::API_KEY_ENV], &config.openweather_api_key),
            )
            .with_country_cities(config.country_cities.clone()),
        ),
        Arc::new(ImageSearchTool::new(
            client.clone(),
            config.base_url(image_search::NAME, image_search::DEFAULT_BASE_URL),
            resolve_key(&[image_search::API_KEY_ENV], &config.unsplash_access_key),
        )),
        Arc::new(IpAddressTool::new(
            client.clone(),
            config.base_url(ip_address::NAME, ip_address::DEFAULT_BASE_URL),
        )),
        Arc::new(StockPriceTool::new(
            client.clone(),
            config.base_url(stock::NAME, stock::DEFAULT_BASE_URL),
            resolve_key(&[stock::API_KEY_ENV], &config.polygon_api_key),
        )),
        Arc::new(DistanceTool::new(
            client.clone(),
            config.base_url(distance::NAME, distance::DEFAULT_BASE_URL),
            resolve_key(&[distance::API_KEY_ENV], &config.opencage_api_key),
        )),
        Arc::new(NewsTool::new(
            client.clone(),
            config.base_url(news::NAME, news::DEFAULT_BASE_URL),
            resolve_key(&[news::API_KEY_ENV], &config.newsapi_api_key),
        )),
        Arc::new(MovieTool::new(
            client.clone(),
            config.base_url(movie::NAME, movie::DEFAULT_BASE_URL),
            resolve_key(&[movie::API_KEY_ENV], &config.omdb_api_key),
        )),
        Arc::new(RecipeTool::new(
            client,
            config.base_url(recipe::NAME, recipe::DEFAULT_BASE_URL),
            resolve_key(&[recipe::API_KEY_ENV], &config.spoonacular_api_key),
        )),
    ]
}
