use crate::tools::report;
use crate::traits::{Tool, ToolResult};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

pub const NAME: &str = "get_ip_address";
pub const DEFAULT_BASE_URL: &str = "https://api.ipify.org";

pub struct IpAddressTool {
    client: reqwest::Client,
    base_url: String,
}

impl IpAddressTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Tool for IpAddressTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Fetches the public IP address of the user."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .context("Request failed")?;

        if !response.status().is_success() {
            return Ok(ToolResult::failure(
                NAME,
                format!("Unable to fetch IP address. HTTP {}", response.status()),
            ));
        }

        let ip = response.text().await?;
        Ok(report(NAME, format!("Your public IP address is {}.", ip.trim())))
    }
}
