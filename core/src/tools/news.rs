use crate::tools::{extract_string_arg, fetch_json, missing_key, report, upstream_message};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;

pub const NAME: &str = "get_latest_news";
pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";
pub const API_KEY_ENV: &str = "NEWSAPI_API_KEY";
const MAX_ARTICLES: usize = 10;

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    url: Option<String>,
}

pub struct NewsTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl NewsTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Tool for NewsTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Shows the latest news headlines with links for a given topic. Example: 'Technology'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The topic to search for news articles"
                }
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let topic = extract_string_arg(&args, "topic")?;
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(missing_key(NAME, API_KEY_ENV));
        };

        let request = self
            .client
            .get(format!("{}/v2/everything", self.base_url))
            .query(&[("q", topic.as_str()), ("apiKey", api_key)]);
        let (status, body) = fetch_json(request).await?;

        if !status.is_success() {
            return Ok(ToolResult::failure(
                NAME,
                format!("Could not fetch news for {topic}. Reason: {}", upstream_message(&body)),
            ));
        }

        let parsed: NewsResponse = serde_json::from_value(body)?;
        let headlines: Vec<(String, String)> = parsed
            .articles
            .into_iter()
            .filter_map(|a| Some((a.title?, a.url?)))
            .take(MAX_ARTICLES)
            .collect();

        if headlines.is_empty() {
            return Ok(ToolResult::failure(
                NAME,
                format!("Could not fetch news for {topic}. Reason: no articles found"),
            ));
        }

        let mut text = format!("Here are the latest news articles related to {topic}:");
        for (title, url) in headlines {
            let _ = write!(text, "\n- {title}: {url}");
        }
        Ok(report(NAME, text))
    }
}
