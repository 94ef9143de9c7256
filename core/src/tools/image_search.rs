use crate::tools::{extract_string_arg, fetch_json, missing_key, report, upstream_message};
use crate::traits::{ImageRef, Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const NAME: &str = "search_image";
pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";
pub const API_KEY_ENV: &str = "UNSPLASH_ACCESS_KEY";
const MAX_IMAGES: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    small: String,
}

pub struct ImageSearchTool {
    client: reqwest::Client,
    base_url: String,
    access_key: Option<String>,
}

impl ImageSearchTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, access_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            access_key,
        }
    }
}

#[async_trait]
impl Tool for ImageSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Searches for images based on the query keyword and displays them. Example: 'Mountain'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find images"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let query = extract_string_arg(&args, "query")?;
        let Some(access_key) = self.access_key.as_deref() else {
            return Ok(missing_key(NAME, API_KEY_ENV));
        };

        let request = self
            .client
            .get(format!("{}/search/photos", self.base_url))
            .query(&[("query", query.as_str()), ("client_id", access_key)]);
        let (status, body) = fetch_json(request).await?;

        if !status.is_success() {
            let reason = body
                .get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.as_str())
                .unwrap_or_else(|| upstream_message(&body));
            return Ok(ToolResult::failure(
                NAME,
                format!("Could not search images for {query}. Reason: {reason}"),
            ));
        }

        let parsed: SearchResponse = serde_json::from_value(body)?;
        if parsed.results.is_empty() {
            return Ok(ToolResult::failure(
                NAME,
                format!("Could not find images for {query}."),
            ));
        }

        let images = parsed
            .results
            .into_iter()
            .take(MAX_IMAGES)
            .map(|photo| ImageRef {
                url: photo.urls.small,
                caption: format!("Image related to {query}"),
            })
            .collect();

        Ok(report(NAME, format!("Displayed images related to {query}.")).with_images(images))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_at_most_five_images() {
        let server = MockServer::start().await;
        let results: Vec<_> = (0..8)
            .map(|i| json!({"urls": {"small": format!("https://images.test/{i}.jpg")}}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/search/photos"))
            .and(query_param("query", "Mountain"))
            .and(query_param("client_id", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": results})))
            .mount(&server)
            .await;

        let tool = ImageSearchTool::new(reqwest::Client::new(), server.uri(), Some("key".into()));
        let result = tool.invoke(json!({"query": "Mountain"})).await;

        assert!(result.success);
        assert_eq!(result.images.len(), 5);
        assert_eq!(result.images[0].url, "https://images.test/0.jpg");
        assert_eq!(result.images[0].caption, "Image related to Mountain");
        assert!(result.output.ends_with("Tool used: search_image"));
    }

    #[tokio::test]
    async fn no_results_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let tool = ImageSearchTool::new(reqwest::Client::new(), server.uri(), Some("key".into()));
        let result = tool.invoke(json!({"query": "qwzx"})).await;

        assert!(!result.success);
        assert!(result.output.contains("Could not find images for qwzx"));
        assert!(result.images.is_empty());
    }
}
