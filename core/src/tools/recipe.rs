use crate::tools::{extract_string_arg, fetch_json, missing_key, report, upstream_message};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;

pub const NAME: &str = "get_recipe";
pub const DEFAULT_BASE_URL: &str = "https://api.spoonacular.com";
pub const API_KEY_ENV: &str = "SPOONACULAR_API_KEY";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RecipeSummary>,
}

#[derive(Debug, Deserialize)]
struct RecipeSummary {
    id: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeInformation {
    #[serde(default)]
    extended_ingredients: Vec<Ingredient>,
    instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Ingredient {
    original: String,
}

pub struct RecipeTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RecipeTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Tool for RecipeTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Fetches a recipe with ingredients and instructions for a given dish. Example: 'Chicken Biryani'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "dish_name": {
                    "type": "string",
                    "description": "The name of the dish"
                }
            },
            "required": ["dish_name"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let dish_name = extract_string_arg(&args, "dish_name")?;
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(missing_key(NAME, API_KEY_ENV));
        };

        let search = self
            .client
            .get(format!("{}/recipes/complexSearch", self.base_url))
            .query(&[("query", dish_name.as_str()), ("apiKey", api_key), ("number", "1")]);
        let (status, body) = fetch_json(search).await?;
        if !status.is_success() {
            return Ok(ToolResult::failure(
                NAME,
                format!("Unable to fetch recipe. Reason: {}", upstream_message(&body)),
            ));
        }

        let found: SearchResponse = serde_json::from_value(body)?;
        let Some(summary) = found.results.into_iter().next() else {
            return Ok(ToolResult::failure(
                NAME,
                format!("Could not find a recipe for {dish_name}. Try another dish name."),
            ));
        };

        let details = self
            .client
            .get(format!("{}/recipes/{}/information", self.base_url, summary.id))
            .query(&[("apiKey", api_key)]);
        let (status, body) = fetch_json(details).await?;
        if !status.is_success() {
            return Ok(ToolResult::failure(
                NAME,
                format!("Unable to fetch recipe details. Reason: {}", upstream_message(&body)),
            ));
        }
        let info: RecipeInformation = serde_json::from_value(body)?;

        let mut text = format!("Recipe for {}:\n\nIngredients:", summary.title);
        for ingredient in &info.extended_ingredients {
            let _ = write!(text, "\n- {}", ingredient.original);
        }
        let instructions = info
            .instructions
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("No instructions available.");
        let _ = write!(text, "\n\nInstructions:\n{instructions}");

        Ok(report(NAME, text))
    }
}
