use crate::tools::{extract_string_arg, fetch_json, missing_key, report};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const NAME: &str = "get_movie_details";
pub const DEFAULT_BASE_URL: &str = "https://www.omdbapi.com";
pub const API_KEY_ENV: &str = "OMDB_API_KEY";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: String,
    title: Option<String>,
    year: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    plot: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    error: Option<String>,
}

pub struct MovieTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl MovieTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("N/A")
}

#[async_trait]
impl Tool for MovieTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Fetches details of a movie (year, genre, director, plot, rating) based on its title. Example: 'Inception'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "movie_name": {
                    "type": "string",
                    "description": "The name of the movie"
                }
            },
            "required": ["movie_name"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let movie_name = extract_string_arg(&args, "movie_name")?;
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(missing_key(NAME, API_KEY_ENV));
        };

        let request = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("t", movie_name.as_str()), ("apikey", api_key)]);
        let (status, body) = fetch_json(request).await?;
        if !status.is_success() {
            return Ok(ToolResult::failure(
                NAME,
                format!("Error fetching movie details: HTTP {status}"),
            ));
        }

        let movie: OmdbResponse = serde_json::from_value(body)?;
        if movie.response != "True" {
            let reason = movie.error.as_deref().unwrap_or("Movie not found!");
            return Ok(ToolResult::failure(
                NAME,
                format!("Movie not found: {movie_name} ({reason})"),
            ));
        }

        Ok(report(
            NAME,
            format!(
                "Movie Details:\n- Title: {}\n- Year: {}\n- Genre: {}\n- Director: {}\n- Plot: {}\n- IMDb Rating: {}/10",
                or_na(&movie.title),
                or_na(&movie.year),
                or_na(&movie.genre),
                or_na(&movie.director),
                or_na(&movie.plot),
                or_na(&movie.imdb_rating),
            ),
        ))
    }
}
