use crate::tools::{extract_string_arg, report};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::json;

pub const NAME: &str = "get_time_in_timezone";

fn time_in(timezone_name: &str, now: DateTime<Utc>) -> Option<String> {
    let tz: Tz = timezone_name.parse().ok()?;
    Some(now.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string())
}

#[derive(Debug, Default)]
pub struct TimezoneTool;

impl TimezoneTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for TimezoneTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Returns the current time for a given IANA timezone. Example: 'Asia/Karachi'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "timezone_name": {
                    "type": "string",
                    "description": "The IANA timezone name, e.g. 'America/New_York'"
                }
            },
            "required": ["timezone_name"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let timezone_name = extract_string_arg(&args, "timezone_name")?;
        match time_in(&timezone_name, Utc::now()) {
            Some(time) => Ok(report(
                NAME,
                format!("The current time in {timezone_name} is {time}"),
            )),
            None => Ok(ToolResult::failure(
                NAME,
                format!("Invalid timezone: {timezone_name}"),
            )),
        }
    }
}
