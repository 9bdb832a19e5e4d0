//! Email age tool - how long ago an email was sent

use super::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct EmailAgeTool;

#[derive(Debug, Deserialize)]
struct EmailAgeInput {
    email_date: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct EmailAge {
    days: i64,
    /// Whole 30-day months
    months: i64,
}

fn email_age(email_date: &str, today: NaiveDate) -> Result<EmailAge, ToolError> {
    let sent = NaiveDate::parse_from_str(email_date.trim(), DATE_FORMAT).map_err(|_| {
        ToolError::InvalidInput(format!(
            "invalid date `{email_date}`, expected YYYY-MM-DD"
        ))
    })?;

    let days = (today - sent).num_days();
    if days < 0 {
        return Err(ToolError::InvalidInput(format!(
            "date `{email_date}` is in the future"
        )));
    }

    Ok(EmailAge {
        days,
        months: days / 30,
    })
}

#[async_trait]
impl Tool for EmailAgeTool {
    fn name(&self) -> &'static str {
        "email_age"
    }

    fn description(&self) -> String {
        "Calculate the age of an email from its date. Returns the age in days and in whole 30-day months.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["email_date"],
            "properties": {
                "email_date": {
                    "type": "string",
                    "description": "The date of the email in 'YYYY-MM-DD' format"
                }
            }
        })
    }

    async fn run(&self, input: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        let input: EmailAgeInput = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let age = email_age(&input.email_date, Local::now().date_naive())?;
        serde_json::to_value(age).map_err(|e| ToolError::Failed(e.to_string()))
    }
}
