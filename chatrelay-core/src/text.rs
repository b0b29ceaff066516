//! Text helpers for assistant output and conversation seeding.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TextError {
    #[error("No JSON object found in text")]
    NoJson,

    #[error("Embedded JSON is not an object")]
    NotAnObject,
}

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"【[^】]*】").expect("valid citation regex"))
}

fn fenced_json_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("valid fence regex")
    })
}

/// Strip file-search citation markers such as `【4:0†source】`.
pub fn remove_source(text: &str) -> String {
    citation_regex().replace_all(text, "").trim().to_string()
}

/// Pull the JSON object out of an assistant message.
///
/// Looks for a fenced code block first, then falls back to the span between
/// the first `{` and the last `}`.
pub fn extract_json(text: &str) -> Result<Value, TextError> {
    if let Some(caps) = fenced_json_regex().captures(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&caps[1]) {
            return object_only(value);
        }
    }

    let start = text.find('{').ok_or(TextError::NoJson)?;
    let end = text.rfind('}').ok_or(TextError::NoJson)?;
    if end < start {
        return Err(TextError::NoJson);
    }

    let value: Value = serde_json::from_str(&text[start..=end]).map_err(|_| TextError::NoJson)?;
    object_only(value)
}

fn object_only(value: Value) -> Result<Value, TextError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(TextError::NotAnObject)
    }
}

const DUTCH_MONTHS: [&str; 12] = [
    "januari", "februari", "maart", "april", "mei", "juni", "juli", "augustus", "september",
    "oktober", "november", "december",
];

fn dutch_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "maandag",
        Weekday::Tue => "dinsdag",
        Weekday::Wed => "woensdag",
        Weekday::Thu => "donderdag",
        Weekday::Fri => "vrijdag",
        Weekday::Sat => "zaterdag",
        Weekday::Sun => "zondag",
    }
}

/// Today's date as the agent is told at the start of every conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct DateContext {
    pub weekday: String,
    pub date: String,
    pub time: String,
}

impl DateContext {
    pub fn today(tz: Tz) -> Self {
        Self::at(Utc::now().with_timezone(&tz))
    }

    pub fn at(now: DateTime<Tz>) -> Self {
        Self {
            weekday: dutch_weekday(now.weekday()).to_string(),
            date: format!(
                "{} {} {}",
                now.day(),
                DUTCH_MONTHS[now.month0() as usize],
                now.year()
            ),
            time: format!("{:02}:{:02}", now.hour(), now.minute()),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "System message: Vandaag is {}, {}, {}. Gebruik deze datum altijd als referentie",
            self.weekday, self.date, self.time
        )
    }
}
