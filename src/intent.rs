use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::error::AgentError;
use crate::extract::{decode_reply, drop_nulls};
use crate::llm::{self, LanguageModel};
use crate::query::SortKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum IntentKind {
    #[default]
    Standard,
    Advanced,
    Other,
}

impl IntentKind {
    pub fn from_str_loose(s: &str) -> Result<Self, AgentError> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "standard" | "find_flights" | "find_flights_standard" => Ok(Self::Standard),
            "advanced" | "find_flights_advanced" | "find_cheapest_flight"
            | "find_direct_flights" => Ok(Self::Advanced),
            "other" | "none" => Ok(Self::Other),
            _ => Err(AgentError::Validation(format!("unknown intent: {s}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Advanced => "advanced",
            Self::Other => "other",
        }
    }
}

impl TryFrom<String> for IntentKind {
    type Error = AgentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str_loose(&s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_range: bool,
}

/// Coarse intent of one user turn plus routing flags. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchIntent {
    pub intent: IntentKind,
    #[serde(default)]
    pub date_range_requested: bool,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub multicity_trip: bool,
    #[serde(default, deserialize_with = "loose_sort_preference")]
    pub sort_preference: Option<SortKey>,
}

/// Placeholders such as `"none"` or `""` mean no preference.
fn loose_sort_preference<'de, D>(deserializer: D) -> Result<Option<SortKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| SortKey::from_str_loose(&s).ok()))
}

impl SearchIntent {
    pub fn is_travel(&self) -> bool {
        self.intent != IntentKind::Other
    }

    /// A requested date range overrides the coarse label.
    pub fn wants_flexible_dates(&self) -> bool {
        self.date_range_requested
    }
}

pub fn classification_prompt(user_prompt: &str, now: NaiveDateTime) -> String {
    let now = now.format("%Y-%m-%d %H:%M:%S");
    format!(
        r#"You are a travel agent that classifies what a user wants.
The current date and time is: {now}

Choose exactly one "intent":
1. "standard": a plain search for flights between two places on a given date.
2. "advanced": the user asks for the cheapest, fastest, direct or non-stop flights, wants results sorted or filtered (by price, duration, departure or arrival time, seats, ticketing deadline), or is flexible about dates.
3. "other": anything that is not about finding flights.

Also return:
- "date_range_requested" (boolean): true if the user gives a range of dates or is flexible ("sometime next week", "between the 3rd and 10th", "cheapest dates").
- "date_range" (object, optional): {{"start_date": "YYYY-MM-DD", "end_date": "YYYY-MM-DD", "is_range": boolean}}.
- "multicity_trip" (boolean): true if the trip visits more than two cities.
- "sort_preference" (optional): one of price, duration, departure_time, arrival_time, seat_count, ticketing_deadline.

Prompt: "{user_prompt}"

Reply strictly with one JSON object and nothing else."#
    )
}

pub fn parse_intent_reply(raw: &str) -> Result<SearchIntent, AgentError> {
    let value = drop_nulls(decode_reply(raw)?);
    serde_json::from_value(value).map_err(|e| AgentError::SchemaValidation {
        raw: raw.to_string(),
        message: e.to_string(),
    })
}

/// Never fails: an unusable reply degrades to the `standard` intent.
pub async fn classify(model: &dyn LanguageModel, user_prompt: &str, now: NaiveDateTime) -> SearchIntent {
    let instruction = classification_prompt(user_prompt, now);

    let parsed = match llm::complete(model, &instruction).await {
        Ok(raw) => parse_intent_reply(&raw),
        Err(e) => Err(e),
    };

    match parsed {
        Ok(intent) => {
            info!(
                intent = intent.intent.as_str(),
                date_range = intent.date_range_requested,
                "classified prompt"
            );
            intent
        }
        Err(e) => {
            warn!(error = %e, "intent classification failed, assuming standard search");
            SearchIntent::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_intent_labels_are_accepted() {
        let i = parse_intent_reply(r#"{"intent": "find_flights_advanced"}"#).unwrap();
        assert_eq!(i.intent, IntentKind::Advanced);
        assert!(!i.date_range_requested);
    }

    #[test]
    fn unknown_label_is_a_schema_error() {
        let err = parse_intent_reply(r#"{"intent": "book_hotel"}"#).unwrap_err();
        assert_eq!(err.kind(), "schema_validation");
    }
}
