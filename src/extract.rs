use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::AgentError;
use crate::llm::{self, LanguageModel};
use crate::query::{FlexibleDateQuery, FlightSearchQuery, SearchRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    Standard,
    Flexible,
}

fn timestamp(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn standard_prompt(user_prompt: &str, now: NaiveDateTime) -> String {
    let now = timestamp(now);
    format!(
        r#"You are a helpful travel agent that extracts flight search details from user prompts.
The current date and time is: {now}

Extract the following fields. Omit a field entirely if the prompt does not mention it.
1. "origin_iata" (string, required): 3-letter IATA code of the origin city or airport.
2. "destination_iata" (string, required): 3-letter IATA code of the destination city or airport.
3. "departure_date" (string, required): YYYY-MM-DD. Convert relative dates (tomorrow, next Monday) to absolute dates using {now}.
4. "return_date" (string, optional): YYYY-MM-DD, only for round trips.
5. "adults" (integer >= 1, default 1). Convert words like "two adults" to numbers.
6. "children" (integer >= 0, default 0).
7. "infants" (integer >= 0, default 0). "an infant" means 1.
8. "currency" (3-letter code, default "INR").
9. "travel_class" (one of ECONOMY, PREMIUM_ECONOMY, BUSINESS, FIRST; default ECONOMY).
10. "non_stop" (boolean, default false).
11. "max_results" (integer >= 1, default 10). "top five" means 5.
12. "max_price" (number >= 0, optional). "under 15k" means 15000.
13. "sort_by" (one of price, duration, departure_time, arrival_time, seat_count, ticketing_deadline; default price).
14. "max_stops" (0, 1 or 2, optional).
15. "included_airlines" / "excluded_airlines" (arrays of 2-character airline codes, optional).
16. "min_bookable_seats" (integer >= 0, optional).
17. "instant_ticketing_required" (boolean, default false).

Prompt: "{user_prompt}"

Reply strictly with one JSON object and nothing else."#
    )
}

pub fn flexible_prompt(user_prompt: &str, now: NaiveDateTime) -> String {
    let now = timestamp(now);
    format!(
        r#"You are a helpful travel agent that extracts flexible-date flight search details from user prompts.
The current date and time is: {now}

Extract the following fields. Omit a field entirely if the prompt does not mention it.
1. "origin" (string, required): 3-letter IATA code of the origin city or airport.
2. "destination" (string, optional): 3-letter IATA code. Omit it when the user wants to fly anywhere.
3. "departure_date" (string, optional): YYYY-MM-DD, or an inclusive range "YYYY-MM-DD,YYYY-MM-DD". Resolve relative dates using {now}.
4. "return_date" (string, optional): same format as departure_date.
5. "non_stop" (boolean, default false).
6. "max_price" (number >= 0, optional).
7. "one_way" (boolean, default true; false when a return is requested).

Prompt: "{user_prompt}"

Reply strictly with one JSON object and nothing else."#
    )
}

/// Strips fences and parses JSON. Failure is an `ExtractionFormat` error.
pub fn decode_reply(raw: &str) -> Result<Value, AgentError> {
    serde_json::from_str(llm::strip_fences(raw)).map_err(|e| AgentError::ExtractionFormat {
        raw: raw.to_string(),
        message: e.to_string(),
    })
}

/// Treats `null` object members as omitted so field defaults apply.
pub fn drop_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, drop_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}

fn typed<T: DeserializeOwned>(raw: &str) -> Result<T, AgentError> {
    let value = drop_nulls(decode_reply(raw)?);
    serde_json::from_value(value).map_err(|e| AgentError::SchemaValidation {
        raw: raw.to_string(),
        message: e.to_string(),
    })
}

fn schema_error(raw: &str, err: AgentError) -> AgentError {
    AgentError::SchemaValidation {
        raw: raw.to_string(),
        message: err.to_string(),
    }
}

pub fn parse_fixed_reply(raw: &str) -> Result<FlightSearchQuery, AgentError> {
    typed::<FlightSearchQuery>(raw)?
        .into_validated()
        .map_err(|e| schema_error(raw, e))
}

pub fn parse_flexible_reply(raw: &str) -> Result<FlexibleDateQuery, AgentError> {
    typed::<FlexibleDateQuery>(raw)?
        .into_validated()
        .map_err(|e| schema_error(raw, e))
}

/// Asks the model for search parameters. Any malformed or invalid reply
/// fails the call; flight parameters are never guessed.
pub async fn extract_query(
    model: &dyn LanguageModel,
    user_prompt: &str,
    now: NaiveDateTime,
    mode: ExtractionMode,
) -> Result<SearchRequest, AgentError> {
    let instruction = match mode {
        ExtractionMode::Standard => standard_prompt(user_prompt, now),
        ExtractionMode::Flexible => flexible_prompt(user_prompt, now),
    };

    let raw = llm::complete(model, &instruction).await?;
    debug!(?mode, reply = %raw, "extraction reply");

    match mode {
        ExtractionMode::Standard => parse_fixed_reply(&raw).map(SearchRequest::Fixed),
        ExtractionMode::Flexible => parse_flexible_reply(&raw).map(SearchRequest::Flexible),
    }
}
