//! One user turn, start to finish: classify, extract, search, respond.
//!
//! The turn is an explicit stage machine. With narration enabled the model
//! sees the results and may answer with another tool call, which sends the
//! turn back to the search stage (bounded by `max_tool_rounds`).

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::SearchClient;
use crate::config::Config;
use crate::error::AgentError;
use crate::extract::{self, ExtractionMode};
use crate::intent::{self, IntentKind, SearchIntent};
use crate::llm::{self, LanguageModel, OllamaClient};
use crate::model::{FlatSummary, OfferSource, SearchOutcome};
use crate::process;
use crate::query::{FlightSearchQuery, SearchRequest, SortKey};

pub const OTHER_RESPONSE: &str = "I am a specialized travel agent. Currently, I can help you find \
    flights. Try asking: 'Find me cheapest flights from Delhi to Mumbai tomorrow'.";

pub const NO_RESULTS_RESPONSE: &str = "I couldn't find any flights matching your criteria.";

const ILLUSTRATIVE_NOTE: &str =
    "Note: live fares are unavailable right now, so these are illustrative sample offers, not real prices.";

const MULTICITY_NOTE: &str = "Multi-city trips are searched one leg at a time; these results cover the first leg.";

const DEFAULT_TOOL_ROUNDS: usize = 2;

/// The keyed record handed from step to step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnState {
    pub user_query: String,
    pub intent: Option<SearchIntent>,
    pub search_params: Option<SearchRequest>,
    pub results: Option<SearchOutcome>,
    pub response: Option<String>,
}

impl TurnState {
    pub fn new(user_query: &str) -> Self {
        Self {
            user_query: user_query.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub response: String,
    pub intent: IntentKind,
    pub offers: Vec<FlatSummary>,
    pub source: Option<OfferSource>,
    pub warning: Option<String>,
}

impl TurnReply {
    fn from_state(state: TurnState) -> Self {
        let results = state.results;
        Self {
            response: state.response.unwrap_or_else(|| NO_RESULTS_RESPONSE.to_string()),
            intent: state.intent.map(|i| i.intent).unwrap_or_default(),
            offers: results
                .as_ref()
                .map(|r| process::summarize_all(&r.offers))
                .unwrap_or_default(),
            source: results.as_ref().map(|r| r.source),
            warning: results.and_then(|r| r.warning),
        }
    }

    fn failed(state: TurnState, err: &AgentError) -> Self {
        Self {
            response: apology(err),
            intent: state.intent.map(|i| i.intent).unwrap_or_default(),
            offers: Vec::new(),
            source: None,
            warning: None,
        }
    }
}

pub fn apology(err: &AgentError) -> String {
    format!("Sorry, I couldn't complete your search: {}.", err.reason())
}

pub fn format_response(outcome: &SearchOutcome, request: &SearchRequest) -> String {
    if outcome.offers.is_empty() {
        return NO_RESULTS_RESPONSE.to_string();
    }

    let n = outcome.offers.len();
    let noun = if n == 1 { "flight" } else { "flights" };
    match outcome.source {
        OfferSource::Live => format!("Found {n} {noun} for {}.", request.describe()),
        OfferSource::Mock => format!(
            "{ILLUSTRATIVE_NOTE} Showing {n} sample {noun} for {}.",
            request.describe()
        ),
    }
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    action: String,
    #[serde(default)]
    action_input: Value,
}

fn default_passengers() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct FlightToolInput {
    #[serde(alias = "origin_iata")]
    origin: String,
    #[serde(alias = "destination", alias = "destination_iata")]
    dest: String,
    #[serde(alias = "departure_date")]
    depart_date: NaiveDate,
    #[serde(default)]
    return_date: Option<NaiveDate>,
    #[serde(default = "default_passengers", alias = "adults")]
    passengers: u32,
}

enum ModelReply {
    Answer(String),
    Search(FlightSearchQuery),
}

fn parse_model_reply(raw: &str) -> Result<ModelReply, AgentError> {
    let text = llm::strip_fences(raw);
    if !(text.starts_with('{') && text.contains("\"action\"")) {
        return Ok(ModelReply::Answer(text.to_string()));
    }

    let call: ToolCall = serde_json::from_str(text).map_err(|e| AgentError::ExtractionFormat {
        raw: raw.to_string(),
        message: e.to_string(),
    })?;

    if call.action != "flight_search" {
        return Err(AgentError::Validation(format!("unknown tool: {}", call.action)));
    }

    let input: FlightToolInput =
        serde_json::from_value(call.action_input).map_err(|e| AgentError::SchemaValidation {
            raw: raw.to_string(),
            message: e.to_string(),
        })?;

    let mut query = FlightSearchQuery::new(&input.origin, &input.dest, input.depart_date);
    query.return_date = input.return_date;
    query.adults = input.passengers;
    Ok(ModelReply::Search(query.into_validated()?))
}

fn narration_prompt(state: &TurnState, summaries: &[FlatSummary], degraded: bool) -> String {
    let results = serde_json::to_string(summaries).unwrap_or_else(|_| "[]".to_string());
    let caveat = if degraded {
        "These results are an illustrative sample, not live fares; say so.\n"
    } else {
        ""
    };
    format!(
        r#"You are a travel agent answering a customer.
Customer request: "{}"
Search results (JSON): {results}
{caveat}Either answer the customer in a few sentences using only these results, or, if a different
search is clearly needed, reply with only this JSON:
{{"action": "flight_search", "action_input": {{"origin": "XXX", "dest": "YYY", "depart_date": "YYYY-MM-DD", "return_date": null, "passengers": 1}}}}"#,
        state.user_query
    )
}

enum Stage {
    AwaitClassification,
    AwaitToolResult,
    AwaitModel,
    Done,
    Failed(AgentError),
}

pub struct Agent {
    model: Arc<dyn LanguageModel>,
    backend: Arc<SearchClient>,
    narrate: bool,
    max_tool_rounds: usize,
}

impl Agent {
    pub fn new(model: Arc<dyn LanguageModel>, backend: Arc<SearchClient>) -> Self {
        Self {
            model,
            backend,
            narrate: false,
            max_tool_rounds: DEFAULT_TOOL_ROUNDS,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        config.backend.require_credentials()?;
        let model = OllamaClient::new(config.model.clone())?;
        let backend = SearchClient::new(config.backend.clone())?;
        Ok(Self::new(Arc::new(model), Arc::new(backend)))
    }

    pub fn with_narration(mut self, narrate: bool) -> Self {
        self.narrate = narrate;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn backend(&self) -> &SearchClient {
        &self.backend
    }

    /// Sets the intent; non-travel prompts get the canned reply and stop here.
    pub async fn classify_step(&self, mut state: TurnState, now: NaiveDateTime) -> TurnState {
        let detected = intent::classify(self.model.as_ref(), &state.user_query, now).await;
        if !detected.is_travel() {
            state.response = Some(OTHER_RESPONSE.to_string());
        }
        state.intent = Some(detected);
        state
    }

    pub async fn extract_step(&self, mut state: TurnState, now: NaiveDateTime) -> Result<TurnState, AgentError> {
        let detected = state.intent.unwrap_or_default();
        let mode = if detected.wants_flexible_dates() {
            ExtractionMode::Flexible
        } else {
            ExtractionMode::Standard
        };
        info!(?mode, intent = detected.intent.as_str(), "routing extraction");

        let mut request = extract::extract_query(self.model.as_ref(), &state.user_query, now, mode).await?;

        if let (SearchRequest::Fixed(q), Some(pref)) = (&mut request, detected.sort_preference) {
            if q.sort_by == SortKey::default() {
                q.sort_by = pref;
            }
        }

        state.search_params = Some(request);
        Ok(state)
    }

    pub async fn search_step(&self, mut state: TurnState) -> Result<TurnState, AgentError> {
        let request = state
            .search_params
            .as_ref()
            .ok_or_else(|| AgentError::Validation("no search parameters extracted".into()))?;

        let outcome = self.backend.search_advanced(request).await?;
        let mut response = format_response(&outcome, request);
        if state.intent.is_some_and(|i| i.multicity_trip) {
            response = format!("{response} {MULTICITY_NOTE}");
        }

        state.response = Some(response);
        state.results = Some(outcome);
        Ok(state)
    }

    async fn narrate_step(&self, state: &TurnState) -> Result<ModelReply, AgentError> {
        let (summaries, degraded) = match state.results {
            Some(ref r) => (process::summarize_all(&r.offers), r.is_degraded()),
            None => (Vec::new(), false),
        };
        let raw = llm::complete(self.model.as_ref(), &narration_prompt(state, &summaries, degraded)).await?;
        let reply = parse_model_reply(&raw)?;

        Ok(match reply {
            ModelReply::Answer(text) if degraded && !text.is_empty() && !text.contains(ILLUSTRATIVE_NOTE) => {
                ModelReply::Answer(format!("{ILLUSTRATIVE_NOTE} {text}"))
            }
            other => other,
        })
    }

    /// Runs one turn. Never fails: errors become an apology reply.
    pub async fn handle_turn(&self, prompt: &str, now: NaiveDateTime) -> TurnReply {
        let mut state = TurnState::new(prompt);
        let mut stage = Stage::AwaitClassification;
        let mut rounds = 0;
        let mut settled: Option<TurnState> = None;

        loop {
            stage = match stage {
                Stage::AwaitClassification => {
                    state = self.classify_step(state, now).await;
                    if state.response.is_some() {
                        Stage::Done
                    } else {
                        match self.extract_step(state.clone(), now).await {
                            Ok(next) => {
                                state = next;
                                Stage::AwaitToolResult
                            }
                            Err(e) => Stage::Failed(e),
                        }
                    }
                }
                Stage::AwaitToolResult => match self.search_step(state.clone()).await {
                    Ok(next) => {
                        state = next;
                        if self.narrate && rounds < self.max_tool_rounds {
                            Stage::AwaitModel
                        } else {
                            Stage::Done
                        }
                    }
                    Err(e) => match settled.take() {
                        Some(previous) => {
                            warn!(error = %e, "follow-up search failed, keeping earlier results");
                            state = previous;
                            Stage::Done
                        }
                        None => Stage::Failed(e),
                    },
                },
                Stage::AwaitModel => match self.narrate_step(&state).await {
                    Ok(ModelReply::Search(query)) => {
                        rounds += 1;
                        info!(round = rounds, "model requested another search");
                        settled = Some(state.clone());
                        state.search_params = Some(SearchRequest::Fixed(query));
                        Stage::AwaitToolResult
                    }
                    Ok(ModelReply::Answer(text)) => {
                        if !text.is_empty() {
                            state.response = Some(text);
                        }
                        Stage::Done
                    }
                    Err(e) => {
                        warn!(error = %e, "narration failed, keeping formatted response");
                        Stage::Done
                    }
                },
                Stage::Done => return TurnReply::from_state(state),
                Stage::Failed(e) => {
                    warn!(error = %e, kind = e.kind(), "turn failed");
                    return TurnReply::failed(state, &e);
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_an_answer() {
        match parse_model_reply("The cheapest option is AI101.").unwrap() {
            ModelReply::Answer(t) => assert_eq!(t, "The cheapest option is AI101."),
            ModelReply::Search(_) => panic!("expected answer"),
        }
    }

    #[test]
    fn tool_call_becomes_fixed_query() {
        let raw = r#"```json
{"action": "flight_search", "action_input": {"origin": "blr", "dest": "goi", "depart_date": "2025-11-10", "passengers": 2}}
```"#;
        match parse_model_reply(raw).unwrap() {
            ModelReply::Search(q) => {
                assert_eq!(q.origin_iata, "BLR");
                assert_eq!(q.destination_iata, "GOI");
                assert_eq!(q.adults, 2);
            }
            ModelReply::Answer(_) => panic!("expected search"),
        }
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let raw = r#"{"action": "hotel_search", "action_input": {}}"#;
        assert!(parse_model_reply(raw).is_err());
    }
}
