use std::fmt;
use std::sync::Arc;

use chrono::Local;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::Agent;
use crate::config::Config;
use crate::error::AgentError;
use crate::model::{FlatSummary, OfferSource, SearchOutcome};
use crate::process;
use crate::query::{
    parse_iso_date, split_codes, DateSpec, FlexibleDateQuery, FlightSearchQuery, SearchRequest,
    SortKey, TravelClass,
};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AssistArgs {
    #[schemars(
        description = "The traveller's request in plain language. Example: 'cheapest non-stop flight from Delhi to Bangalore next Friday for 2 adults'"
    )]
    prompt: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct OfferArgs {
    #[schemars(description = "Origin airport IATA code, exactly 3 letters. Example: DEL")]
    origin: String,
    #[schemars(description = "Destination airport IATA code, exactly 3 letters. Example: BLR")]
    destination: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format. Example: 2026-03-01")]
    date: String,
    #[schemars(description = "Return date in YYYY-MM-DD for a round trip")]
    return_date: Option<String>,
    #[schemars(description = "Adult passengers. Default: 1")]
    adults: Option<u32>,
    #[schemars(description = "Child passengers. Default: 0")]
    children: Option<u32>,
    #[schemars(description = "Infants, at most one per adult. Default: 0")]
    infants: Option<u32>,
    #[schemars(description = "One of: economy, premium-economy, business, first. Default: economy")]
    travel_class: Option<String>,
    #[schemars(description = "Currency code. Examples: INR, USD, EUR. Default: INR")]
    currency: Option<String>,
    #[schemars(description = "Only non-stop flights")]
    non_stop: Option<bool>,
    #[schemars(description = "Maximum stops on the outbound itinerary, 0 to 2")]
    max_stops: Option<u32>,
    #[schemars(description = "Maximum total price in the requested currency")]
    max_price: Option<f64>,
    #[schemars(
        description = "One of: price, duration, departure_time, arrival_time, seat_count, ticketing_deadline. Default: price"
    )]
    sort_by: Option<String>,
    #[schemars(description = "Return at most N offers after sorting. Default: 10")]
    max_results: Option<u32>,
    #[schemars(description = "Only these airlines, comma-separated 2-character codes. Example: AI,6E")]
    airlines: Option<String>,
    #[schemars(description = "Exclude these airlines, comma-separated 2-character codes")]
    exclude_airlines: Option<String>,
    #[schemars(description = "Drop offers with fewer bookable seats than this")]
    min_bookable_seats: Option<u32>,
    #[schemars(description = "Only offers that require instant ticketing")]
    instant_ticketing_required: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CheapestDatesArgs {
    #[schemars(description = "Origin airport IATA code, exactly 3 letters. Example: MAD")]
    origin: String,
    #[schemars(
        description = "Destination airport IATA code. Omit to find the cheapest destinations from origin"
    )]
    destination: Option<String>,
    #[schemars(
        description = "Departure date YYYY-MM-DD, or an inclusive range START,END. Example: 2026-03-01,2026-03-10"
    )]
    departure_date: Option<String>,
    #[schemars(description = "Return date YYYY-MM-DD or range START,END. Makes the search round-trip")]
    return_date: Option<String>,
    #[schemars(description = "Only non-stop flights")]
    non_stop: Option<bool>,
    #[schemars(description = "Maximum price")]
    max_price: Option<f64>,
}

#[derive(Serialize)]
struct ToolOutput<'a> {
    source: OfferSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
    offers: Vec<FlatSummary>,
}

fn tool_error(msg: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.into())]))
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    match serde_json::to_string_pretty(value) {
        Ok(json) => Ok(CallToolResult::success(vec![Content::text(json)])),
        Err(e) => tool_error(format!("failed to encode result: {e}")),
    }
}

fn outcome_result(outcome: &SearchOutcome) -> Result<CallToolResult, McpError> {
    json_result(&ToolOutput {
        source: outcome.source,
        warning: outcome.warning.as_deref(),
        offers: process::summarize_all(&outcome.offers),
    })
}

fn offer_query(args: OfferArgs) -> Result<FlightSearchQuery, AgentError> {
    let mut query = FlightSearchQuery::new(&args.origin, &args.destination, parse_iso_date(&args.date)?);
    query.return_date = args.return_date.as_deref().map(parse_iso_date).transpose()?;
    query.adults = args.adults.unwrap_or(1);
    query.children = args.children.unwrap_or(0);
    query.infants = args.infants.unwrap_or(0);
    if let Some(ref c) = args.travel_class {
        query.travel_class = TravelClass::from_str_loose(c)?;
    }
    if let Some(c) = args.currency {
        query.currency = c;
    }
    query.non_stop = args.non_stop.unwrap_or(false);
    query.max_stops = args.max_stops;
    query.max_price = args.max_price;
    if let Some(ref s) = args.sort_by {
        query.sort_by = SortKey::from_str_loose(s)?;
    }
    if let Some(n) = args.max_results {
        query.max_results = n;
    }
    query.included_airlines = split_codes(args.airlines.as_deref());
    query.excluded_airlines = split_codes(args.exclude_airlines.as_deref());
    query.min_bookable_seats = args.min_bookable_seats;
    query.instant_ticketing_required = args.instant_ticketing_required.unwrap_or(false);
    query.into_validated()
}

fn dates_query(args: CheapestDatesArgs) -> Result<FlexibleDateQuery, AgentError> {
    let mut query = FlexibleDateQuery::new(&args.origin, args.destination.as_deref());
    query.departure_date = args
        .departure_date
        .as_deref()
        .map(str::parse::<DateSpec>)
        .transpose()?;
    query.return_date = args.return_date.as_deref().map(str::parse::<DateSpec>).transpose()?;
    query.non_stop = args.non_stop.unwrap_or(false);
    query.max_price = args.max_price;
    query.into_validated()
}

#[derive(Clone)]
struct TravelMcp {
    agent: Arc<Agent>,
    tool_router: ToolRouter<Self>,
}

impl fmt::Debug for TravelMcp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TravelMcp").finish_non_exhaustive()
    }
}

#[tool_router]
impl TravelMcp {
    fn new(agent: Agent) -> Self {
        Self {
            agent: Arc::new(agent),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Answer a free-form travel request. Classifies the request, extracts search parameters with the language model, searches flights and returns a reply with the offers found. Non-travel requests get a short explanation of what is supported."
    )]
    async fn travel_assist(
        &self,
        Parameters(args): Parameters<AssistArgs>,
    ) -> Result<CallToolResult, McpError> {
        let now = Local::now().naive_local();
        let reply = self.agent.handle_turn(&args.prompt, now).await;
        json_result(&reply)
    }

    #[tool(
        description = "Search flight offers for a fixed date and route. Results are filtered and sorted client-side, then truncated to max_results. Returns JSON with source, optional warning and flat offer summaries."
    )]
    async fn flight_offers(
        &self,
        Parameters(args): Parameters<OfferArgs>,
    ) -> Result<CallToolResult, McpError> {
        let query = match offer_query(args) {
            Ok(q) => q,
            Err(e) => return tool_error(e.to_string()),
        };

        match self.agent.backend().search_advanced(&SearchRequest::Fixed(query)).await {
            Ok(outcome) => outcome_result(&outcome),
            Err(e) => tool_error(e.to_string()),
        }
    }

    #[tool(
        description = "Find the cheapest travel dates for a route, or the cheapest destinations from an origin when destination is omitted. If source is amadeus_mock the offers are an illustrative sample, not live prices."
    )]
    async fn cheapest_dates(
        &self,
        Parameters(args): Parameters<CheapestDatesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let query = match dates_query(args) {
            Ok(q) => q,
            Err(e) => return tool_error(e.to_string()),
        };

        match self.agent.backend().search_advanced(&SearchRequest::Flexible(query)).await {
            Ok(outcome) => outcome_result(&outcome),
            Err(e) => tool_error(e.to_string()),
        }
    }
}

#[tool_handler]
impl ServerHandler for TravelMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "skyscout".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Travel search tools. Use travel_assist for natural-language requests, flight_offers for a known route and date, and cheapest_dates when dates are flexible. Results tagged amadeus_mock are illustrative, never quote them as real fares.".into(),
            ),
        }
    }
}

pub async fn run(config: &Config, narrate: bool) -> Result<(), AgentError> {
    let agent = Agent::from_config(config)?.with_narration(narrate);
    info!("starting MCP server on stdio");

    let service = TravelMcp::new(agent)
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| AgentError::Mcp(e.to_string()))?;
    service
        .waiting()
        .await
        .map_err(|e| AgentError::Mcp(e.to_string()))?;
    Ok(())
}
