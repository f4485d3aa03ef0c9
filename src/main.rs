use std::process;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use serde::Serialize;
use tracing::debug;

use skyscout::agent::{Agent, TurnReply};
use skyscout::backend::SearchClient;
use skyscout::config::{self, BackendOptions, Config, ModelOptions};
use skyscout::error::AgentError;
use skyscout::llm::OllamaClient;
use skyscout::model::{FlatSummary, OfferSource, SearchOutcome};
use skyscout::process::summarize_all;
use skyscout::query::{
    parse_iso_date, split_codes, DateSpec, FlexibleDateQuery, FlightSearchQuery, SearchRequest,
    SortKey, TravelClass,
};
use skyscout::table;

#[derive(Parser)]
#[command(
    name = "skyscout",
    about = "Conversational flight search from the terminal",
    version,
    after_help = "\
Examples:
  skyscout ask \"cheapest flight from Delhi to Bangalore tomorrow for 2 adults\"
  skyscout search -f DEL -t BLR -d 2026-04-01 --sort duration --top 5
  skyscout search -f BOM -t DXB -d 2026-04-01 --non-stop --json --pretty
  skyscout cheapest -f MAD -t MUC -d 2026-04-01,2026-04-10
  skyscout cheapest -f MAD --max-price 200

Credentials are read from AMADEUS_KEY / AMADEUS_SECRET (or a .env file)."
)]
struct Cli {
    #[command(flatten)]
    conn: ConnArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConnArgs {
    #[arg(long, global = true, env = "AMADEUS_BASE", default_value = config::DEFAULT_BACKEND_URL,
          value_name = "URL", help = "Flight backend base URL")]
    backend_url: String,

    #[arg(long, global = true, env = "AMADEUS_KEY", hide_env_values = true,
          value_name = "KEY", help = "Flight backend client id")]
    client_id: Option<String>,

    #[arg(long, global = true, env = "AMADEUS_SECRET", hide_env_values = true,
          value_name = "SECRET", help = "Flight backend client secret")]
    client_secret: Option<String>,

    #[arg(long, global = true, env = "OLLAMA_BASE", default_value = config::DEFAULT_MODEL_URL,
          value_name = "URL", help = "Language model server base URL")]
    model_url: String,

    #[arg(long, global = true, env = "MODEL_NAME", default_value = config::DEFAULT_MODEL,
          value_name = "NAME", help = "Language model name")]
    model: String,

    #[arg(long, global = true, value_name = "URL", help = "HTTP or SOCKS5 proxy for the flight backend")]
    proxy: Option<String>,

    #[arg(long, global = true, default_value = "30", value_name = "SECS", help = "Flight backend request timeout")]
    timeout: u64,

    #[arg(long, global = true, default_value = "60", value_name = "SECS", help = "Language model request timeout")]
    model_timeout: u64,
}

impl ConnArgs {
    fn config(&self) -> Config {
        Config {
            backend: BackendOptions {
                base_url: self.backend_url.clone(),
                client_id: self.client_id.clone().unwrap_or_default(),
                client_secret: self.client_secret.clone().unwrap_or_default(),
                proxy: self.proxy.clone(),
                timeout: self.timeout,
            },
            model: ModelOptions {
                base_url: self.model_url.clone(),
                model: self.model.clone(),
                timeout: self.model_timeout,
            },
        }
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    #[command(
        about = "Ask in plain language",
        long_about = "Classify a free-form request, extract search parameters with the language model,\n\
            search flights and print the reply. Non-travel requests get a short explanation."
    )]
    Ask(AskArgs),
    #[command(
        about = "Fixed-date flight search",
        after_help = "\
Examples:
  One-way:      skyscout search -f DEL -t BLR -d 2026-04-01
  Round-trip:   skyscout search -f DEL -t GOI -d 2026-04-01 --return-date 2026-04-08
  Fastest:      skyscout search -f DEL -t BLR -d 2026-04-01 --sort duration --top 3
  Airlines:     skyscout search -f DEL -t BLR -d 2026-04-01 --airlines AI,6E"
    )]
    Search(SearchArgs),
    #[command(
        about = "Cheapest dates for a route, or cheapest destinations from an origin",
        long_about = "Flexible-date search. With --to, finds the cheapest dates on that route;\n\
            without it, finds the cheapest destinations from --from. If the flight service\n\
            has a server fault an illustrative sample is shown and flagged on stderr."
    )]
    Cheapest(CheapestArgs),
    #[command(about = "Start MCP server for AI agents (stdio transport)")]
    Mcp {
        #[arg(long, help = "Let the model narrate results in travel_assist replies")]
        narrate: bool,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    #[arg(long, help = "One-line-per-flight output (recommended for scripts and AI agents)")]
    compact: bool,

    #[arg(long, help = "Output as JSON")]
    json: bool,

    #[arg(long, help = "Output as pretty-printed JSON")]
    pretty: bool,
}

impl OutputArgs {
    fn is_json(&self) -> bool {
        self.json || self.pretty
    }
}

#[derive(clap::Args)]
struct AskArgs {
    #[arg(value_name = "PROMPT", help = "What you are looking for, in plain language")]
    prompt: String,

    #[arg(long, help = "Let the model narrate the results (may trigger follow-up searches)")]
    narrate: bool,

    #[arg(long, default_value = "2", value_name = "N", help = "Maximum follow-up searches the model may request")]
    max_tool_rounds: usize,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args)]
struct SearchArgs {
    #[arg(short, long, value_name = "IATA", help = "Origin airport code")]
    from: String,

    #[arg(short, long, value_name = "IATA", help = "Destination airport code")]
    to: String,

    #[arg(short, long, value_name = "YYYY-MM-DD", help = "Departure date")]
    date: String,

    #[arg(long, value_name = "YYYY-MM-DD", help = "Return date (makes the search round-trip)")]
    return_date: Option<String>,

    #[arg(long, default_value = "1", value_name = "N", help = "Number of adult passengers")]
    adults: u32,

    #[arg(long, default_value = "0", value_name = "N", help = "Number of child passengers")]
    children: u32,

    #[arg(long, default_value = "0", value_name = "N", help = "Number of infants (at most one per adult)")]
    infants: u32,

    #[arg(long = "class", default_value = "economy", value_name = "CLASS",
          help = "Travel class [economy, premium-economy, business, first]")]
    travel_class: String,

    #[arg(long, default_value = "INR", value_name = "CODE", help = "Currency code (e.g. INR, USD, EUR)")]
    currency: String,

    #[arg(long, help = "Non-stop flights only")]
    non_stop: bool,

    #[arg(long, value_name = "N", help = "Maximum number of stops (0-2)")]
    max_stops: Option<u32>,

    #[arg(long, value_name = "AMOUNT", help = "Maximum total price")]
    max_price: Option<f64>,

    #[arg(long, default_value = "price", value_name = "KEY",
          help = "Sort by [price, duration, departure_time, arrival_time, seat_count, ticketing_deadline]")]
    sort: String,

    #[arg(long, default_value = "10", value_name = "N", help = "Show at most N offers after sorting")]
    top: u32,

    #[arg(long, value_name = "AI,6E,...", help = "Only these airlines (comma-separated codes)")]
    airlines: Option<String>,

    #[arg(long, value_name = "AI,6E,...", help = "Exclude these airlines (comma-separated codes)")]
    exclude_airlines: Option<String>,

    #[arg(long, value_name = "N", help = "Require at least N bookable seats")]
    min_seats: Option<u32>,

    #[arg(long, help = "Only offers that require instant ticketing")]
    instant_ticketing: bool,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args)]
struct CheapestArgs {
    #[arg(short, long, value_name = "IATA", help = "Origin airport code")]
    from: String,

    #[arg(short, long, value_name = "IATA", help = "Destination airport code (omit for anywhere)")]
    to: Option<String>,

    #[arg(short, long, value_name = "DATE[,DATE]", help = "Departure date or inclusive range")]
    date: Option<String>,

    #[arg(long, value_name = "DATE[,DATE]", help = "Return date or range (makes the search round-trip)")]
    return_date: Option<String>,

    #[arg(long, help = "Non-stop flights only")]
    non_stop: bool,

    #[arg(long, value_name = "AMOUNT", help = "Maximum price")]
    max_price: Option<f64>,

    #[command(flatten)]
    output: OutputArgs,
}

fn error_code(err: &AgentError) -> i32 {
    match err {
        AgentError::InvalidAirport(_) | AgentError::InvalidDate(_) | AgentError::Validation(_) => 2,
        AgentError::Timeout
        | AgentError::ConnectionFailed(_)
        | AgentError::TlsError(_)
        | AgentError::ProxyError(_) => 3,
        AgentError::Authentication { .. } => 4,
        AgentError::BackendSearch { .. } | AgentError::Decode(_) => 5,
        AgentError::ExtractionFormat { .. }
        | AgentError::SchemaValidation { .. }
        | AgentError::LanguageModel { .. } => 6,
        AgentError::Config(_) | AgentError::Mcp(_) => 1,
    }
}

fn die(err: &AgentError, json_mode: bool) -> ! {
    if json_mode {
        let json = serde_json::json!({
            "error": {
                "kind": err.kind(),
                "message": err.to_string(),
            }
        });
        println!("{json}");
    } else {
        eprintln!("error: {err}");
    }
    process::exit(error_code(err));
}

fn print_json<T: Serialize>(value: &T, pretty: bool) {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match encoded {
        Ok(s) => println!("{s}"),
        Err(e) => die(&AgentError::Decode(e.to_string()), true),
    }
}

fn build_fixed_query(args: &SearchArgs) -> Result<FlightSearchQuery, AgentError> {
    let mut query = FlightSearchQuery::new(&args.from, &args.to, parse_iso_date(&args.date)?);
    query.return_date = args.return_date.as_deref().map(parse_iso_date).transpose()?;
    query.adults = args.adults;
    query.children = args.children;
    query.infants = args.infants;
    query.travel_class = TravelClass::from_str_loose(&args.travel_class)?;
    query.currency = args.currency.clone();
    query.non_stop = args.non_stop;
    query.max_stops = args.max_stops;
    query.max_price = args.max_price;
    query.sort_by = SortKey::from_str_loose(&args.sort)?;
    query.max_results = args.top;
    query.included_airlines = split_codes(args.airlines.as_deref());
    query.excluded_airlines = split_codes(args.exclude_airlines.as_deref());
    query.min_bookable_seats = args.min_seats;
    query.instant_ticketing_required = args.instant_ticketing;
    query.into_validated()
}

fn build_flexible_query(args: &CheapestArgs) -> Result<FlexibleDateQuery, AgentError> {
    let mut query = FlexibleDateQuery::new(&args.from, args.to.as_deref());
    query.departure_date = args.date.as_deref().map(str::parse::<DateSpec>).transpose()?;
    query.return_date = args.return_date.as_deref().map(str::parse::<DateSpec>).transpose()?;
    query.non_stop = args.non_stop;
    query.max_price = args.max_price;
    query.into_validated()
}

#[derive(Serialize)]
struct OutcomeOutput<'a> {
    source: OfferSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
    offers: Vec<FlatSummary>,
}

/// Degraded rows get a trailing `*` on the flight number.
fn mark_illustrative(summaries: &mut [FlatSummary]) {
    for s in summaries {
        s.flight_number.push('*');
    }
}

fn print_summaries(summaries: &[FlatSummary], degraded: bool, output: &OutputArgs) {
    if summaries.is_empty() {
        println!("No flights found.");
        return;
    }

    let mut rows = summaries.to_vec();
    if degraded {
        mark_illustrative(&mut rows);
    }

    if output.compact {
        for s in &rows {
            println!("{}", table::compact_line(s));
        }
    } else {
        println!("{}", table::render(&rows));
    }

    if degraded {
        println!("* illustrative sample, not live fares");
    }
}

fn print_outcome(outcome: &SearchOutcome, output: &OutputArgs) {
    if let Some(ref warning) = outcome.warning {
        eprintln!("warning: {warning}");
    }

    let summaries = summarize_all(&outcome.offers);
    if output.is_json() {
        print_json(
            &OutcomeOutput {
                source: outcome.source,
                warning: outcome.warning.as_deref(),
                offers: summaries,
            },
            output.pretty,
        );
    } else {
        print_summaries(&summaries, outcome.is_degraded(), output);
    }
}

fn print_reply(reply: &TurnReply, output: &OutputArgs) {
    if output.is_json() {
        print_json(reply, output.pretty);
        return;
    }

    if let Some(ref warning) = reply.warning {
        eprintln!("warning: {warning}");
    }
    println!("{}", reply.response);
    if !reply.offers.is_empty() {
        println!();
        print_summaries(&reply.offers, reply.source == Some(OfferSource::Mock), output);
    }
}

fn search_client(conn: &ConnArgs, json_mode: bool) -> SearchClient {
    let options = conn.config().backend;
    if let Err(e) = options.require_credentials() {
        die(&e, json_mode);
    }
    match SearchClient::new(options) {
        Ok(c) => c,
        Err(e) => die(&e, json_mode),
    }
}

async fn run_search(client: &SearchClient, request: SearchRequest, output: &OutputArgs) {
    debug!(request = %request.describe(), "running search");
    match client.search_advanced(&request).await {
        Ok(outcome) => print_outcome(&outcome, output),
        Err(e) => die(&e, output.is_json()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mcp { narrate } => {
            if let Err(e) = skyscout::mcp::run(&cli.conn.config(), narrate).await {
                die(&e, false);
            }
        }
        Commands::Ask(args) => {
            let json_mode = args.output.is_json();
            let config = cli.conn.config();
            let backend = search_client(&cli.conn, json_mode);
            let model = match OllamaClient::new(config.model) {
                Ok(m) => m,
                Err(e) => die(&e, json_mode),
            };

            let agent = Agent::new(Arc::new(model), Arc::new(backend))
                .with_narration(args.narrate)
                .with_max_tool_rounds(args.max_tool_rounds);

            let reply = agent.handle_turn(&args.prompt, Local::now().naive_local()).await;
            print_reply(&reply, &args.output);
        }
        Commands::Search(args) => {
            let json_mode = args.output.is_json();
            let query = match build_fixed_query(&args) {
                Ok(q) => q,
                Err(e) => die(&e, json_mode),
            };
            let client = search_client(&cli.conn, json_mode);
            run_search(&client, SearchRequest::Fixed(query), &args.output).await;
        }
        Commands::Cheapest(args) => {
            let json_mode = args.output.is_json();
            let query = match build_flexible_query(&args) {
                Ok(q) => q,
                Err(e) => die(&e, json_mode),
            };
            let client = search_client(&cli.conn, json_mode);
            run_search(&client, SearchRequest::Flexible(query), &args.output).await;
        }
    }
}
