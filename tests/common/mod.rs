#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use chrono::{NaiveDate, NaiveDateTime};

use skyscout::backend::SearchClient;
use skyscout::config::BackendOptions;
use skyscout::error::AgentError;
use skyscout::llm::{ChatMessage, ChatRequest, ChatResponse, LanguageModel};

pub fn new_year_noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// Replays canned replies in order and records every prompt it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, i: usize) -> String {
        self.prompts.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let content = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(content);

        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => Ok(ChatResponse {
                message: ChatMessage {
                    role: "assistant".into(),
                    content: reply,
                },
            }),
            None => Err(AgentError::LanguageModel {
                status: 503,
                body: "script exhausted".into(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub const OFFERS_BODY: &str = r#"{
  "data": [
    {
      "id": "1",
      "numberOfBookableSeats": 4,
      "lastTicketingDate": "2025-01-01",
      "itineraries": [{
        "duration": "PT2H45M",
        "segments": [{
          "departure": {"iataCode": "DEL", "at": "2025-01-02T06:00:00"},
          "arrival": {"iataCode": "BLR", "at": "2025-01-02T08:45:00"},
          "carrierCode": "AI", "number": "101", "duration": "PT2H45M", "numberOfStops": 0
        }]
      }],
      "price": {"currency": "INR", "total": "5500.00", "grandTotal": "5500.00"}
    },
    {
      "id": "2",
      "numberOfBookableSeats": 9,
      "itineraries": [{
        "duration": "PT5H30M",
        "segments": [
          {
            "departure": {"iataCode": "DEL", "at": "2025-01-02T09:00:00"},
            "arrival": {"iataCode": "HYD", "at": "2025-01-02T11:10:00"},
            "carrierCode": "6E", "number": "201", "numberOfStops": 0
          },
          {
            "departure": {"iataCode": "HYD", "at": "2025-01-02T13:15:00"},
            "arrival": {"iataCode": "BLR", "at": "2025-01-02T14:30:00"},
            "carrierCode": "6E", "number": "305", "numberOfStops": 0
          }
        ]
      }],
      "price": {"currency": "INR", "total": "4200.00", "grandTotal": "4200.00"}
    },
    {
      "id": "3",
      "numberOfBookableSeats": 2,
      "itineraries": [{
        "duration": "PT2H40M",
        "segments": [{
          "departure": {"iataCode": "DEL", "at": "2025-01-02T18:00:00"},
          "arrival": {"iataCode": "BLR", "at": "2025-01-02T20:40:00"},
          "carrierCode": "UK", "number": "815", "numberOfStops": 0
        }]
      }],
      "price": {"currency": "INR", "total": "6100.00", "grandTotal": "6100.00"}
    }
  ]
}"#;

pub const DATES_BODY: &str = r#"{
  "data": [
    {"type": "flight-date", "origin": "MAD", "destination": "MUC", "departureDate": "2026-03-05",
     "price": {"total": "120.50"}},
    {"type": "flight-date", "origin": "MAD", "destination": "MUC", "departureDate": "2026-03-03",
     "price": {"total": "98.10"}}
  ],
  "meta": {"currency": "EUR"}
}"#;

pub const DESTINATIONS_BODY: &str = r#"{
  "data": [
    {"type": "flight-destination", "origin": "MAD", "destination": "LIS", "departureDate": "2026-03-04",
     "price": {"total": "45.00"}}
  ],
  "meta": {"currency": "EUR"}
}"#;

/// Counters and switches shared with the mock backend's handlers.
pub struct MockState {
    pub token_calls: AtomicUsize,
    pub offer_calls: AtomicUsize,
    pub dates_calls: AtomicUsize,
    pub destination_calls: AtomicUsize,
    pub token_status: AtomicU16,
    pub search_status: AtomicU16,
    pub offers_fail_after: AtomicUsize,
    pub last_query: Mutex<HashMap<String, String>>,
    pub last_auth: Mutex<Option<String>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            token_calls: AtomicUsize::new(0),
            offer_calls: AtomicUsize::new(0),
            dates_calls: AtomicUsize::new(0),
            destination_calls: AtomicUsize::new(0),
            token_status: AtomicU16::new(200),
            search_status: AtomicU16::new(200),
            offers_fail_after: AtomicUsize::new(usize::MAX),
            last_query: Mutex::new(HashMap::new()),
            last_auth: Mutex::new(None),
        }
    }
}

impl MockState {
    pub fn set_search_status(&self, status: u16) {
        self.search_status.store(status, Ordering::SeqCst);
    }

    /// Offer searches after the first `n` answer 500.
    pub fn fail_offers_after(&self, n: usize) {
        self.offers_fail_after.store(n, Ordering::SeqCst);
    }

    pub fn set_token_status(&self, status: u16) {
        self.token_status.store(status, Ordering::SeqCst);
    }

    pub fn param(&self, key: &str) -> Option<String> {
        self.last_query.lock().unwrap().get(key).cloned()
    }

    fn record(&self, query: HashMap<String, String>, headers: &HeaderMap) {
        *self.last_query.lock().unwrap() = query;
        *self.last_auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
    }

    fn search_reply(&self, ok_body: &str) -> (StatusCode, String) {
        let status = StatusCode::from_u16(self.search_status.load(Ordering::SeqCst)).unwrap();
        if status.is_success() {
            (status, ok_body.to_string())
        } else {
            (status, r#"{"errors":[{"status":500,"code":141,"title":"SYSTEM ERROR HAS OCCURRED"}]}"#.to_string())
        }
    }
}

async fn token(State(state): State<Arc<MockState>>) -> (StatusCode, String) {
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    let status = StatusCode::from_u16(state.token_status.load(Ordering::SeqCst)).unwrap();
    if status.is_success() {
        (
            status,
            r#"{"type":"amadeusOAuth2Token","access_token":"test-token","expires_in":1799}"#.into(),
        )
    } else {
        (status, r#"{"error":"invalid_client"}"#.into())
    }
}

async fn offers(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let seen = state.offer_calls.fetch_add(1, Ordering::SeqCst);
    state.record(query, &headers);
    if seen >= state.offers_fail_after.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"errors":[{"status":500,"code":141,"title":"SYSTEM ERROR HAS OCCURRED"}]}"#.to_string(),
        );
    }
    state.search_reply(OFFERS_BODY)
}

async fn dates(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.dates_calls.fetch_add(1, Ordering::SeqCst);
    state.record(query, &headers);
    state.search_reply(DATES_BODY)
}

async fn destinations(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.destination_calls.fetch_add(1, Ordering::SeqCst);
    state.record(query, &headers);
    state.search_reply(DESTINATIONS_BODY)
}

/// Starts a flight backend stand-in on an ephemeral port.
pub async fn spawn_backend() -> (SocketAddr, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/v1/security/oauth2/token", post(token))
        .route("/v2/shopping/flight-offers", get(offers))
        .route("/v1/shopping/flight-dates", get(dates))
        .route("/v1/shopping/flight-destinations", get(destinations))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

pub fn options_for(addr: SocketAddr) -> BackendOptions {
    BackendOptions {
        base_url: format!("http://{addr}"),
        client_id: "test-id".into(),
        client_secret: "test-secret".into(),
        proxy: None,
        timeout: 5,
    }
}

pub async fn client_with_backend() -> (SearchClient, Arc<MockState>) {
    let (addr, state) = spawn_backend().await;
    let client = SearchClient::new(options_for(addr)).unwrap();
    (client, state)
}
