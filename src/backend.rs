use std::time::{Duration, Instant};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BackendOptions;
use crate::error::{self, AgentError};
use crate::model::{
    Endpoint, FlightDatesResponse, FlightOffer, Itinerary, OfferListResponse, OfferSource, Price,
    SearchOutcome, Segment,
};
use crate::process::{self, OfferFilters};
use crate::query::{FlexibleDateQuery, FlightSearchQuery, SearchRequest, SortKey};

const TOKEN_PATH: &str = "/v1/security/oauth2/token";
const OFFERS_PATH: &str = "/v2/shopping/flight-offers";
const DATES_PATH: &str = "/v1/shopping/flight-dates";
const DESTINATIONS_PATH: &str = "/v1/shopping/flight-destinations";

/// Tokens are treated as expired this long before the backend says so.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

pub const DEGRADED_WARNING: &str = "Live fares are unavailable because the flight service \
    reported a server error. The offers below are an illustrative sample, not real prices.";

#[derive(Debug, Clone)]
pub struct AuthToken {
    pub access_token: String,
    pub expires_at: Instant,
}

impl AuthToken {
    pub fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, AgentError> {
    serde_json::from_str(body).map_err(|e| AgentError::Decode(e.to_string()))
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Flight-search REST client. Owns its token cache; clients never share tokens.
pub struct SearchClient {
    options: BackendOptions,
    client: wreq::Client,
    token: Mutex<Option<AuthToken>>,
}

impl SearchClient {
    pub fn new(options: BackendOptions) -> Result<Self, AgentError> {
        let mut builder = wreq::Client::builder().timeout(Duration::from_secs(options.timeout));

        if let Some(ref proxy) = options.proxy {
            builder = builder.proxy(wreq::Proxy::all(proxy).map_err(error::from_http_error)?);
        }

        let client = builder.build().map_err(error::from_http_error)?;

        Ok(Self {
            options,
            client,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.options.base_url.trim_end_matches('/'))
    }

    /// Returns the cached bearer token, refreshing it when absent or expired.
    ///
    /// The cache lock is held across the exchange, so concurrent callers wait
    /// for one refresh instead of issuing their own.
    pub async fn authenticate(&self) -> Result<String, AgentError> {
        let mut cached = self.token.lock().await;

        if let Some(ref token) = *cached {
            if token.is_valid(Instant::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange_credentials().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn exchange_credentials(&self) -> Result<AuthToken, AgentError> {
        debug!("requesting new backend token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.options.client_id.as_str()),
            ("client_secret", self.options.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(self.url(TOKEN_PATH).as_str())
            .form(&form)
            .send()
            .await
            .map_err(error::from_http_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(error::from_http_error)?;

        if !is_success(status) {
            warn!(status, "backend authentication failed");
            return Err(AgentError::Authentication { status, body });
        }

        let token: TokenResponse = decode(&body)?;
        let ttl = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);

        Ok(AuthToken {
            access_token: token.access_token,
            expires_at: Instant::now() + ttl,
        })
    }

    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<(u16, String), AgentError> {
        let token = self.authenticate().await?;
        debug!(path, ?params, "backend request");

        let response = self
            .client
            .get(self.url(path).as_str())
            .query(params)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(error::from_http_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(error::from_http_error)?;
        Ok((status, body))
    }

    /// Raw offer page for a fixed-date search. Not filtered or sorted here.
    pub async fn search_fixed_date(&self, query: &FlightSearchQuery) -> Result<Vec<FlightOffer>, AgentError> {
        let (status, body) = self.get(OFFERS_PATH, &query.to_params()).await?;

        if !is_success(status) {
            return Err(AgentError::BackendSearch { status, body });
        }

        let page: OfferListResponse = decode(&body)?;
        info!(offers = page.data.len(), "fixed-date search returned");
        Ok(page.data)
    }

    /// Cheapest-date search for a route, or inspiration search when no
    /// destination is given. A server fault yields a tagged mock sample.
    pub async fn search_flexible_dates(&self, query: &FlexibleDateQuery) -> Result<SearchOutcome, AgentError> {
        let (path, params) = if query.is_inspiration() {
            (DESTINATIONS_PATH, query.to_inspiration_params())
        } else {
            (DATES_PATH, query.to_dates_params())
        };

        let (status, body) = self.get(path, &params).await?;

        if status >= 500 {
            warn!(status, path, "backend server fault, substituting illustrative sample");
            return Ok(degraded_outcome(query));
        }

        if !is_success(status) {
            return Err(AgentError::BackendSearch { status, body });
        }

        let page: FlightDatesResponse = decode(&body)?;
        let offers = page.into_offers();
        info!(offers = offers.len(), path, "flexible-date search returned");
        Ok(SearchOutcome::live(offers))
    }

    /// Search followed by client-side filtering and sorting. The whole page is
    /// sorted before truncating to `max_results`.
    pub async fn search_advanced(&self, request: &SearchRequest) -> Result<SearchOutcome, AgentError> {
        match request {
            SearchRequest::Fixed(query) => {
                let raw = self.search_fixed_date(query).await?;
                let mut offers = process::process(&raw, &OfferFilters::from(query), query.sort_by);
                offers.truncate(query.max_results as usize);
                Ok(SearchOutcome::live(offers))
            }
            SearchRequest::Flexible(query) => {
                let outcome = self.search_flexible_dates(query).await?;
                let offers =
                    process::process(&outcome.offers, &OfferFilters::from(query), SortKey::Price);
                Ok(outcome.with_offers(offers))
            }
        }
    }
}

fn mock_segment(from: &str, to: &str, dep: Option<String>, arr: Option<String>, carrier: &str, number: &str) -> Segment {
    Segment {
        departure: Endpoint {
            iata_code: Some(from.to_string()),
            terminal: None,
            at: dep,
        },
        arrival: Endpoint {
            iata_code: Some(to.to_string()),
            terminal: None,
            at: arr,
        },
        carrier_code: Some(carrier.to_string()),
        number: Some(number.to_string()),
        duration: None,
        number_of_stops: 0,
    }
}

fn mock_price(total: &str) -> Option<Price> {
    Some(Price {
        currency: Some("INR".to_string()),
        total: Some(total.to_string()),
        grand_total: Some(total.to_string()),
    })
}

/// Fixed two-offer sample used when the backend cannot answer.
pub fn mock_sample(query: &FlexibleDateQuery) -> Vec<FlightOffer> {
    let origin = query.origin.as_str();
    let dest = query.destination.as_deref().unwrap_or("ANY");
    let day = query
        .departure_date
        .map(|d| d.start().format("%Y-%m-%d").to_string());
    let at = |time: &str| day.as_ref().map(|d| format!("{d}T{time}"));

    vec![
        FlightOffer {
            id: "MOCK-F1".to_string(),
            itineraries: vec![Itinerary {
                duration: Some("PT6H10M".to_string()),
                segments: vec![mock_segment(origin, dest, at("06:00:00"), at("12:10:00"), "AI", "101")],
            }],
            price: mock_price("45000.00"),
            number_of_bookable_seats: Some(9),
            instant_ticketing_required: false,
            last_ticketing_date: None,
            validating_airline_codes: vec!["AI".to_string()],
        },
        FlightOffer {
            id: "MOCK-F2".to_string(),
            itineraries: vec![Itinerary {
                duration: Some("PT9H40M".to_string()),
                segments: vec![
                    mock_segment(origin, "DXB", at("09:00:00"), at("12:30:00"), "EK", "511"),
                    mock_segment("DXB", dest, at("14:00:00"), at("18:40:00"), "EK", "003"),
                ],
            }],
            price: mock_price("38000.00"),
            number_of_bookable_seats: Some(4),
            instant_ticketing_required: false,
            last_ticketing_date: None,
            validating_airline_codes: vec!["EK".to_string()],
        },
    ]
}

pub fn degraded_outcome(query: &FlexibleDateQuery) -> SearchOutcome {
    SearchOutcome {
        source: OfferSource::Mock,
        offers: mock_sample(query),
        warning: Some(DEGRADED_WARNING.to_string()),
    }
}
