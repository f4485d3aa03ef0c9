use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

const MAX_PASSENGERS: u32 = 9;
const MAX_STOPS_LIMIT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum SortKey {
    #[default]
    Price,
    Duration,
    DepartureTime,
    ArrivalTime,
    SeatCount,
    TicketingDeadline,
}

fn loose_token(s: &str) -> String {
    s.trim().to_lowercase().replace(['-', ' '], "_")
}

impl SortKey {
    pub fn from_str_loose(s: &str) -> Result<Self, AgentError> {
        match loose_token(s).as_str() {
            "price" | "cheapest" => Ok(Self::Price),
            "duration" | "fastest" | "shortest" => Ok(Self::Duration),
            "departure_time" | "departure" => Ok(Self::DepartureTime),
            "arrival_time" | "arrival" => Ok(Self::ArrivalTime),
            "seat_count" | "seats" | "availability" => Ok(Self::SeatCount),
            "ticketing_deadline" | "deadline" | "last_ticketing_date" => {
                Ok(Self::TicketingDeadline)
            }
            _ => Err(AgentError::Validation(format!("invalid sort key: {s}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Duration => "duration",
            Self::DepartureTime => "departure_time",
            Self::ArrivalTime => "arrival_time",
            Self::SeatCount => "seat_count",
            Self::TicketingDeadline => "ticketing_deadline",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_loose(s)
    }
}

impl TryFrom<String> for SortKey {
    type Error = AgentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str_loose(&s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum TravelClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl TravelClass {
    pub fn from_str_loose(s: &str) -> Result<Self, AgentError> {
        match loose_token(s).as_str() {
            "economy" => Ok(Self::Economy),
            "premium_economy" => Ok(Self::PremiumEconomy),
            "business" => Ok(Self::Business),
            "first" => Ok(Self::First),
            _ => Err(AgentError::Validation(format!("invalid travel class: {s}"))),
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Economy => "ECONOMY",
            Self::PremiumEconomy => "PREMIUM_ECONOMY",
            Self::Business => "BUSINESS",
            Self::First => "FIRST",
        }
    }
}

impl TryFrom<String> for TravelClass {
    type Error = AgentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str_loose(&s)
    }
}

/// A single ISO date or an inclusive `start,end` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateSpec {
    Single(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

pub fn parse_iso_date(s: &str) -> Result<NaiveDate, AgentError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| AgentError::InvalidDate(s.trim().to_string()))
}

/// Comma-separated carrier codes, upper-cased, blanks dropped.
pub fn split_codes(s: Option<&str>) -> BTreeSet<String> {
    s.map(|list| {
        list.split(',')
            .map(|a| a.trim().to_uppercase())
            .filter(|a| !a.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

impl DateSpec {
    pub fn start(&self) -> NaiveDate {
        match self {
            Self::Single(d) => *d,
            Self::Range { start, .. } => *start,
        }
    }
}

impl FromStr for DateSpec {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(',') {
            None => Ok(Self::Single(parse_iso_date(s)?)),
            Some((a, b)) => {
                let start = parse_iso_date(a)?;
                let end = parse_iso_date(b)?;
                if end < start {
                    return Err(AgentError::InvalidDate(s.to_string()));
                }
                Ok(Self::Range { start, end })
            }
        }
    }
}

impl fmt::Display for DateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Range { start, end } => write!(
                f,
                "{},{}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
        }
    }
}

impl TryFrom<String> for DateSpec {
    type Error = AgentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DateSpec> for String {
    fn from(date: DateSpec) -> Self {
        date.to_string()
    }
}

fn default_adults() -> u32 {
    1
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_max_results() -> u32 {
    10
}

fn default_one_way() -> bool {
    true
}

/// Fixed-date point-to-point search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSearchQuery {
    #[serde(alias = "origin", alias = "originLocationCode")]
    pub origin_iata: String,
    #[serde(alias = "destination", alias = "destinationLocationCode")]
    pub destination_iata: String,
    #[serde(alias = "departureDate")]
    pub departure_date: NaiveDate,
    #[serde(default, alias = "returnDate")]
    pub return_date: Option<NaiveDate>,
    #[serde(default = "default_adults")]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, alias = "travelClass")]
    pub travel_class: TravelClass,
    #[serde(default, alias = "nonStop")]
    pub non_stop: bool,
    #[serde(default = "default_max_results", alias = "max")]
    pub max_results: u32,
    #[serde(default, alias = "maxPrice")]
    pub max_price: Option<f64>,
    #[serde(default, alias = "sort_preference")]
    pub sort_by: SortKey,
    #[serde(default)]
    pub max_stops: Option<u32>,
    #[serde(default)]
    pub included_airlines: BTreeSet<String>,
    #[serde(default)]
    pub excluded_airlines: BTreeSet<String>,
    #[serde(default)]
    pub min_bookable_seats: Option<u32>,
    #[serde(default)]
    pub instant_ticketing_required: bool,
}

fn validate_airport(code: &str) -> Result<(), AgentError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(AgentError::InvalidAirport(code.to_string()));
    }
    Ok(())
}

fn validate_carrier(code: &str) -> Result<(), AgentError> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err(AgentError::Validation(format!(
            "invalid airline code \"{code}\", must be 2 letters or digits (e.g. AI, 6E)"
        )));
    }
    Ok(())
}

fn validate_max_price(max_price: Option<f64>) -> Result<(), AgentError> {
    match max_price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(AgentError::Validation(format!(
            "max price must be a non-negative number, got {p}"
        ))),
        _ => Ok(()),
    }
}

fn normalize_codes(codes: BTreeSet<String>) -> BTreeSet<String> {
    codes
        .into_iter()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

fn join_codes(codes: &BTreeSet<String>) -> String {
    codes.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

impl FlightSearchQuery {
    pub fn new(origin: &str, destination: &str, departure_date: NaiveDate) -> Self {
        Self {
            origin_iata: origin.to_string(),
            destination_iata: destination.to_string(),
            departure_date,
            return_date: None,
            adults: default_adults(),
            children: 0,
            infants: 0,
            currency: default_currency(),
            travel_class: TravelClass::default(),
            non_stop: false,
            max_results: default_max_results(),
            max_price: None,
            sort_by: SortKey::default(),
            max_stops: None,
            included_airlines: BTreeSet::new(),
            excluded_airlines: BTreeSet::new(),
            min_bookable_seats: None,
            instant_ticketing_required: false,
        }
    }

    /// Upper-cases codes and reconciles `non_stop` with `max_stops`:
    /// `non_stop` forces zero stops, and zero stops implies `non_stop`.
    pub fn normalize(mut self) -> Self {
        self.origin_iata = self.origin_iata.trim().to_uppercase();
        self.destination_iata = self.destination_iata.trim().to_uppercase();
        self.currency = self.currency.trim().to_uppercase();
        self.included_airlines = normalize_codes(self.included_airlines);
        self.excluded_airlines = normalize_codes(self.excluded_airlines);

        if self.non_stop {
            self.max_stops = Some(0);
        } else if self.max_stops == Some(0) {
            self.non_stop = true;
        }
        self
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        validate_airport(&self.origin_iata)?;
        validate_airport(&self.destination_iata)?;

        if self.origin_iata == self.destination_iata {
            return Err(AgentError::Validation(format!(
                "origin and destination are both {}",
                self.origin_iata
            )));
        }

        if let Some(ret) = self.return_date {
            if ret < self.departure_date {
                return Err(AgentError::Validation(format!(
                    "return date {ret} is before departure date {}",
                    self.departure_date
                )));
            }
        }

        if self.adults < 1 {
            return Err(AgentError::Validation(
                "at least one adult passenger required".into(),
            ));
        }

        let total = self.adults + self.children;
        if total > MAX_PASSENGERS {
            return Err(AgentError::Validation(format!(
                "total seated passengers ({total}) exceeds maximum of {MAX_PASSENGERS}"
            )));
        }

        if self.infants > self.adults {
            return Err(AgentError::Validation(
                "infants cannot exceed number of adults".into(),
            ));
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AgentError::Validation(format!(
                "invalid currency code \"{}\", must be 3 letters (e.g. INR, EUR)",
                self.currency
            )));
        }

        if self.max_results < 1 {
            return Err(AgentError::Validation("max results must be at least 1".into()));
        }

        validate_max_price(self.max_price)?;

        if let Some(n) = self.max_stops {
            if n > MAX_STOPS_LIMIT {
                return Err(AgentError::Validation(format!(
                    "max stops must be 0, 1 or 2, got {n}"
                )));
            }
        }

        if self.non_stop && self.max_stops != Some(0) {
            return Err(AgentError::Validation(
                "non-stop search conflicts with max stops".into(),
            ));
        }

        for code in self.included_airlines.iter().chain(&self.excluded_airlines) {
            validate_carrier(code)?;
        }

        if !self.included_airlines.is_empty() && !self.excluded_airlines.is_empty() {
            return Err(AgentError::Validation(
                "cannot both include and exclude airlines in one search".into(),
            ));
        }

        Ok(())
    }

    pub fn into_validated(self) -> Result<Self, AgentError> {
        let query = self.normalize();
        query.validate()?;
        Ok(query)
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("originLocationCode".to_string(), self.origin_iata.clone()),
            ("destinationLocationCode".to_string(), self.destination_iata.clone()),
            ("departureDate".to_string(), self.departure_date.format("%Y-%m-%d").to_string()),
            ("adults".to_string(), self.adults.to_string()),
            ("currencyCode".to_string(), self.currency.clone()),
            ("max".to_string(), self.max_results.to_string()),
        ];

        if let Some(ret) = self.return_date {
            params.push(("returnDate".to_string(), ret.format("%Y-%m-%d").to_string()));
        }
        params.push(("travelClass".to_string(), self.travel_class.as_param().to_string()));
        if self.children > 0 {
            params.push(("children".to_string(), self.children.to_string()));
        }
        if self.infants > 0 {
            params.push(("infants".to_string(), self.infants.to_string()));
        }
        if self.non_stop {
            params.push(("nonStop".to_string(), "true".to_string()));
        }
        if let Some(p) = self.max_price {
            params.push(("maxPrice".to_string(), (p.trunc() as u64).to_string()));
        }
        if !self.included_airlines.is_empty() {
            params.push((
                "includedAirlineCodes".to_string(),
                join_codes(&self.included_airlines),
            ));
        }
        if !self.excluded_airlines.is_empty() {
            params.push((
                "excludedAirlineCodes".to_string(),
                join_codes(&self.excluded_airlines),
            ));
        }

        params
    }
}

/// Cheapest-date or inspiration search. No destination means "anywhere".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexibleDateQuery {
    #[serde(alias = "origin_iata")]
    pub origin: String,
    #[serde(default, alias = "destination_iata")]
    pub destination: Option<String>,
    #[serde(default, alias = "departureDate")]
    pub departure_date: Option<DateSpec>,
    #[serde(default, alias = "returnDate")]
    pub return_date: Option<DateSpec>,
    #[serde(default, alias = "nonStop")]
    pub non_stop: bool,
    #[serde(default, alias = "maxPrice")]
    pub max_price: Option<f64>,
    #[serde(default = "default_one_way", alias = "oneWay")]
    pub one_way: bool,
}

impl FlexibleDateQuery {
    pub fn new(origin: &str, destination: Option<&str>) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.map(String::from),
            departure_date: None,
            return_date: None,
            non_stop: false,
            max_price: None,
            one_way: default_one_way(),
        }
    }

    /// A return date always means a round trip, whatever `one_way` said.
    pub fn normalize(mut self) -> Self {
        self.origin = self.origin.trim().to_uppercase();
        self.destination = self
            .destination
            .map(|d| d.trim().to_uppercase())
            .filter(|d| !d.is_empty());
        if self.return_date.is_some() {
            self.one_way = false;
        }
        self
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        validate_airport(&self.origin)?;
        if let Some(ref dest) = self.destination {
            validate_airport(dest)?;
        }

        if let (Some(dep), Some(ret)) = (self.departure_date, self.return_date) {
            if ret.start() < dep.start() {
                return Err(AgentError::Validation(format!(
                    "return date {ret} is before departure date {dep}"
                )));
            }
        }

        validate_max_price(self.max_price)?;

        if self.return_date.is_some() && self.one_way {
            return Err(AgentError::Validation(
                "one-way search cannot carry a return date".into(),
            ));
        }

        Ok(())
    }

    pub fn into_validated(self) -> Result<Self, AgentError> {
        let query = self.normalize();
        query.validate()?;
        Ok(query)
    }

    pub fn is_inspiration(&self) -> bool {
        self.destination.is_none()
    }

    /// Parameters for the route-specific cheapest-dates operation.
    pub fn to_dates_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("origin".to_string(), self.origin.clone()),
            ("oneWay".to_string(), self.one_way.to_string()),
        ];
        if let Some(ref dest) = self.destination {
            params.push(("destination".to_string(), dest.clone()));
        }
        if let Some(dep) = self.departure_date {
            params.push(("departureDate".to_string(), dep.to_string()));
        }
        if let Some(ret) = self.return_date {
            params.push(("returnDate".to_string(), ret.to_string()));
        }
        self.push_common(&mut params);
        params
    }

    /// Parameters for the destination-inspiration operation.
    pub fn to_inspiration_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("origin".to_string(), self.origin.clone()),
            ("oneWay".to_string(), self.one_way.to_string()),
        ];
        if let Some(dep) = self.departure_date {
            params.push(("departureDate".to_string(), dep.to_string()));
        }
        self.push_common(&mut params);
        params
    }

    fn push_common(&self, params: &mut Vec<(String, String)>) {
        if self.non_stop {
            params.push(("nonStop".to_string(), "true".to_string()));
        }
        if let Some(p) = self.max_price {
            params.push(("maxPrice".to_string(), (p.trunc() as u64).to_string()));
        }
    }
}

/// A validated request, tagged by the backend operation it targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchRequest {
    Fixed(FlightSearchQuery),
    Flexible(FlexibleDateQuery),
}

impl SearchRequest {
    pub fn describe(&self) -> String {
        match self {
            Self::Fixed(q) => format!(
                "{} to {} on {}",
                q.origin_iata, q.destination_iata, q.departure_date
            ),
            Self::Flexible(q) => match (&q.destination, q.departure_date) {
                (Some(dest), Some(dep)) => format!("{} to {dest} around {dep}", q.origin),
                (Some(dest), None) => format!("{} to {dest}", q.origin),
                (None, _) => format!("{} to anywhere", q.origin),
            },
        }
    }
}
