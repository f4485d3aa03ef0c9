//! Client-side filtering, sorting and summarizing of backend offers.
//!
//! The backend's own sort and filter parameters are not applied reliably,
//! so every search result passes through [`process`] before it is shown.

use std::cmp::Ordering;

use crate::model::{FlatSummary, FlightOffer};
use crate::query::{FlexibleDateQuery, FlightSearchQuery, SortKey};

/// Sort value for a missing or unparseable duration.
pub const DURATION_SENTINEL: u32 = u32::MAX;

/// Sort value for a missing timestamp or deadline.
pub const FAR_FUTURE: &str = "9999-12-31T23:59:59";

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferFilters {
    pub max_stops: Option<u32>,
    pub min_bookable_seats: Option<u32>,
    pub instant_ticketing_required: bool,
}

impl OfferFilters {
    pub fn accepts(&self, offer: &FlightOffer) -> bool {
        if let Some(max) = self.max_stops {
            if offer
                .itineraries
                .iter()
                .any(|it| it.stops() > max as usize)
            {
                return false;
            }
        }

        if let Some(min) = self.min_bookable_seats {
            if offer.number_of_bookable_seats.unwrap_or(0) < min {
                return false;
            }
        }

        if self.instant_ticketing_required && !offer.instant_ticketing_required {
            return false;
        }

        true
    }
}

impl From<&FlightSearchQuery> for OfferFilters {
    fn from(q: &FlightSearchQuery) -> Self {
        Self {
            max_stops: if q.non_stop { Some(0) } else { q.max_stops },
            min_bookable_seats: q.min_bookable_seats,
            instant_ticketing_required: q.instant_ticketing_required,
        }
    }
}

impl From<&FlexibleDateQuery> for OfferFilters {
    fn from(q: &FlexibleDateQuery) -> Self {
        Self {
            max_stops: q.non_stop.then_some(0),
            ..Default::default()
        }
    }
}

/// Parses `PT<h>H<m>M` (either part optional, at least one present) into minutes.
pub fn parse_duration(s: &str) -> Option<u32> {
    let rest = s.trim().strip_prefix("PT")?;
    if rest.is_empty() {
        return None;
    }

    let (hours, rest) = match rest.split_once('H') {
        Some((h, r)) => (h.parse::<u32>().ok()?, r),
        None => (0, rest),
    };

    let minutes = if rest.is_empty() {
        0
    } else {
        rest.strip_suffix('M')?.parse::<u32>().ok()?
    };

    hours.checked_mul(60)?.checked_add(minutes)
}

pub fn duration_minutes(s: Option<&str>) -> u32 {
    s.and_then(parse_duration).unwrap_or(DURATION_SENTINEL)
}

fn price_key(offer: &FlightOffer) -> f64 {
    offer.price_amount().unwrap_or(f64::INFINITY)
}

fn duration_key(offer: &FlightOffer) -> u32 {
    duration_minutes(offer.first_itinerary().and_then(|it| it.duration.as_deref()))
}

fn departure_key(offer: &FlightOffer) -> &str {
    offer
        .first_itinerary()
        .and_then(|it| it.segments.first())
        .and_then(|s| s.departure.at.as_deref())
        .unwrap_or(FAR_FUTURE)
}

fn arrival_key(offer: &FlightOffer) -> &str {
    offer
        .first_itinerary()
        .and_then(|it| it.segments.last())
        .and_then(|s| s.arrival.at.as_deref())
        .unwrap_or(FAR_FUTURE)
}

fn deadline_key(offer: &FlightOffer) -> &str {
    offer.last_ticketing_date.as_deref().unwrap_or(FAR_FUTURE)
}

fn compare(a: &FlightOffer, b: &FlightOffer, key: SortKey) -> Ordering {
    match key {
        SortKey::Price => price_key(a).total_cmp(&price_key(b)),
        SortKey::Duration => duration_key(a).cmp(&duration_key(b)),
        SortKey::DepartureTime => departure_key(a).cmp(departure_key(b)),
        SortKey::ArrivalTime => arrival_key(a).cmp(arrival_key(b)),
        // more availability first
        SortKey::SeatCount => b
            .number_of_bookable_seats
            .unwrap_or(0)
            .cmp(&a.number_of_bookable_seats.unwrap_or(0)),
        SortKey::TicketingDeadline => deadline_key(a).cmp(deadline_key(b)),
    }
}

/// Stable sort on a single key.
pub fn sort_offers(offers: &mut [FlightOffer], key: SortKey) {
    offers.sort_by(|a, b| compare(a, b, key));
}

/// Filters (all conjunctive), then sorts. Returns a new sequence.
pub fn process(offers: &[FlightOffer], filters: &OfferFilters, sort_by: SortKey) -> Vec<FlightOffer> {
    let mut kept: Vec<FlightOffer> = offers
        .iter()
        .filter(|o| filters.accepts(o))
        .cloned()
        .collect();
    sort_offers(&mut kept, sort_by);
    kept
}

fn or_na(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}

pub fn summarize(offer: &FlightOffer) -> FlatSummary {
    let itinerary = offer.first_itinerary();
    let first = itinerary.and_then(|it| it.segments.first());
    let last = itinerary.and_then(|it| it.segments.last());

    let stops = itinerary
        .filter(|it| !it.segments.is_empty())
        .map(|it| {
            it.segments
                .iter()
                .map(|s| s.number_of_stops)
                .sum::<u32>()
                .to_string()
        })
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let price = match offer.price.as_ref() {
        Some(p) => match (p.payable(), &p.currency) {
            (Some(amount), Some(currency)) => format!("{amount} {currency}"),
            (Some(amount), None) => amount.to_string(),
            (None, _) => NOT_AVAILABLE.to_string(),
        },
        None => NOT_AVAILABLE.to_string(),
    };

    FlatSummary {
        flight_number: first
            .and_then(|s| s.flight_number())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        origin: or_na(first.and_then(|s| s.departure.iata_code.as_deref())),
        destination: or_na(last.and_then(|s| s.arrival.iata_code.as_deref())),
        departure_time: or_na(first.and_then(|s| s.departure.at.as_deref())),
        arrival_time: or_na(last.and_then(|s| s.arrival.at.as_deref())),
        duration: or_na(itinerary.and_then(|it| it.duration.as_deref())),
        stops,
        price,
    }
}

pub fn summarize_all(offers: &[FlightOffer]) -> Vec<FlatSummary> {
    offers.iter().map(summarize).collect()
}
