use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default)]
    pub iata_code: Option<String>,
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(default)]
    pub departure: Endpoint,
    #[serde(default)]
    pub arrival: Endpoint,
    #[serde(default)]
    pub carrier_code: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub number_of_stops: u32,
}

impl Segment {
    pub fn flight_number(&self) -> Option<String> {
        match (&self.carrier_code, &self.number) {
            (Some(c), Some(n)) => Some(format!("{c}{n}")),
            (None, Some(n)) => Some(n.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Itinerary {
    /// Connections between segments; an empty itinerary has no stops.
    pub fn stops(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub grand_total: Option<String>,
}

impl Price {
    /// The payable figure: `grandTotal` when present, otherwise `total`.
    pub fn payable(&self) -> Option<&str> {
        self.grand_total.as_deref().or(self.total.as_deref())
    }

    pub fn amount(&self) -> Option<f64> {
        self.payable()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite())
    }
}

/// One priced offer as returned by the backend. Never mutated after decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub itineraries: Vec<Itinerary>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub number_of_bookable_seats: Option<u32>,
    #[serde(default)]
    pub instant_ticketing_required: bool,
    #[serde(default)]
    pub last_ticketing_date: Option<String>,
    #[serde(default)]
    pub validating_airline_codes: Vec<String>,
}

impl FlightOffer {
    pub fn price_amount(&self) -> Option<f64> {
        self.price.as_ref().and_then(Price::amount)
    }

    pub fn first_itinerary(&self) -> Option<&Itinerary> {
        self.itineraries.first()
    }
}

#[derive(Debug, Deserialize)]
pub struct OfferListResponse {
    #[serde(default)]
    pub data: Vec<FlightOffer>,
}

/// A cheapest-date or inspiration record: a route, dates and one price.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDate {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub price: Price,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlightDatesResponse {
    #[serde(default)]
    pub data: Vec<FlightDate>,
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
}

fn leg(from: Option<&String>, to: Option<&String>, at: Option<&String>) -> Itinerary {
    Itinerary {
        duration: None,
        segments: vec![Segment {
            departure: Endpoint {
                iata_code: from.cloned(),
                terminal: None,
                at: at.cloned(),
            },
            arrival: Endpoint {
                iata_code: to.cloned(),
                ..Default::default()
            },
            ..Default::default()
        }],
    }
}

impl FlightDate {
    pub fn into_offer(self, id: String, currency: Option<&str>) -> FlightOffer {
        let mut itineraries = vec![leg(
            self.origin.as_ref(),
            self.destination.as_ref(),
            self.departure_date.as_ref(),
        )];
        if self.return_date.is_some() {
            itineraries.push(leg(
                self.destination.as_ref(),
                self.origin.as_ref(),
                self.return_date.as_ref(),
            ));
        }

        let mut price = self.price;
        if price.currency.is_none() {
            price.currency = currency.map(String::from);
        }

        FlightOffer {
            id,
            itineraries,
            price: Some(price),
            ..Default::default()
        }
    }
}

impl FlightDatesResponse {
    pub fn into_offers(self) -> Vec<FlightOffer> {
        let currency = self.meta.and_then(|m| m.currency);
        self.data
            .into_iter()
            .enumerate()
            .map(|(i, d)| d.into_offer((i + 1).to_string(), currency.as_deref()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferSource {
    #[serde(rename = "amadeus")]
    Live,
    #[serde(rename = "amadeus_mock")]
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub source: OfferSource,
    pub offers: Vec<FlightOffer>,
    pub warning: Option<String>,
}

impl SearchOutcome {
    pub fn live(offers: Vec<FlightOffer>) -> Self {
        Self {
            source: OfferSource::Live,
            offers,
            warning: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == OfferSource::Mock
    }

    /// Same source and warning, new offer sequence.
    pub fn with_offers(&self, offers: Vec<FlightOffer>) -> Self {
        Self {
            source: self.source,
            offers,
            warning: self.warning.clone(),
        }
    }
}

/// Flat, display-ready projection of an offer. Missing data reads "N/A".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatSummary {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub stops: String,
    pub price: String,
}
