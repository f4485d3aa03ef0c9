use chrono::NaiveDate;

use skyscout::error::AgentError;
use skyscout::query::{
    parse_iso_date, split_codes, DateSpec, FlexibleDateQuery, FlightSearchQuery, SortKey, TravelClass,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_valid_query() -> FlightSearchQuery {
    FlightSearchQuery::new("DEL", "BLR", date(2026, 3, 1))
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[test]
fn valid_query_passes() {
    assert!(make_valid_query().into_validated().is_ok());
}

#[test]
fn lowercase_airport_is_normalized() {
    let q = FlightSearchQuery::new("del", " blr ", date(2026, 3, 1))
        .into_validated()
        .unwrap();
    assert_eq!(q.origin_iata, "DEL");
    assert_eq!(q.destination_iata, "BLR");
}

#[test]
fn rejects_city_name_as_airport() {
    let q = FlightSearchQuery::new("Delhi", "BLR", date(2026, 3, 1));
    assert!(matches!(q.into_validated(), Err(AgentError::InvalidAirport(_))));
}

#[test]
fn rejects_digits_in_airport() {
    let q = FlightSearchQuery::new("D3L", "BLR", date(2026, 3, 1));
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_same_origin_and_destination() {
    let q = FlightSearchQuery::new("DEL", "DEL", date(2026, 3, 1));
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_return_before_departure() {
    let mut q = make_valid_query();
    q.return_date = Some(date(2026, 2, 28));
    assert!(q.into_validated().is_err());
}

#[test]
fn same_day_return_is_allowed() {
    let mut q = make_valid_query();
    q.return_date = Some(date(2026, 3, 1));
    assert!(q.into_validated().is_ok());
}

#[test]
fn rejects_zero_adults() {
    let mut q = make_valid_query();
    q.adults = 0;
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_too_many_passengers() {
    let mut q = make_valid_query();
    q.adults = 5;
    q.children = 5;
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_more_infants_than_adults() {
    let mut q = make_valid_query();
    q.adults = 1;
    q.infants = 2;
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_negative_max_price() {
    let mut q = make_valid_query();
    q.max_price = Some(-1.0);
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_zero_max_results() {
    let mut q = make_valid_query();
    q.max_results = 0;
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_three_stops() {
    let mut q = make_valid_query();
    q.max_stops = Some(3);
    assert!(q.into_validated().is_err());
}

#[test]
fn non_stop_forces_zero_stops() {
    let mut q = make_valid_query();
    q.non_stop = true;
    q.max_stops = Some(2);
    let q = q.into_validated().unwrap();
    assert_eq!(q.max_stops, Some(0));
}

#[test]
fn zero_stops_implies_non_stop() {
    let mut q = make_valid_query();
    q.max_stops = Some(0);
    let q = q.into_validated().unwrap();
    assert!(q.non_stop);
    assert_eq!(param(&q.to_params(), "nonStop"), Some("true"));
}

#[test]
fn rejects_include_and_exclude_together() {
    let mut q = make_valid_query();
    q.included_airlines.insert("AI".into());
    q.excluded_airlines.insert("6E".into());
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_bad_carrier_code() {
    let mut q = make_valid_query();
    q.included_airlines.insert("AIR".into());
    assert!(q.into_validated().is_err());
}

#[test]
fn rejects_bad_currency() {
    let mut q = make_valid_query();
    q.currency = "RUPEE".into();
    assert!(q.into_validated().is_err());
}

#[test]
fn minimal_params() {
    let params = make_valid_query().into_validated().unwrap().to_params();
    assert_eq!(param(&params, "originLocationCode"), Some("DEL"));
    assert_eq!(param(&params, "destinationLocationCode"), Some("BLR"));
    assert_eq!(param(&params, "departureDate"), Some("2026-03-01"));
    assert_eq!(param(&params, "adults"), Some("1"));
    assert_eq!(param(&params, "currencyCode"), Some("INR"));
    assert_eq!(param(&params, "travelClass"), Some("ECONOMY"));
    assert_eq!(param(&params, "max"), Some("10"));
    assert_eq!(param(&params, "returnDate"), None);
    assert_eq!(param(&params, "children"), None);
    assert_eq!(param(&params, "nonStop"), None);
    assert_eq!(param(&params, "maxPrice"), None);
}

#[test]
fn full_params() {
    let mut q = make_valid_query();
    q.return_date = Some(date(2026, 3, 8));
    q.adults = 2;
    q.children = 1;
    q.infants = 1;
    q.travel_class = TravelClass::PremiumEconomy;
    q.max_price = Some(15000.75);
    q.included_airlines.insert("6e".into());
    q.included_airlines.insert("ai".into());
    let params = q.into_validated().unwrap().to_params();

    assert_eq!(param(&params, "returnDate"), Some("2026-03-08"));
    assert_eq!(param(&params, "children"), Some("1"));
    assert_eq!(param(&params, "infants"), Some("1"));
    assert_eq!(param(&params, "travelClass"), Some("PREMIUM_ECONOMY"));
    assert_eq!(param(&params, "maxPrice"), Some("15000"));
    assert_eq!(param(&params, "includedAirlineCodes"), Some("6E,AI"));
}

#[test]
fn deserializes_with_defaults_and_aliases() {
    let q: FlightSearchQuery = serde_json::from_str(
        r#"{"origin": "DEL", "destinationLocationCode": "BLR", "departure_date": "2026-03-01",
            "nonStop": true, "maxPrice": 9000, "sort_by": "fastest", "travel_class": "business"}"#,
    )
    .unwrap();
    assert_eq!(q.adults, 1);
    assert_eq!(q.currency, "INR");
    assert_eq!(q.max_results, 10);
    assert!(q.non_stop);
    assert_eq!(q.max_price, Some(9000.0));
    assert_eq!(q.sort_by, SortKey::Duration);
    assert_eq!(q.travel_class, TravelClass::Business);
}

#[test]
fn unknown_sort_key_fails_to_deserialize() {
    let r: Result<FlightSearchQuery, _> = serde_json::from_str(
        r#"{"origin_iata": "DEL", "destination_iata": "BLR", "departure_date": "2026-03-01", "sort_by": "comfort"}"#,
    );
    assert!(r.is_err());
}

#[test]
fn date_spec_parses_single_and_range() {
    assert_eq!(
        "2026-03-01".parse::<DateSpec>().unwrap(),
        DateSpec::Single(date(2026, 3, 1))
    );
    let range: DateSpec = "2026-03-01,2026-03-10".parse().unwrap();
    assert_eq!(range.start(), date(2026, 3, 1));
    assert_eq!(range.to_string(), "2026-03-01,2026-03-10");
}

#[test]
fn date_spec_rejects_reversed_range() {
    assert!(matches!(
        "2026-03-10,2026-03-01".parse::<DateSpec>(),
        Err(AgentError::InvalidDate(_))
    ));
    assert!("03/01/2026".parse::<DateSpec>().is_err());
}

#[test]
fn flexible_return_date_means_round_trip() {
    let mut q = FlexibleDateQuery::new("mad", Some("muc"));
    q.departure_date = Some(DateSpec::Single(date(2026, 3, 1)));
    q.return_date = Some(DateSpec::Single(date(2026, 3, 8)));
    let q = q.into_validated().unwrap();

    assert!(!q.one_way);
    let params = q.to_dates_params();
    assert_eq!(param(&params, "origin"), Some("MAD"));
    assert_eq!(param(&params, "destination"), Some("MUC"));
    assert_eq!(param(&params, "oneWay"), Some("false"));
    assert_eq!(param(&params, "returnDate"), Some("2026-03-08"));
}

#[test]
fn flexible_empty_destination_means_anywhere() {
    let q = FlexibleDateQuery::new("MAD", Some("  ")).into_validated().unwrap();
    assert!(q.is_inspiration());
    let params = q.to_inspiration_params();
    assert_eq!(param(&params, "destination"), None);
    assert_eq!(param(&params, "returnDate"), None);
}

#[test]
fn flexible_rejects_return_before_departure() {
    let mut q = FlexibleDateQuery::new("MAD", Some("MUC"));
    q.departure_date = Some(DateSpec::Single(date(2026, 3, 8)));
    q.return_date = Some(DateSpec::Single(date(2026, 3, 1)));
    assert!(q.into_validated().is_err());
}

#[test]
fn carrier_lists_are_normalized() {
    let codes = split_codes(Some(" ai, 6e,,UK "));
    assert_eq!(codes.into_iter().collect::<Vec<_>>(), ["6E", "AI", "UK"]);
    assert!(split_codes(None).is_empty());
    assert!(split_codes(Some(" , ")).is_empty());
}

#[test]
fn iso_dates_are_trimmed_and_strict() {
    assert_eq!(parse_iso_date(" 2026-03-01 ").unwrap(), date(2026, 3, 1));
    assert!(matches!(
        parse_iso_date("01/03/2026"),
        Err(AgentError::InvalidDate(s)) if s == "01/03/2026"
    ));
}
