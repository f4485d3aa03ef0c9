mod common;

use chrono::NaiveDate;

use common::{new_year_noon, ScriptedModel};
use skyscout::error::AgentError;
use skyscout::extract::{extract_query, parse_fixed_reply, parse_flexible_reply, ExtractionMode};
use skyscout::intent::{classify, IntentKind};
use skyscout::query::{DateSpec, SearchRequest, SortKey, TravelClass};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn extracts_relative_date_and_passengers() {
    let model = ScriptedModel::new(&[r#"<think>tomorrow is 2025-01-02</think>
```json
{"origin_iata": "DEL", "destination_iata": "BLR", "departure_date": "2025-01-02", "adults": 2}
```"#]);

    let request = extract_query(
        &model,
        "Find flights from Delhi to Bangalore tomorrow for two adults",
        new_year_noon(),
        ExtractionMode::Standard,
    )
    .await
    .unwrap();

    let SearchRequest::Fixed(q) = request else {
        panic!("expected a fixed-date request");
    };
    assert_eq!(q.origin_iata, "DEL");
    assert_eq!(q.destination_iata, "BLR");
    assert_eq!(q.departure_date, date(2025, 1, 2));
    assert_eq!(q.adults, 2);
    assert_eq!(q.children, 0);
    assert_eq!(q.currency, "INR");
    assert_eq!(q.travel_class, TravelClass::Economy);
    assert_eq!(q.max_results, 10);
    assert_eq!(q.sort_by, SortKey::Price);

    let prompt = model.prompt(0);
    assert!(prompt.contains("2025-01-01 12:00:00"));
    assert!(prompt.contains("Prompt: \"Find flights from Delhi to Bangalore tomorrow for two adults\""));
}

#[tokio::test]
async fn flexible_mode_yields_flexible_request() {
    let model = ScriptedModel::new(&[
        r#"{"origin": "MAD", "departure_date": "2025-02-01,2025-02-07", "nonStop": true, "maxPrice": 200}"#,
    ]);

    let request = extract_query(&model, "anywhere cheap from Madrid first week of Feb", new_year_noon(), ExtractionMode::Flexible)
        .await
        .unwrap();

    let SearchRequest::Flexible(q) = request else {
        panic!("expected a flexible request");
    };
    assert!(q.is_inspiration());
    assert!(q.non_stop);
    assert_eq!(q.max_price, Some(200.0));
    assert_eq!(
        q.departure_date,
        Some(DateSpec::Range {
            start: date(2025, 2, 1),
            end: date(2025, 2, 7)
        })
    );
}

#[tokio::test]
async fn model_failure_propagates_from_extraction() {
    let model = ScriptedModel::new(&[]);
    let err = extract_query(&model, "DEL to BLR", new_year_noon(), ExtractionMode::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::LanguageModel { status: 503, .. }));
}

#[test]
fn prose_reply_is_a_format_error_with_raw_output() {
    let err = parse_fixed_reply("I'd be happy to help you find flights!").unwrap_err();
    match err {
        AgentError::ExtractionFormat { raw, .. } => assert!(raw.contains("happy to help")),
        other => panic!("expected format error, got {other:?}"),
    }
}

#[test]
fn missing_required_field_is_a_schema_error() {
    let err = parse_fixed_reply(r#"{"origin_iata": "DEL", "departure_date": "2025-01-02"}"#).unwrap_err();
    assert_eq!(err.kind(), "schema_validation");
}

#[test]
fn invalid_value_is_not_repaired() {
    let err = parse_fixed_reply(
        r#"{"origin_iata": "DEL", "destination_iata": "BLR", "departure_date": "2025-01-02", "adults": -1}"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), "schema_validation");

    let err = parse_fixed_reply(
        r#"{"origin_iata": "DEL", "destination_iata": "BLR", "departure_date": "next friday"}"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), "schema_validation");
}

#[test]
fn null_members_take_defaults() {
    let q = parse_fixed_reply(
        r#"{"origin_iata": "DEL", "destination_iata": "BLR", "departure_date": "2025-01-02",
            "return_date": null, "travel_class": null, "max_stops": null}"#,
    )
    .unwrap();
    assert_eq!(q.return_date, None);
    assert_eq!(q.travel_class, TravelClass::Economy);
    assert_eq!(q.max_stops, None);
}

#[test]
fn flexible_reply_with_return_is_round_trip() {
    let q = parse_flexible_reply(
        r#"{"origin": "MAD", "destination": "MUC", "departure_date": "2025-02-01", "return_date": "2025-02-08", "one_way": true}"#,
    )
    .unwrap();
    assert!(!q.one_way);
}

#[tokio::test]
async fn classifier_reads_routing_flags() {
    let model = ScriptedModel::new(&[
        r#"{"intent": "advanced", "date_range_requested": true, "multicity_trip": false, "sort_preference": "price",
            "date_range": {"start_date": "2025-01-10", "end_date": "2025-01-15", "is_range": true}}"#,
    ]);

    let intent = classify(&model, "cheapest dates DEL to BLR 10th to 15th", new_year_noon()).await;

    assert_eq!(intent.intent, IntentKind::Advanced);
    assert!(intent.wants_flexible_dates());
    assert_eq!(intent.sort_preference, Some(SortKey::Price));
    assert_eq!(intent.date_range.and_then(|r| r.end_date), Some(date(2025, 1, 15)));
    assert!(model.prompt(0).contains("2025-01-01 12:00:00"));
}

#[tokio::test]
async fn classifier_recognizes_non_travel() {
    let model = ScriptedModel::new(&[r#"{"intent": "other"}"#]);
    let intent = classify(&model, "tell me a joke", new_year_noon()).await;
    assert!(!intent.is_travel());
}

#[tokio::test]
async fn classifier_never_fails() {
    let model = ScriptedModel::new(&[]);
    let intent = classify(&model, "DEL to BLR", new_year_noon()).await;
    assert_eq!(intent.intent, IntentKind::Standard);
    assert!(!intent.date_range_requested);

    let model = ScriptedModel::new(&[r#"{"intent": "book_hotel"}"#]);
    let intent = classify(&model, "a hotel in Goa", new_year_noon()).await;
    assert_eq!(intent.intent, IntentKind::Standard);
}

#[tokio::test]
async fn classifier_treats_null_flags_as_omitted() {
    let model = ScriptedModel::new(&[
        r#"{"intent": "other", "date_range_requested": null, "multicity_trip": null,
            "date_range": {"start_date": null, "end_date": null, "is_range": null}, "sort_preference": null}"#,
    ]);
    let intent = classify(&model, "what's the weather in Paris?", new_year_noon()).await;

    assert_eq!(intent.intent, IntentKind::Other);
    assert!(!intent.date_range_requested);
    assert!(!intent.multicity_trip);
    assert_eq!(intent.sort_preference, None);
}

#[tokio::test]
async fn classifier_ignores_placeholder_sort_preference() {
    let model = ScriptedModel::new(&[r#"{"intent": "other", "sort_preference": "none"}"#]);
    let intent = classify(&model, "tell me a joke", new_year_noon()).await;
    assert_eq!(intent.intent, IntentKind::Other);
    assert_eq!(intent.sort_preference, None);

    let model = ScriptedModel::new(&[r#"{"intent": "advanced", "sort_preference": ""}"#]);
    let intent = classify(&model, "DEL to BLR", new_year_noon()).await;
    assert_eq!(intent.intent, IntentKind::Advanced);
    assert_eq!(intent.sort_preference, None);
}
