use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::model::FlatSummary;
use crate::process::parse_duration;

/// Renders an "amount currency" price with a symbol where one is common.
pub fn format_price(price: &str) -> String {
    let Some((amount, currency)) = price.split_once(' ') else {
        return price.to_string();
    };
    let amount = amount.strip_suffix(".00").unwrap_or(amount);
    match currency {
        "USD" => format!("${amount}"),
        "EUR" => format!("€{amount}"),
        "GBP" => format!("£{amount}"),
        "JPY" | "CNY" => format!("¥{amount}"),
        "INR" => format!("₹{amount}"),
        "THB" => format!("฿{amount}"),
        _ => format!("{amount} {currency}"),
    }
}

/// `PT6H10M` as `6h 10m`; anything unparseable is shown as given.
pub fn format_duration(iso: &str) -> String {
    match parse_duration(iso) {
        Some(total) => format!("{}h {:02}m", total / 60, total % 60),
        None => iso.to_string(),
    }
}

fn format_stops(stops: &str) -> String {
    match stops {
        "0" => "Nonstop".to_string(),
        other => other.to_string(),
    }
}

pub fn render(summaries: &[FlatSummary]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Flight", "Route", "Depart", "Arrive", "Duration", "Stops", "Price",
        ]);

    for s in summaries {
        table.add_row(vec![
            s.flight_number.clone(),
            format!("{} → {}", s.origin, s.destination),
            s.departure_time.replace('T', " "),
            s.arrival_time.replace('T', " "),
            format_duration(&s.duration),
            format_stops(&s.stops),
            format_price(&s.price),
        ]);
    }

    table.to_string()
}

/// One line per offer, for scripts and agents.
pub fn compact_line(s: &FlatSummary) -> String {
    format!(
        "{} | {}>{} | {} | {} | {} | {}",
        format_price(&s.price),
        s.origin,
        s.destination,
        format_duration(&s.duration),
        format_stops(&s.stops),
        s.flight_number,
        s.departure_time.replace('T', " "),
    )
}
