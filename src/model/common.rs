use chrono::{Local, Months, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Calendar date of "now" in the server's local zone. All scheduling math
/// works on civil dates so DST transitions never shift a bar by a day.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn one_year_after(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(12)).unwrap_or(date)
}

pub fn one_year_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(Months::new(12)).unwrap_or(date)
}

/// Whole days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Uppercased first letters of up to the first two words.
pub fn derive_icon(name: &str) -> String {
    name.split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn initials_icon(name: &str, surname: &str) -> String {
    [name, surname]
        .iter()
        .filter_map(|part| part.trim().chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn random_color() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    format!("#{:02x}{:02x}{:02x}", bytes[0], bytes[1], bytes[2])
}

pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}
