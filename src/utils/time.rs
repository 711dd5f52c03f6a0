use chrono::{Duration, NaiveDate, NaiveTime, Timelike};

const LABEL_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a history label in earnly.
pub fn date_to_label(date: NaiveDate) -> String {
    date.format(LABEL_FORMAT).to_string()
}

pub fn label_to_date(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(label, LABEL_FORMAT).ok()
}

/// Maps a stored history label to what a person expects to read. Labels that aren't dates (older
/// entries stored "Yesterday" verbatim) are shown as is.
pub fn display_label(label: &str, today: NaiveDate) -> String {
    match label_to_date(label) {
        Some(date) if date == today => "Today".to_string(),
        Some(date) if date + Duration::days(1) == today => "Yesterday".to_string(),
        Some(date) => date.format("%-d %b").to_string(),
        None => label.to_string(),
    }
}

pub fn minutes_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

/// Dates strictly between `start` and `end`, ascending.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(start.succ_opt(), |day| day.succ_opt()).take_while(move |day| *day < end)
}
