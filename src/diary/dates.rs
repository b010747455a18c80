use chrono::{Days, NaiveDate};

/// Day zero of the API's day index, 1970-01-01.
pub fn epoch() -> NaiveDate {
    NaiveDate::default()
}

pub fn date_to_days(date: NaiveDate) -> i64 {
    (date - epoch()).num_days()
}

/// `None` when `days` falls outside the representable calendar.
pub fn days_to_date(days: i64) -> Option<NaiveDate> {
    let offset = Days::new(days.unsigned_abs());
    if days >= 0 {
        epoch().checked_add_days(offset)
    } else {
        epoch().checked_sub_days(offset)
    }
}
