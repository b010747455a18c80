//! Conversion of the API's string-typed JSON into typed diary records.
//!
//! Identifiers and day indexes are mandatory: empty or non-numeric values
//! fail the conversion. Nutrient fields default to zero when empty but still
//! fail on garbage. Keys outside the known schema are collected and handed
//! back to the caller instead of being dropped.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::dates::days_to_date;
use super::models::{DayAggregate, FoodEntry, MonthSummary};
use crate::error::{ExportError, Result};

type Extra = BTreeMap<String, Value>;

/// A converted value plus the dotted paths of any unrecognized keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub unrecognized: Vec<String>,
}

/// Lists come back as a bare object when they hold a single element.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct MonthResponse {
    month: Option<RawMonth>,
    #[serde(flatten)]
    extra: Extra,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMonth {
    day: Option<OneOrMany<RawDay>>,
    from_date_int: Option<String>,
    to_date_int: Option<String>,
    #[serde(flatten)]
    extra: Extra,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDay {
    date_int: Option<String>,
    calories: Option<String>,
    carbohydrate: Option<String>,
    fat: Option<String>,
    protein: Option<String>,
    #[serde(flatten)]
    extra: Extra,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EntriesResponse {
    food_entries: Option<RawEntries>,
    #[serde(flatten)]
    extra: Extra,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntries {
    food_entry: Option<OneOrMany<RawFoodEntry>>,
    #[serde(flatten)]
    extra: Extra,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFoodEntry {
    food_entry_id: Option<String>,
    food_id: Option<String>,
    serving_id: Option<String>,
    date_int: Option<String>,
    meal: Option<String>,
    food_entry_name: Option<String>,
    food_entry_description: Option<String>,
    number_of_units: Option<String>,
    calories: Option<String>,
    carbohydrate: Option<String>,
    protein: Option<String>,
    fat: Option<String>,
    saturated_fat: Option<String>,
    polyunsaturated_fat: Option<String>,
    monounsaturated_fat: Option<String>,
    trans_fat: Option<String>,
    cholesterol: Option<String>,
    sodium: Option<String>,
    potassium: Option<String>,
    fiber: Option<String>,
    sugar: Option<String>,
    added_sugars: Option<String>,
    vitamin_a: Option<String>,
    vitamin_c: Option<String>,
    vitamin_d: Option<String>,
    calcium: Option<String>,
    iron: Option<String>,
    #[serde(flatten)]
    extra: Extra,
}

// -- Field helpers ------------------------------------------------------------

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default().trim()
}

fn parse_err(field: &'static str, value: &str, reason: impl ToString) -> ExportError {
    ExportError::Parse {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn required_int(field: &'static str, value: &Option<String>) -> Result<i64> {
    let raw = text(value);
    if raw.is_empty() {
        return Err(parse_err(field, raw, "mandatory field is empty"));
    }
    raw.parse().map_err(|e| parse_err(field, raw, e))
}

fn optional_f64(field: &'static str, value: &Option<String>) -> Result<f64> {
    let raw = text(value);
    if raw.is_empty() {
        return Ok(0.0);
    }
    let value: f64 = raw.parse().map_err(|e| parse_err(field, raw, e))?;
    if !value.is_finite() {
        return Err(parse_err(field, raw, "not a finite number"));
    }
    Ok(value)
}

fn required_date(field: &'static str, value: &Option<String>) -> Result<NaiveDate> {
    let days = required_int(field, value)?;
    days_to_date(days).ok_or_else(|| parse_err(field, text(value), "day index out of range"))
}

fn collect_extra(prefix: &str, extra: &Extra, into: &mut Vec<String>) {
    for key in extra.keys() {
        if prefix.is_empty() {
            into.push(key.clone());
        } else {
            into.push(format!("{}.{}", prefix, key));
        }
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
    Ok(serde_json::from_value(body)?)
}

// -- Records ------------------------------------------------------------------

fn day_aggregate(raw: &RawDay) -> Result<DayAggregate> {
    Ok(DayAggregate {
        date: required_date("date_int", &raw.date_int)?,
        calories: optional_f64("calories", &raw.calories)?,
        carbohydrate: optional_f64("carbohydrate", &raw.carbohydrate)?,
        fat: optional_f64("fat", &raw.fat)?,
        protein: optional_f64("protein", &raw.protein)?,
    })
}

fn food_entry(raw: &RawFoodEntry) -> Result<FoodEntry> {
    Ok(FoodEntry {
        food_entry_id: required_int("food_entry_id", &raw.food_entry_id)?,
        food_id: required_int("food_id", &raw.food_id)?,
        serving_id: required_int("serving_id", &raw.serving_id)?,
        date: required_date("date_int", &raw.date_int)?,
        meal: text(&raw.meal).to_string(),
        food_entry_name: text(&raw.food_entry_name).to_string(),
        food_entry_description: text(&raw.food_entry_description).to_string(),
        number_of_units: optional_f64("number_of_units", &raw.number_of_units)?,
        calories: optional_f64("calories", &raw.calories)?,
        carbohydrate: optional_f64("carbohydrate", &raw.carbohydrate)?,
        protein: optional_f64("protein", &raw.protein)?,
        fat: optional_f64("fat", &raw.fat)?,
        saturated_fat: optional_f64("saturated_fat", &raw.saturated_fat)?,
        polyunsaturated_fat: optional_f64("polyunsaturated_fat", &raw.polyunsaturated_fat)?,
        monounsaturated_fat: optional_f64("monounsaturated_fat", &raw.monounsaturated_fat)?,
        trans_fat: optional_f64("trans_fat", &raw.trans_fat)?,
        cholesterol: optional_f64("cholesterol", &raw.cholesterol)?,
        sodium: optional_f64("sodium", &raw.sodium)?,
        potassium: optional_f64("potassium", &raw.potassium)?,
        fiber: optional_f64("fiber", &raw.fiber)?,
        sugar: optional_f64("sugar", &raw.sugar)?,
        added_sugars: optional_f64("added_sugars", &raw.added_sugars)?,
        vitamin_a: optional_f64("vitamin_a", &raw.vitamin_a)?,
        vitamin_c: optional_f64("vitamin_c", &raw.vitamin_c)?,
        vitamin_d: optional_f64("vitamin_d", &raw.vitamin_d)?,
        calcium: optional_f64("calcium", &raw.calcium)?,
        iron: optional_f64("iron", &raw.iron)?,
    })
}

// -- Responses ----------------------------------------------------------------

/// Parses a `food_entries.get_month` response.
pub fn month_summary(body: Value) -> Result<Normalized<MonthSummary>> {
    let response: MonthResponse = decode(body)?;
    let mut unrecognized = Vec::new();
    collect_extra("", &response.extra, &mut unrecognized);

    let month = response
        .month
        .ok_or_else(|| ExportError::Traversal("month summary response has no month object".into()))?;
    collect_extra("month", &month.extra, &mut unrecognized);

    let raw_days = month.day.map(OneOrMany::into_vec).unwrap_or_default();
    let mut days = Vec::with_capacity(raw_days.len());
    for raw in &raw_days {
        collect_extra("month.day", &raw.extra, &mut unrecognized);
        days.push(day_aggregate(raw)?);
    }

    Ok(Normalized {
        value: MonthSummary {
            from_date: required_date("from_date_int", &month.from_date_int)?,
            to_date: required_date("to_date_int", &month.to_date_int)?,
            days,
        },
        unrecognized,
    })
}

/// Parses a `food_entries.get` response. A `null` or missing list means the
/// day has no entries.
pub fn food_entries(body: Value) -> Result<Normalized<Vec<FoodEntry>>> {
    let response: EntriesResponse = decode(body)?;
    let mut unrecognized = Vec::new();
    collect_extra("", &response.extra, &mut unrecognized);

    let mut entries = Vec::new();
    if let Some(list) = response.food_entries {
        collect_extra("food_entries", &list.extra, &mut unrecognized);
        for raw in list.food_entry.map(OneOrMany::into_vec).unwrap_or_default() {
            collect_extra("food_entries.food_entry", &raw.extra, &mut unrecognized);
            entries.push(food_entry(&raw)?);
        }
    }

    Ok(Normalized {
        value: entries,
        unrecognized,
    })
}
