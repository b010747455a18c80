use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{ExportError, Result};

/// Requested export window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiaryRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DiaryRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(ExportError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }
}

/// Macro totals for one day of a month summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAggregate {
    pub date: NaiveDate,
    pub calories: f64,
    pub carbohydrate: f64,
    pub fat: f64,
    pub protein: f64,
}

/// The API's month-summary window. It need not line up with a calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSummary {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub days: Vec<DayAggregate>,
}

/// One logged food item with its full nutrient breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodEntry {
    pub food_entry_id: i64,
    pub food_id: i64,
    pub serving_id: i64,
    pub date: NaiveDate,
    pub meal: String,
    pub food_entry_name: String,
    pub food_entry_description: String,
    pub number_of_units: f64,
    pub calories: f64,
    pub carbohydrate: f64,
    pub protein: f64,
    pub fat: f64,
    pub saturated_fat: f64,
    pub polyunsaturated_fat: f64,
    pub monounsaturated_fat: f64,
    pub trans_fat: f64,
    pub cholesterol: f64,
    pub sodium: f64,
    pub potassium: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub added_sugars: f64,
    pub vitamin_a: f64,
    pub vitamin_c: f64,
    pub vitamin_d: f64,
    pub calcium: f64,
    pub iron: f64,
}

/// Complete export. `actual_*_date` come from the days the API returned and
/// may differ from the requested range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiaryResult {
    pub actual_from_date: Option<NaiveDate>,
    pub actual_to_date: Option<NaiveDate>,
    pub day_aggregates: Vec<DayAggregate>,
    pub entries: Vec<FoodEntry>,
}
