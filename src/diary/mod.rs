pub mod dates;
pub mod models;
pub mod normalize;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::{ExportError, Result};
use crate::http::Sleeper;

pub use dates::{date_to_days, days_to_date};
pub use models::{DayAggregate, DiaryRange, DiaryResult, FoodEntry, MonthSummary};

pub const MONTH_METHOD: &str = "food_entries.get_month.v2";
pub const DAY_METHOD: &str = "food_entries.get.v2";

pub const DEFAULT_COURTESY_DELAY: Duration = Duration::from_secs(1);

/// Walks a date range month-summary by month-summary, then fetches every
/// day that had data. Calls are strictly sequential with a courtesy delay
/// between them.
pub struct DiaryExporter<'a> {
    api: &'a mut dyn ApiClient,
    sleeper: Arc<dyn Sleeper>,
    courtesy_delay: Duration,
    calls: usize,
    reported: BTreeSet<String>,
}

impl<'a> DiaryExporter<'a> {
    pub fn new(api: &'a mut dyn ApiClient, sleeper: Arc<dyn Sleeper>, courtesy_delay: Duration) -> Self {
        Self {
            api,
            sleeper,
            courtesy_delay,
            calls: 0,
            reported: BTreeSet::new(),
        }
    }

    pub fn export(&mut self, range: DiaryRange) -> Result<DiaryResult> {
        let mut day_aggregates = Vec::new();
        let mut cursor = range.from;

        loop {
            let month = self.fetch_month(cursor)?;
            if month.to_date < cursor {
                return Err(ExportError::Traversal(format!(
                    "month summary for {} ended at {}, traversal would not advance",
                    cursor, month.to_date
                )));
            }
            info!(
                "Month summary {}..{}: {} days",
                month.from_date,
                month.to_date,
                month.days.len()
            );
            day_aggregates.extend(month.days);

            cursor = next_day(month.to_date)?;
            if cursor > range.to {
                break;
            }
        }

        let dates: Vec<NaiveDate> = day_aggregates.iter().map(|d: &DayAggregate| d.date).collect();
        let mut entries = Vec::new();
        for date in &dates {
            let day_entries = self.fetch_day(*date)?;
            info!("Diary {}: {} entries", date, day_entries.len());
            entries.extend(day_entries);
        }

        Ok(DiaryResult {
            actual_from_date: dates.first().copied(),
            actual_to_date: dates.last().copied(),
            day_aggregates,
            entries,
        })
    }

    fn fetch_month(&mut self, cursor: NaiveDate) -> Result<MonthSummary> {
        let body = self.call(MONTH_METHOD, cursor)?;
        let parsed = normalize::month_summary(body)?;
        self.report_unrecognized(parsed.unrecognized);
        Ok(parsed.value)
    }

    fn fetch_day(&mut self, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        let body = self.call(DAY_METHOD, date)?;
        let parsed = normalize::food_entries(body)?;
        self.report_unrecognized(parsed.unrecognized);
        Ok(parsed.value)
    }

    fn call(&mut self, method: &str, date: NaiveDate) -> Result<serde_json::Value> {
        if self.calls > 0 {
            self.sleeper.sleep(self.courtesy_delay);
        }
        self.calls += 1;
        self.api
            .call(method, &[("date", date_to_days(date).to_string())])
    }

    fn report_unrecognized(&mut self, fields: Vec<String>) {
        for field in fields {
            if self.reported.insert(field.clone()) {
                warn!("Unrecognized field in API response: {}", field);
            }
        }
    }
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| ExportError::Traversal(format!("no day after {}", date)))
}
