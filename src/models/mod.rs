use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::services::normalizer::coerce_float;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,  // trimmed + lowercased
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub password_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub calories: i32,
    pub protein: f64,
    pub eaten_at: DateTime<Utc>,
}

/// Client-facing shape of a food entry. `timestamp` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntryView {
    pub id: String,
    pub name: String,
    pub calories: i32,
    pub protein: f64,
    pub timestamp: i64,
}

impl From<&FoodEntry> for FoodEntryView {
    fn from(entry: &FoodEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            name: entry.name.clone(),
            calories: entry.calories,
            protein: entry.protein,
            timestamp: entry.eaten_at.timestamp_millis(),
        }
    }
}

/// Typed reading of one breakdown entry. See [`NutritionEstimate::typed_items`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionBreakdownItem {
    pub item: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(deserialize_with = "lenient_number")]
    pub calories: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub protein: f64,
    /// Anything else the model emitted, kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEstimate {
    pub calories: i64,
    pub protein: f64,
    /// The model's `items`, exactly as it sent them.
    pub breakdown: Vec<serde_json::Value>,
}

impl NutritionEstimate {
    /// Breakdown entries that read as [`NutritionBreakdownItem`]; the rest are skipped.
    pub fn typed_items(&self) -> Vec<NutritionBreakdownItem> {
        self.breakdown
            .iter()
            .filter_map(|item| NutritionBreakdownItem::deserialize(item).ok())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub calories: i64,
    pub protein: f64,
    pub over_goal: i64,
    pub is_over_goal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub calories: i64,
    pub protein: f64,
    pub goal: i64,
    pub percentage: f64,
    pub entries: Vec<FoodEntryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_calories: i64,
    pub total_protein: f64,
    pub weekly_goal: i64,
    pub avg_daily_calories: f64,
    pub days: Vec<DaySummary>,
    pub days_over_goal: usize,
    pub days_under_goal: usize,
    pub highest_day: DaySummary,
}

/// Accepts `12`, `12.5` or `"12.5 g"` the way the model tends to write numbers.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    coerce_float(&value)
        .filter(|v| v.is_finite())
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {}", value)))
}
