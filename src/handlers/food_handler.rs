use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{DailySummary, FoodEntry, FoodEntryView, NutritionEstimate, User, WeeklySummary};
use crate::services::normalizer::{coerce_float, coerce_int, normalize_estimate};
use crate::services::{summary, CompletionService, Database};

/// Body of a new food entry. Numbers may arrive as JSON numbers or strings.
#[derive(Debug, Default)]
pub struct NewFood {
    pub name: Option<String>,
    pub calories: Option<Value>,
    pub protein: Option<Value>,
    pub timestamp: Option<i64>,
}

pub struct FoodHandler {
    db: Arc<Database>,
    completion: Option<Arc<dyn CompletionService>>,
    timezone: Tz,
    daily_goal: i64,
}

impl FoodHandler {
    pub fn new(
        db: Arc<Database>,
        completion: Option<Arc<dyn CompletionService>>,
        timezone: Tz,
        daily_goal: i64,
    ) -> Self {
        Self {
            db,
            completion,
            timezone,
            daily_goal,
        }
    }

    pub async fn list_foods(&self, user: &User) -> Result<Vec<FoodEntryView>, ApiError> {
        let foods = self.db.get_foods(user.id).await?;
        Ok(foods.iter().map(FoodEntryView::from).collect())
    }

    pub async fn add_food(&self, user: &User, new_food: NewFood) -> Result<FoodEntryView, ApiError> {
        let entry = validate_new_food(user.id, new_food, Utc::now())?;
        self.db.add_food(&entry).await?;

        log::info!("🍽️ {} logged '{}' ({} kcal, {} g protein)", user.username, entry.name, entry.calories, entry.protein);
        Ok(FoodEntryView::from(&entry))
    }

    pub async fn delete_food(&self, user: &User, id: &str) -> Result<(), ApiError> {
        if id.trim().is_empty() {
            return Err(ApiError::BadRequest("Food ID is required"));
        }
        let id = Uuid::parse_str(id.trim()).map_err(|_| ApiError::BadRequest("Invalid food ID format"))?;

        if !self.db.delete_food(id, user.id).await? {
            return Err(ApiError::NotFound("Food entry not found"));
        }

        log::info!("🗑️ {} deleted food entry {}", user.username, id);
        Ok(())
    }

    /// Asks the completion service about a meal and normalizes its reply.
    pub async fn estimate_meal(&self, meal_description: Option<&Value>) -> Result<NutritionEstimate, ApiError> {
        let description = meal_description
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .ok_or(ApiError::BadRequest("Meal description is required"))?;

        let completion = self
            .completion
            .as_ref()
            .ok_or(ApiError::NotConfigured("OpenAI API key not configured"))?;

        let reply = completion.complete_meal(description).await?;
        let estimate = normalize_estimate(reply.as_deref())?;

        log::info!(
            "🔥 Estimated '{}': {} kcal, {} g protein ({} items)",
            description,
            estimate.calories,
            estimate.protein,
            estimate.breakdown.len()
        );
        for item in estimate.typed_items() {
            log::debug!("   • {} ({}): {} kcal, {} g protein", item.item, item.quantity, item.calories, item.protein);
        }
        Ok(estimate)
    }

    fn today(&self) -> NaiveDate {
        summary::local_date(Utc::now(), self.timezone)
    }

    async fn foods_between(&self, user: &User, first: NaiveDate, last: NaiveDate) -> Result<Vec<FoodEntry>, ApiError> {
        let (from, to) = summary::query_window(first, last, self.timezone);
        Ok(self.db.get_foods_between(user.id, from, to).await?)
    }

    pub async fn daily_summary(&self, user: &User, date: Option<NaiveDate>) -> Result<DailySummary, ApiError> {
        let date = date.unwrap_or_else(|| self.today());
        let foods = self.foods_between(user, date, date).await?;

        Ok(summary::daily_summary(date, &foods, self.timezone, self.daily_goal))
    }

    pub async fn weekly_summary(&self, user: &User, date: Option<NaiveDate>) -> Result<WeeklySummary, ApiError> {
        let date = date.unwrap_or_else(|| self.today());
        let (week_start, week_end) = summary::week_bounds(date);
        let foods = self.foods_between(user, week_start, week_end).await?;

        Ok(summary::weekly_summary(date, &foods, self.timezone, self.daily_goal))
    }
}

fn validate_new_food(user_id: Uuid, new_food: NewFood, now: DateTime<Utc>) -> Result<FoodEntry, ApiError> {
    const REQUIRED: &str = "Name, calories, and protein are required";

    let name = new_food
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ApiError::BadRequest(REQUIRED))?
        .to_string();
    let calories = new_food
        .calories
        .filter(|c| !c.is_null())
        .ok_or(ApiError::BadRequest(REQUIRED))?;
    let protein = new_food
        .protein
        .filter(|p| !p.is_null())
        .ok_or(ApiError::BadRequest(REQUIRED))?;

    let calories = coerce_int(&calories)
        .filter(|c| *c > 0)
        .and_then(|c| i32::try_from(c).ok())
        .ok_or(ApiError::BadRequest("Calories must be a positive number"))?;
    let protein = coerce_float(&protein)
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or(ApiError::BadRequest("Protein must be a non-negative number"))?;

    let eaten_at = match new_food.timestamp {
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or(ApiError::BadRequest("Invalid timestamp"))?,
        None => now,
    };

    Ok(FoodEntry {
        id: Uuid::new_v4(),
        user_id,
        name,
        calories,
        protein,
        eaten_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_food(name: &str, calories: Value, protein: Value) -> NewFood {
        NewFood {
            name: Some(name.to_string()),
            calories: Some(calories),
            protein: Some(protein),
            timestamp: None,
        }
    }

    #[test]
    fn test_validate_new_food() {
        let now = Utc::now();
        let entry = validate_new_food(Uuid::nil(), new_food("  Masala dosa ", json!("350"), json!(7.5)), now).unwrap();

        assert_eq!(entry.name, "Masala dosa");
        assert_eq!(entry.calories, 350);
        assert_eq!(entry.protein, 7.5);
        assert_eq!(entry.eaten_at, now);
    }

    #[test]
    fn test_validate_new_food_missing_fields() {
        let err = validate_new_food(Uuid::nil(), NewFood::default(), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Name, calories, and protein are required");

        let mut food = new_food("Idli", json!(120), json!(4));
        food.protein = None;
        let err = validate_new_food(Uuid::nil(), food, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Name, calories, and protein are required");
    }

    #[test]
    fn test_validate_new_food_bad_numbers() {
        let err = validate_new_food(Uuid::nil(), new_food("Idli", json!(0), json!(4)), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Calories must be a positive number");

        let err = validate_new_food(Uuid::nil(), new_food("Idli", json!(120), json!(-1)), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Protein must be a non-negative number");

        // Zero protein is a valid entry (black coffee, fruit)
        let entry = validate_new_food(Uuid::nil(), new_food("Coffee", json!(5), json!(0)), Utc::now()).unwrap();
        assert_eq!(entry.protein, 0.0);
    }

    #[test]
    fn test_validate_new_food_timestamp() {
        let mut food = new_food("Upma", json!(250), json!(6));
        food.timestamp = Some(1_709_541_000_000);

        let entry = validate_new_food(Uuid::nil(), food, Utc::now()).unwrap();
        assert_eq!(entry.eaten_at.timestamp_millis(), 1_709_541_000_000);
    }

    #[tokio::test]
    async fn test_delete_food_rejects_bad_ids() {
        let db = Database::connect_lazy("postgres://localhost/calorie_tracker_test").unwrap();
        let foods = FoodHandler::new(Arc::new(db), None, Tz::UTC, 1650);
        let user = User {
            id: Uuid::nil(),
            username: "meera".to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
            password_updated_at: None,
        };

        let err = foods.delete_food(&user, "  ").await.unwrap_err();
        assert_eq!(err.to_string(), "Food ID is required");

        let err = foods.delete_food(&user, "not-a-uuid").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid food ID format");
    }
}
