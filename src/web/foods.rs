use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;

use super::server::AppState;
use super::{require_user, AddFoodRequest, EstimateRequest, MessageResponse, SummaryQuery};
use crate::error::ApiError;
use crate::handlers::food_handler::NewFood;
use crate::models::{DailySummary, FoodEntryView, NutritionEstimate, WeeklySummary};

/// Create router for food entries, estimates and summaries
pub fn create_food_router(state: AppState) -> Router {
    Router::new()
        .route("/api/foods", get(list_foods).post(add_food))
        .route("/api/foods/:id", delete(delete_food))
        .route("/api/calculate-calories", post(calculate_calories))
        .route("/api/summary/daily", get(daily_summary))
        .route("/api/summary/weekly", get(weekly_summary))
        .with_state(state)
}

async fn list_foods(State(state): State<AppState>, jar: CookieJar) -> Result<Json<Vec<FoodEntryView>>, ApiError> {
    let user = require_user(&state.accounts, &jar).await?;
    let foods = state.foods.list_foods(&user).await?;

    Ok(Json(foods))
}

async fn add_food(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<AddFoodRequest>,
) -> Result<(StatusCode, Json<FoodEntryView>), ApiError> {
    let user = require_user(&state.accounts, &jar).await?;
    let new_food = NewFood {
        name: body.name,
        calories: body.calories,
        protein: body.protein,
        timestamp: body.timestamp,
    };
    let created = state.foods.add_food(&user, new_food).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_food(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = require_user(&state.accounts, &jar).await?;
    state.foods.delete_food(&user, &id).await?;

    Ok(Json(MessageResponse {
        message: "Food entry deleted successfully",
    }))
}

async fn calculate_calories(
    State(state): State<AppState>,
    Json(body): Json<EstimateRequest>,
) -> Result<Json<NutritionEstimate>, ApiError> {
    let estimate = state.foods.estimate_meal(body.meal_description.as_ref()).await?;
    Ok(Json(estimate))
}

async fn daily_summary(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DailySummary>, ApiError> {
    let user = require_user(&state.accounts, &jar).await?;
    Ok(Json(state.foods.daily_summary(&user, query.date).await?))
}

async fn weekly_summary(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<WeeklySummary>, ApiError> {
    let user = require_user(&state.accounts, &jar).await?;
    Ok(Json(state.foods.weekly_summary(&user, query.date).await?))
}
