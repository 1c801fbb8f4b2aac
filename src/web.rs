use axum_extra::extract::CookieJar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::handlers::AccountHandler;
use crate::models::User;
use crate::services::auth::SESSION_COOKIE;

pub mod auth;
pub mod foods;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub username: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddFoodRequest {
    pub name: Option<String>,
    pub calories: Option<serde_json::Value>,
    pub protein: Option<serde_json::Value>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub meal_description: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: &'static str,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE).map(|cookie| cookie.value())
}

/// The logged-in user, or 401.
pub async fn require_user(accounts: &AccountHandler, jar: &CookieJar) -> Result<User, ApiError> {
    accounts
        .authenticate(session_token(jar))
        .await?
        .ok_or(ApiError::Unauthorized("Unauthorized"))
}

pub mod server {
    use super::*;
    use axum::{routing::get, Router};
    use std::sync::Arc;
    use tower_http::services::ServeDir;

    use crate::handlers::FoodHandler;

    #[derive(Clone)]
    pub struct AppState {
        pub accounts: Arc<AccountHandler>,
        pub foods: Arc<FoodHandler>,
    }

    pub fn create_router(state: AppState, static_dir: Option<&str>) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_check))
            .merge(auth::create_auth_router(state.accounts.clone()))
            .merge(foods::create_food_router(state));

        if let Some(dir) = static_dir {
            log::info!("📁 Serving static files from {}", dir);
            router = router.fallback_service(ServeDir::new(dir));
        }

        router
    }

    async fn health_check() -> &'static str {
        "OK"
    }
}
