use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use super::{
    require_user, session_token, AuthResponse, ChangePasswordRequest, Credentials, MessageResponse,
    ResetPasswordRequest, SessionResponse,
};
use crate::error::ApiError;
use crate::handlers::AccountHandler;
use crate::models::User;

/// Create auth router with all account routes
pub fn create_auth_router(accounts: Arc<AccountHandler>) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/auth/reset-password", post(reset_password))
        .with_state(accounts)
}

fn with_session(accounts: &AccountHandler, status: StatusCode, message: &'static str, user: &User) -> Response {
    let body = AuthResponse {
        message,
        user_id: user.id.to_string(),
        username: user.username.clone(),
    };
    let cookie = accounts.signer().session_cookie(user.id);

    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

fn logged_out(accounts: &AccountHandler) -> Response {
    let body = SessionResponse {
        authenticated: false,
        user_id: None,
        username: None,
    };
    let cookie = accounts.signer().clear_cookie();

    (StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

async fn register(
    State(accounts): State<Arc<AccountHandler>>,
    Json(body): Json<Credentials>,
) -> Result<Response, ApiError> {
    let user = accounts
        .register(body.username.as_deref(), body.password.as_deref())
        .await?;

    Ok(with_session(&accounts, StatusCode::CREATED, "User created successfully", &user))
}

async fn login(
    State(accounts): State<Arc<AccountHandler>>,
    Json(body): Json<Credentials>,
) -> Result<Response, ApiError> {
    let user = accounts
        .login(body.username.as_deref(), body.password.as_deref())
        .await?;

    Ok(with_session(&accounts, StatusCode::OK, "Login successful", &user))
}

async fn logout(State(accounts): State<Arc<AccountHandler>>) -> Response {
    let cookie = accounts.signer().clear_cookie();
    let body = MessageResponse {
        message: "Logged out successfully",
    };

    (StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

async fn session(State(accounts): State<Arc<AccountHandler>>, jar: CookieJar) -> Response {
    let token = match session_token(&jar) {
        Some(token) => token,
        None => {
            return Json(SessionResponse {
                authenticated: false,
                user_id: None,
                username: None,
            })
            .into_response()
        }
    };

    match accounts.authenticate(Some(token)).await {
        Ok(Some(user)) => Json(SessionResponse {
            authenticated: true,
            user_id: Some(user.id.to_string()),
            username: Some(user.username),
        })
        .into_response(),
        // Forged, stale or deleted-user cookie
        Ok(None) => logged_out(&accounts),
        Err(e) => {
            log::error!("❌ Session check failed: {}", e);
            Json(SessionResponse {
                authenticated: false,
                user_id: None,
                username: None,
            })
            .into_response()
        }
    }
}

async fn change_password(
    State(accounts): State<Arc<AccountHandler>>,
    jar: CookieJar,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = require_user(&accounts, &jar).await?;
    accounts
        .change_password(&user, body.new_password.as_deref())
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

async fn reset_password(
    State(accounts): State<Arc<AccountHandler>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    accounts
        .reset_password(body.username.as_deref(), body.new_password.as_deref())
        .await?;

    Ok(Json(MessageResponse {
        message: "If the username exists, the password has been reset.",
    }))
}
