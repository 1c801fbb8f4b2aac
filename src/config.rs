use anyhow::{Context, Result};
use chrono_tz::Tz;
use rand::RngCore;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DAILY_CALORIE_GOAL: i64 = 1650;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_timeout: Duration,
    pub session_secret: Vec<u8>,
    pub cookie_secure: bool,
    pub timezone: Tz,
    pub daily_calorie_goal: i64,
    pub allow_password_reset: bool,
    pub static_dir: Option<String>,
}

impl Config {
    /// Reads the process environment. Call after `dotenv()`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let openai_api_key = var("OPENAI_API_KEY").or_else(|| var("OPENAI_KEY"));
        if openai_api_key.is_none() {
            log::warn!("⚠️ OPENAI_API_KEY not set, meal estimation is disabled");
        }

        let session_secret = match var("SESSION_SECRET") {
            Some(secret) => secret.into_bytes(),
            None => {
                log::warn!("⚠️ SESSION_SECRET not set, using a random key (sessions end on restart)");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        let production = var("APP_ENV").map_or(false, |v| v.eq_ignore_ascii_case("production"));

        Ok(Self {
            database_url,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            openai_api_key,
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_timeout: Duration::from_secs(parse_or(&var, "OPENAI_TIMEOUT_SECS", 30)?),
            session_secret,
            cookie_secure: parse_or(&var, "COOKIE_SECURE", production)?,
            timezone: parse_or(&var, "APP_TIMEZONE", chrono_tz::UTC)?,
            daily_calorie_goal: parse_or(&var, "DAILY_CALORIE_GOAL", DEFAULT_DAILY_CALORIE_GOAL)?,
            allow_password_reset: parse_or(&var, "ALLOW_PASSWORD_RESET", false)?,
            static_dir: var("STATIC_DIR"),
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
