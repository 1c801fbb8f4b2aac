mod config;
mod error;
mod handlers;
mod models;
mod services;
mod web; // HTTP API and static frontend

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::{AccountHandler, FoodHandler};
use services::auth::SessionSigner;
use services::{CompletionService, Database, OpenAiService};
use web::server::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    log::info!("🚀 Starting Calorie Tracker...");

    let config = Config::from_env()?;

    // Initialize PostgreSQL database
    let db = Arc::new(Database::new(&config.database_url).await?);
    log::info!("✅ PostgreSQL database initialized");

    let completion: Option<Arc<dyn CompletionService>> = match &config.openai_api_key {
        Some(api_key) => {
            let service = OpenAiService::new(
                api_key.clone(),
                config.openai_model.clone(),
                config.openai_base_url.clone(),
                config.openai_timeout,
            )?;
            log::info!("✅ OpenAI service initialized with model: {}", config.openai_model);
            Some(Arc::new(service))
        }
        None => None,
    };

    let signer = SessionSigner::new(config.session_secret.clone(), config.cookie_secure);
    let state = AppState {
        accounts: Arc::new(AccountHandler::new(db.clone(), signer, config.allow_password_reset)),
        foods: Arc::new(FoodHandler::new(
            db.clone(),
            completion,
            config.timezone,
            config.daily_calorie_goal,
        )),
    };
    log::info!(
        "✅ Handlers initialized (timezone {}, daily goal {} kcal)",
        config.timezone,
        config.daily_calorie_goal
    );

    let app = create_router(state, config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("🌐 Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            log::info!("🛑 Shutting down...");
        })
        .await?;

    Ok(())
}
