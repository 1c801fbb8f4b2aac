pub mod ai_service;
pub mod auth; // Password hashing and signed session cookies
pub mod database;
pub mod normalizer; // Turns raw model replies into nutrition estimates
pub mod openai; // OpenAI chat completions client
pub mod summary;

pub use ai_service::CompletionService;
pub use database::Database;
pub use openai::OpenAiService;
