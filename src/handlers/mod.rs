pub mod account;
pub mod food_handler;

pub use account::AccountHandler;
pub use food_handler::FoodHandler;
