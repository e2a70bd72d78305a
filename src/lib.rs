pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use config::Config;
pub use error::Error;
pub use state::AppState;
