pub mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod memory;
    pub mod pagination;
    pub mod postgres;
    pub mod schema;
    pub mod store;
}
pub mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod handlers {
    pub mod catalog;
    pub mod recipes;
    pub mod users;
}
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod routes;
pub mod state;
pub mod views;

pub use config::{Config, ConfigError};
pub use database::{error::StoreError, memory::MemoryStore, postgres::PgStore, store::Store};
pub use error::ApiError;
pub use routes::routes;
pub use state::AppState;
