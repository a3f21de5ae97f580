pub mod auth;
pub mod categories;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod products;
pub mod routes;
pub mod transactions;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;
