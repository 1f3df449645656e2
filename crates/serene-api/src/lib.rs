pub mod auth;
pub mod conversations;
pub mod error;
pub mod extract;
pub mod history;
pub mod messages;
pub mod middleware;
pub mod router;
pub mod time;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use router::build_router;
