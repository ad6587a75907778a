//! Quiz backend library: question bank uploads, participant registration,
//! and the live leaderboard, served over an axum HTTP API.

pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod leaderboard;
pub mod normalize;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;

pub use routes::build_router;
pub use state::AppState;
