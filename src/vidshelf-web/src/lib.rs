//! vidshelf web - REST API for the video library

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, serve};
pub use state::{AppState, ServerOptions};
