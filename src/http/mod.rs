//! HTTP Surface (C7) module root — wires the maintenance/query router; the
//! WebSocket route lives on a separate listener (see [`crate::hub`]).

pub mod export;
pub mod handlers;
pub mod types;

pub use handlers::{create_router, AppState};
