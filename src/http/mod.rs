//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing and timeout layers)
//!     → adapter.rs (axum Request → HttpRequestData)
//!     → EndSessionService (extract → decide → apply_response)
//!     → server.rs (ResponseDirective → HTTP response)
//! ```

pub mod adapter;
pub mod server;

pub use adapter::{to_request_data, AdapterError};
pub use server::{AppState, EndSessionServer};
