//! OpenID Connect RP-Initiated Logout request processing.
//!
//! # Architecture Overview
//!
//! ```text
//!     End-session request
//!     ─────────────────────▶ http::adapter (axum → HttpRequestData)
//!                                 │
//!                                 ▼
//!                        ┌───────────────────┐      ┌──────────────┐
//!                        │ extraction stage  │─────▶│    cache     │
//!                        │ extract / restore │◀─────│ (get / set)  │
//!                        │ / cache           │      └──────────────┘
//!                        └─────────┬─────────┘      ┌──────────────┐
//!                                  │     ◀─────────▶│    token     │
//!                                  ▼                │ sign/encrypt │
//!                        host application decides   └──────────────┘
//!                                  │
//!                                  ▼
//!                        ┌───────────────────┐
//!                        │  response stage   │──── cleanup (delete)
//!                        └─────────┬─────────┘
//!                                  ▼
//!                          ResponseDirective
//! ```
//!
//! Both stages run on the same [`pipeline::Pipeline`]: an immutable,
//! ordered list of filtered handlers per context type, built once at
//! startup.

pub mod cache;
pub mod config;
pub mod endsession;
pub mod error;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod protocol;
pub mod service;
pub mod token;

pub use config::schema::ServiceConfig;
pub use error::{EndSessionError, EndSessionResult};
pub use protocol::{EndSessionRequest, EndSessionResponse, ResponseDirective, Transaction};
pub use service::{EndSessionOutcome, EndSessionService, ExtractionOutcome};
