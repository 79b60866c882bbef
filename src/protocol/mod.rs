//! End-session protocol data model.
//!
//! # Data Flow
//! ```text
//! HttpRequestData (transport view)
//!     → EndSessionRequest (parameter bag, maybe restored from cache)
//!     → host application computes an outcome
//!     → EndSessionResponse (parameters + optional error)
//!     → ResponseDirective (exactly one per exchange)
//! ```
//!
//! Everything for one exchange travels inside a [`Transaction`].

pub mod directive;
pub mod error;
pub mod parameters;
pub mod transaction;

pub use directive::ResponseDirective;
pub use error::{ErrorCode, ProtocolError};
pub use parameters::{
    names, EndSessionRequest, EndSessionResponse, ParameterError, ParameterKind, ParameterValue,
    Parameters,
};
pub use transaction::{HttpRequestData, Transaction, TransactionProperties};
