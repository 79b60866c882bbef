//! End-session request handling subsystem.
//!
//! # Data Flow
//! ```text
//! ExtractEndSessionRequestContext
//!     → ExtractHttpParameters          (1000) query / form → request
//!     → RestoreCachedRequestParameters (2000) request_id → cached token → merge
//!     → CacheRequestParameters         (3000) request → token → cache → redirect
//!
//! ApplyEndSessionResponseContext
//!     → RemoveCachedRequest            (1000) delete cached token, once
//!     → ProcessQueryResponse           (2000) post-logout redirect + parameters
//!     → ProcessHostRedirectionResponse (3000) host-supplied redirect
//!     → ProcessPassthroughResponse     (4000) host writes the response
//!     → ProcessLocalErrorResponse      (5000) render the error
//!     → ProcessEmptyResponse           (6000) empty success
//! ```
//!
//! # Design Decisions
//! - Every built-in handler is registered as `HandlerKind::BuiltIn`; hosts
//!   add their own handlers between the built-in orders
//! - Request caching is transparent to the host: it only ever sees the
//!   restored request

pub mod caching;
pub mod events;
pub mod extraction;
pub mod filters;
pub mod response;

use std::sync::Arc;

use crate::cache::DistributedCache;
use crate::error::EndSessionResult;
use crate::pipeline::PipelineBuilder;
use crate::token::TokenService;

pub use caching::CacheRequestParameters;
pub use events::{ApplyEndSessionResponseContext, ExtractEndSessionRequestContext, TransactionContext};
pub use extraction::{ExtractHttpParameters, RestoreCachedRequestParameters};
pub use response::{
    ProcessEmptyResponse, ProcessHostRedirectionResponse, ProcessLocalErrorResponse,
    ProcessPassthroughResponse, ProcessQueryResponse, RemoveCachedRequest,
};

/// Orders of the built-in handlers.
pub mod order {
    pub const EXTRACT_HTTP_PARAMETERS: i32 = 1_000;
    pub const RESTORE_CACHED_REQUEST_PARAMETERS: i32 = 2_000;
    pub const CACHE_REQUEST_PARAMETERS: i32 = 3_000;

    pub const REMOVE_CACHED_REQUEST: i32 = 1_000;
    pub const PROCESS_QUERY_RESPONSE: i32 = 2_000;
    pub const PROCESS_HOST_REDIRECTION_RESPONSE: i32 = 3_000;
    pub const PROCESS_PASSTHROUGH_RESPONSE: i32 = 4_000;
    pub const PROCESS_LOCAL_ERROR_RESPONSE: i32 = 5_000;
    pub const PROCESS_EMPTY_RESPONSE: i32 = 6_000;
}

/// Register every built-in end-session handler.
///
/// The returned builder is not yet frozen, so custom handlers can still be
/// registered before calling [`PipelineBuilder::build`].
pub fn register_builtin_handlers(
    builder: PipelineBuilder,
    cache: Arc<dyn DistributedCache>,
    tokens: Arc<dyn TokenService>,
) -> EndSessionResult<PipelineBuilder> {
    let extraction = [
        ExtractHttpParameters::descriptor()?,
        RestoreCachedRequestParameters::descriptor(cache.clone(), tokens.clone())?,
        CacheRequestParameters::descriptor(cache.clone(), tokens)?,
    ];
    let response = [
        RemoveCachedRequest::descriptor(cache)?,
        ProcessQueryResponse::descriptor()?,
        ProcessHostRedirectionResponse::descriptor()?,
        ProcessPassthroughResponse::descriptor()?,
        ProcessLocalErrorResponse::descriptor()?,
        ProcessEmptyResponse::descriptor()?,
    ];

    Ok(builder.register_all(extraction).register_all(response))
}
