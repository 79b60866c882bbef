//! Event contexts dispatched for an end-session exchange.

use url::Url;

use crate::pipeline::{EventContext, ProcessingState};
use crate::protocol::{EndSessionRequest, EndSessionResponse, Transaction};

/// Access to the transaction carried by a context.
pub trait TransactionContext {
    fn transaction(&self) -> &Transaction;
    fn transaction_mut(&mut self) -> &mut Transaction;
}

/// Dispatched to turn the inbound HTTP request into an [`EndSessionRequest`],
/// restoring it from the cache or caching it as needed.
#[derive(Debug)]
pub struct ExtractEndSessionRequestContext {
    pub transaction: Transaction,
    state: ProcessingState,
}

impl ExtractEndSessionRequestContext {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            state: ProcessingState::Processing,
        }
    }

    pub fn request(&self) -> Option<&EndSessionRequest> {
        self.transaction.request.as_ref()
    }

    pub fn request_mut(&mut self) -> Option<&mut EndSessionRequest> {
        self.transaction.request.as_mut()
    }

    pub fn into_parts(self) -> (Transaction, ProcessingState) {
        (self.transaction, self.state)
    }
}

impl EventContext for ExtractEndSessionRequestContext {
    fn state(&self) -> &ProcessingState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcessingState {
        &mut self.state
    }
}

impl TransactionContext for ExtractEndSessionRequestContext {
    fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    fn transaction_mut(&mut self) -> &mut Transaction {
        &mut self.transaction
    }
}

/// Dispatched to choose and apply the response directive.
#[derive(Debug)]
pub struct ApplyEndSessionResponseContext {
    pub transaction: Transaction,
    /// Validated post-logout redirect URI, if the outcome resolved one.
    pub post_logout_redirect_uri: Option<Url>,
    state: ProcessingState,
}

impl ApplyEndSessionResponseContext {
    pub fn new(transaction: Transaction, post_logout_redirect_uri: Option<Url>) -> Self {
        Self {
            transaction,
            post_logout_redirect_uri,
            state: ProcessingState::Processing,
        }
    }

    pub fn request(&self) -> Option<&EndSessionRequest> {
        self.transaction.request.as_ref()
    }

    /// The response; an empty one is created on first mutable access.
    pub fn response_mut(&mut self) -> &mut EndSessionResponse {
        self.transaction.response.get_or_insert_with(EndSessionResponse::new)
    }

    pub fn response(&self) -> Option<&EndSessionResponse> {
        self.transaction.response.as_ref()
    }

    /// True if the response carries a protocol error.
    pub fn has_error(&self) -> bool {
        self.response().and_then(EndSessionResponse::error).is_some()
    }

    pub fn into_parts(self) -> (Transaction, ProcessingState) {
        (self.transaction, self.state)
    }
}

impl EventContext for ApplyEndSessionResponseContext {
    fn state(&self) -> &ProcessingState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcessingState {
        &mut self.state
    }
}

impl TransactionContext for ApplyEndSessionResponseContext {
    fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    fn transaction_mut(&mut self) -> &mut Transaction {
        &mut self.transaction
    }
}
