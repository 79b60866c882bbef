//! Processing state shared by every event context.

use crate::protocol::ProtocolError;

/// Where a context stands after the handlers that already ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ProcessingState {
    #[default]
    Processing,
    /// A handler produced the final result; no further handlers run.
    Handled,
    /// A handler asked the framework to ignore the request.
    Skipped,
    /// The request was rejected with a protocol error.
    Rejected(ProtocolError),
}

impl ProcessingState {
    /// True once no further handler may observe the context.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessingState::Processing)
    }
}

/// A typed context dispatched through the pipeline.
pub trait EventContext: Send {
    fn state(&self) -> &ProcessingState;

    fn state_mut(&mut self) -> &mut ProcessingState;

    fn is_handled(&self) -> bool {
        matches!(self.state(), ProcessingState::Handled)
    }

    fn is_skipped(&self) -> bool {
        matches!(self.state(), ProcessingState::Skipped)
    }

    fn is_rejected(&self) -> bool {
        matches!(self.state(), ProcessingState::Rejected(_))
    }

    fn rejection(&self) -> Option<&ProtocolError> {
        match self.state() {
            ProcessingState::Rejected(error) => Some(error),
            _ => None,
        }
    }

    fn handle_request(&mut self) {
        *self.state_mut() = ProcessingState::Handled;
    }

    fn skip_request(&mut self) {
        *self.state_mut() = ProcessingState::Skipped;
    }

    fn reject(&mut self, error: ProtocolError) {
        *self.state_mut() = ProcessingState::Rejected(error);
    }
}
