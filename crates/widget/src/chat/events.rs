use crate::chat::interrupt::InterruptRequest;
use crate::chat::message::{PipelineRejection, PipelineTransition, TurnId};

/// How the text of a turn was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnOrigin {
    #[default]
    Typed,
    /// Transcribed from a voice recording; the reply is spoken back.
    Voice,
}

/// Agent reply mapped into chat domain language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    Response(String),
    Interrupt(InterruptRequest),
    Error(String),
}

/// Emitted once the agent request for a turn settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMapped {
    pub turn: TurnId,
    pub payload: ReplyPayload,
}

impl ReplyMapped {
    pub fn new(turn: TurnId, payload: ReplyPayload) -> Self {
        Self { turn, payload }
    }

    /// Returns the pipeline transition that ends the turn.
    pub fn transition(&self) -> PipelineTransition {
        match &self.payload {
            ReplyPayload::Response(_) => PipelineTransition::Reply(self.turn),
            ReplyPayload::Interrupt(_) => PipelineTransition::Interrupt(self.turn),
            ReplyPayload::Error(message) => PipelineTransition::Fail {
                turn: self.turn,
                message: message.clone(),
            },
        }
    }
}

/// Result of one send attempt as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send: blank text and no attachment.
    Skipped,
    /// Another turn is still awaiting its reply.
    Rejected(PipelineRejection),
    Replied,
    Interrupted,
    Failed,
}

/// Result of resolving a pending variation form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptOutcome {
    NoPendingInterrupt,
    /// The form stays open; the user was told what is missing.
    Invalid,
    Resumed,
    /// The choice was recorded but the agent could not be resumed.
    ResumeFailed,
    Cancelled,
}
