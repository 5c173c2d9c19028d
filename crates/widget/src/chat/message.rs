use chrono::NaiveDateTime;

use crate::chat::interrupt::InterruptRequest;

/// Stable widget-local identifier for one rendered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl EntryId {
    /// Creates a typed entry identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier for one send cycle.
///
/// This must change on every send so a late reply can never land on a newer turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl TurnId {
    /// Creates a typed turn identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Text,
    Image,
}

/// Presentation status for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Settled,
    /// Transient "agent is typing" placeholder.
    Typing,
    /// Inline variation form awaiting the user's choice.
    Interrupt(InterruptRequest),
    /// Widget-authored notice such as an error or cancellation.
    Notice,
}

/// Core immutable entry model.
///
/// Updates replace an entry wholesale under the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub id: EntryId,
    pub role: Role,
    pub kind: EntryKind,
    pub content: String,
    pub caption: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub status: EntryStatus,
}

impl ChatEntry {
    pub fn new(
        id: EntryId,
        role: Role,
        kind: EntryKind,
        content: impl Into<String>,
        status: EntryStatus,
    ) -> Self {
        Self {
            id,
            role,
            kind,
            content: content.into(),
            caption: None,
            timestamp: None,
            status,
        }
    }

    pub fn user_text(id: EntryId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, EntryKind::Text, content, EntryStatus::Settled)
    }

    /// Image entry, optionally captioned with the text sent alongside it.
    pub fn user_image(id: EntryId, source: impl Into<String>, caption: Option<String>) -> Self {
        let mut entry = Self::new(id, Role::User, EntryKind::Image, source, EntryStatus::Settled);
        entry.caption = caption.filter(|caption| !caption.trim().is_empty());
        entry
    }

    pub fn agent_text(id: EntryId, content: impl Into<String>) -> Self {
        Self::new(id, Role::Agent, EntryKind::Text, content, EntryStatus::Settled)
    }

    /// Creates the agent placeholder shown while a reply is pending.
    pub fn typing(id: EntryId) -> Self {
        Self::new(id, Role::Agent, EntryKind::Text, String::new(), EntryStatus::Typing)
    }

    pub fn interrupt(id: EntryId, request: InterruptRequest) -> Self {
        let prompt = request.prompt_message.clone();
        Self::new(
            id,
            Role::Agent,
            EntryKind::Text,
            prompt,
            EntryStatus::Interrupt(request),
        )
    }

    pub fn notice(id: EntryId, content: impl Into<String>) -> Self {
        Self::new(id, Role::Agent, EntryKind::Text, content, EntryStatus::Notice)
    }

    pub fn with_timestamp(mut self, timestamp: Option<NaiveDateTime>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.status, EntryStatus::Typing)
    }
}

/// Message pipeline state boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Composing,
    Sending(TurnId),
    AwaitingReply(TurnId),
    Replied(TurnId),
    Interrupted(TurnId),
    Failed {
        turn: TurnId,
        message: String,
    },
}

/// State transition input for the message pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineTransition {
    Compose,
    ClearComposer,
    Dispatch(TurnId),
    Await(TurnId),
    Reply(TurnId),
    Interrupt(TurnId),
    Fail { turn: TurnId, message: String },
    ResetToIdle,
}

/// Rejection reason for illegal pipeline transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineRejection {
    TurnInFlight { active: TurnId, attempted: TurnId },
    NoActiveTurn,
    TurnMismatch { active: TurnId, attempted: TurnId },
}

pub type PipelineTransitionResult = Result<PipelineState, PipelineRejection>;

impl PipelineState {
    /// Returns the in-flight turn if and only if a request is outstanding.
    pub fn active_turn(&self) -> Option<TurnId> {
        match self {
            Self::Sending(turn) | Self::AwaitingReply(turn) => Some(*turn),
            Self::Idle
            | Self::Composing
            | Self::Replied(_)
            | Self::Interrupted(_)
            | Self::Failed { .. } => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.active_turn().is_some()
    }

    /// Returns true when a reply for `turn` may still be applied.
    pub fn accepts_reply(&self, turn: TurnId) -> bool {
        matches!(self, Self::AwaitingReply(active) if *active == turn)
    }

    /// Applies one transition deterministically.
    ///
    /// Only one turn may be outstanding at a time. Terminal transitions
    /// (`Reply`/`Interrupt`/`Fail`) must name the turn that is awaiting a reply.
    pub fn apply(&self, transition: PipelineTransition) -> PipelineTransitionResult {
        match transition {
            PipelineTransition::Compose => Ok(self.apply_compose()),
            PipelineTransition::ClearComposer => Ok(self.apply_clear_composer()),
            PipelineTransition::Dispatch(turn) => self.apply_dispatch(turn),
            PipelineTransition::Await(turn) => self.apply_await(turn),
            PipelineTransition::Reply(turn) => {
                self.apply_terminal(turn, |turn| Self::Replied(turn))
            }
            PipelineTransition::Interrupt(turn) => {
                self.apply_terminal(turn, |turn| Self::Interrupted(turn))
            }
            PipelineTransition::Fail { turn, message } => {
                self.apply_terminal(turn, move |turn| Self::Failed { turn, message })
            }
            PipelineTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn apply_compose(&self) -> Self {
        match self {
            // Typing while a reply is pending does not disturb the in-flight turn.
            Self::Sending(_) | Self::AwaitingReply(_) => self.clone(),
            Self::Idle
            | Self::Composing
            | Self::Replied(_)
            | Self::Interrupted(_)
            | Self::Failed { .. } => Self::Composing,
        }
    }

    fn apply_clear_composer(&self) -> Self {
        match self {
            Self::Composing => Self::Idle,
            _ => self.clone(),
        }
    }

    fn apply_dispatch(&self, turn: TurnId) -> PipelineTransitionResult {
        match self {
            Self::Sending(active) | Self::AwaitingReply(active) => {
                Err(PipelineRejection::TurnInFlight {
                    active: *active,
                    attempted: turn,
                })
            }
            Self::Idle
            | Self::Composing
            | Self::Replied(_)
            | Self::Interrupted(_)
            | Self::Failed { .. } => Ok(Self::Sending(turn)),
        }
    }

    fn apply_await(&self, turn: TurnId) -> PipelineTransitionResult {
        match self {
            Self::Sending(active) if *active == turn => Ok(Self::AwaitingReply(turn)),
            Self::Sending(active) | Self::AwaitingReply(active) => {
                Err(PipelineRejection::TurnMismatch {
                    active: *active,
                    attempted: turn,
                })
            }
            _ => Err(PipelineRejection::NoActiveTurn),
        }
    }

    fn apply_terminal(
        &self,
        turn: TurnId,
        next: impl FnOnce(TurnId) -> Self,
    ) -> PipelineTransitionResult {
        match self {
            Self::AwaitingReply(active) if *active == turn => Ok(next(turn)),
            Self::Sending(active) | Self::AwaitingReply(active) => {
                Err(PipelineRejection::TurnMismatch {
                    active: *active,
                    attempted: turn,
                })
            }
            _ => Err(PipelineRejection::NoActiveTurn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TURN: TurnId = TurnId::new(7);

    #[test]
    fn full_send_cycle_returns_to_idle() {
        let state = PipelineState::Idle
            .apply(PipelineTransition::Compose)
            .and_then(|state| state.apply(PipelineTransition::Dispatch(TURN)))
            .and_then(|state| state.apply(PipelineTransition::Await(TURN)))
            .and_then(|state| state.apply(PipelineTransition::Reply(TURN)))
            .expect("legal cycle");

        assert_eq!(state, PipelineState::Replied(TURN));
        assert_eq!(
            state.apply(PipelineTransition::ResetToIdle),
            Ok(PipelineState::Idle)
        );
    }

    #[test]
    fn second_dispatch_is_rejected_while_awaiting() {
        let state = PipelineState::AwaitingReply(TURN);
        let attempted = TurnId::new(8);

        assert_eq!(
            state.apply(PipelineTransition::Dispatch(attempted)),
            Err(PipelineRejection::TurnInFlight {
                active: TURN,
                attempted,
            })
        );
    }

    #[test]
    fn stale_reply_is_rejected() {
        let state = PipelineState::AwaitingReply(TurnId::new(9));

        assert_eq!(
            state.apply(PipelineTransition::Reply(TURN)),
            Err(PipelineRejection::TurnMismatch {
                active: TurnId::new(9),
                attempted: TURN,
            })
        );
        assert!(!state.accepts_reply(TURN));
    }

    #[test]
    fn reply_without_request_is_rejected() {
        assert_eq!(
            PipelineState::Idle.apply(PipelineTransition::Interrupt(TURN)),
            Err(PipelineRejection::NoActiveTurn)
        );
    }

    #[test]
    fn failure_keeps_the_message() {
        let state = PipelineState::AwaitingReply(TURN)
            .apply(PipelineTransition::Fail {
                turn: TURN,
                message: "status 502".to_string(),
            })
            .expect("failure transition");

        assert_eq!(
            state,
            PipelineState::Failed {
                turn: TURN,
                message: "status 502".to_string(),
            }
        );
        assert_eq!(state.active_turn(), None);
    }

    #[test]
    fn composing_while_in_flight_keeps_turn() {
        let state = PipelineState::Sending(TURN)
            .apply(PipelineTransition::Compose)
            .expect("compose");
        assert_eq!(state, PipelineState::Sending(TURN));

        let cleared = PipelineState::Composing
            .apply(PipelineTransition::ClearComposer)
            .expect("clear");
        assert_eq!(cleared, PipelineState::Idle);
    }
}
