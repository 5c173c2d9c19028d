/// Event contracts between the controller and the pipeline.
pub mod events;
/// Ordered transcript storage and history merging.
pub mod history;
pub mod interrupt;
/// Domain entities and deterministic pipeline state boundaries.
pub mod message;
pub mod message_input;
pub mod render;
pub mod surface;
pub mod view;

pub use events::{InterruptOutcome, ReplyMapped, ReplyPayload, SendOutcome, TurnOrigin};
pub use history::{HistoryStore, merge_history, parse_timestamp};
pub use interrupt::{InterruptRequest, SelectionError};
pub use message::{
    ChatEntry, EntryId, EntryKind, EntryStatus, PipelineRejection, PipelineState,
    PipelineTransition, PipelineTransitionResult, Role, TurnId,
};
pub use message_input::{
    Key, KeyOutcome, KeyPress, MessageInput, Modifiers, PendingUpload, Submission,
};
pub use render::{default_greeting, render_entry, render_thread};
pub use surface::ChatSurface;
pub use view::ChatWidget;
