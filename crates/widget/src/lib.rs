//! Embeddable shopping-assistant chat widget.
//!
//! [`chat::ChatWidget`] owns the transcript, the composer and the voice
//! recorder, and talks to the agent through [`plantae_transport::AgentTransport`].
//! Hosts implement [`chat::ChatSurface`] to draw it and [`voice::AudioDevice`]
//! to lend it a microphone.

pub mod chat;
pub mod icons;
pub mod settings;
pub mod voice;

#[cfg(test)]
mod test_support;

pub use chat::{ChatSurface, ChatWidget};
pub use settings::{SettingsStore, WidgetSettings};
