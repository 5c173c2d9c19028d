//! Idle/active icon sources and the reflector that keeps controls in sync.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::chat::surface::ChatSurface;

/// How long a clicked image button stays in its active look.
pub const ICON_FLASH: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconSlot {
    Image,
    Send,
    Mic,
    Toggle,
}

impl IconSlot {
    pub const ALL: [IconSlot; 4] = [
        IconSlot::Image,
        IconSlot::Send,
        IconSlot::Mic,
        IconSlot::Toggle,
    ];

    fn index(self) -> usize {
        match self {
            Self::Image => 0,
            Self::Send => 1,
            Self::Mic => 2,
            Self::Toggle => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconState {
    #[default]
    Idle,
    /// Busy, hovered, or recording (for the mic).
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconPair {
    pub idle: String,
    pub active: String,
}

impl IconPair {
    fn new(idle: &str, active: &str) -> Self {
        Self {
            idle: idle.to_string(),
            active: active.to_string(),
        }
    }
}

/// Image sources for every control, as rendered by the hosting page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconSet {
    pub image: IconPair,
    pub send: IconPair,
    pub mic: IconPair,
    pub toggle: IconPair,
}

impl Default for IconSet {
    fn default() -> Self {
        Self {
            image: IconPair::new(
                "/static/images/chat/image_idle.png",
                "/static/images/chat/image_active.gif",
            ),
            send: IconPair::new(
                "/static/images/chat/send_idle.png",
                "/static/images/chat/send_active.gif",
            ),
            mic: IconPair::new(
                "/static/images/chat/mic_idle.png",
                "/static/images/chat/mic_recording.gif",
            ),
            toggle: IconPair::new(
                "/static/images/chat/toggle_idle.png",
                "/static/images/chat/toggle_active.gif",
            ),
        }
    }
}

impl IconSet {
    pub fn pair(&self, slot: IconSlot) -> &IconPair {
        match slot {
            IconSlot::Image => &self.image,
            IconSlot::Send => &self.send,
            IconSlot::Mic => &self.mic,
            IconSlot::Toggle => &self.toggle,
        }
    }

    pub fn source(&self, slot: IconSlot, state: IconState) -> &str {
        let pair = self.pair(slot);
        match state {
            IconState::Idle => &pair.idle,
            IconState::Active => &pair.active,
        }
    }
}

/// Mirrors busy/recording/hover state onto the host's icon elements.
#[derive(Debug)]
pub struct IconReflector {
    icons: IconSet,
    states: [IconState; 4],
    flash_until: [Option<Instant>; 4],
}

impl IconReflector {
    pub fn new(icons: IconSet) -> Self {
        Self {
            icons,
            states: [IconState::Idle; 4],
            flash_until: [None; 4],
        }
    }

    pub fn state(&self, slot: IconSlot) -> IconState {
        self.states[slot.index()]
    }

    /// Pushes every slot's current source to the surface.
    pub fn sync_all(&self, surface: &mut dyn ChatSurface) {
        for slot in IconSlot::ALL {
            surface.set_icon(slot, self.icons.source(slot, self.state(slot)));
        }
    }

    pub fn set(&mut self, surface: &mut dyn ChatSurface, slot: IconSlot, state: IconState) {
        self.flash_until[slot.index()] = None;
        if self.states[slot.index()] == state {
            return;
        }
        self.states[slot.index()] = state;
        surface.set_icon(slot, self.icons.source(slot, state));
    }

    /// Shows the active look until `now + ICON_FLASH`; see [`IconReflector::expire`].
    pub fn flash(&mut self, surface: &mut dyn ChatSurface, slot: IconSlot, now: Instant) {
        self.set(surface, slot, IconState::Active);
        self.flash_until[slot.index()] = Some(now + ICON_FLASH);
    }

    /// Reverts flashed slots whose deadline has passed.
    pub fn expire(&mut self, surface: &mut dyn ChatSurface, now: Instant) {
        for slot in IconSlot::ALL {
            let expired = self.flash_until[slot.index()].is_some_and(|deadline| now >= deadline);
            if expired {
                self.set(surface, slot, IconState::Idle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSurface;

    #[test]
    fn set_only_reports_changes() {
        let mut surface = RecordingSurface::default();
        let mut reflector = IconReflector::new(IconSet::default());

        reflector.set(&mut surface, IconSlot::Send, IconState::Idle);
        reflector.set(&mut surface, IconSlot::Send, IconState::Active);
        reflector.set(&mut surface, IconSlot::Send, IconState::Active);

        assert_eq!(
            surface.icons,
            vec![(
                IconSlot::Send,
                "/static/images/chat/send_active.gif".to_string()
            )]
        );
    }

    #[test]
    fn flash_reverts_after_two_seconds() {
        let mut surface = RecordingSurface::default();
        let mut reflector = IconReflector::new(IconSet::default());
        let start = Instant::now();

        reflector.flash(&mut surface, IconSlot::Image, start);
        reflector.expire(&mut surface, start + Duration::from_millis(1999));
        assert_eq!(reflector.state(IconSlot::Image), IconState::Active);

        reflector.expire(&mut surface, start + ICON_FLASH);
        assert_eq!(reflector.state(IconSlot::Image), IconState::Idle);
        assert_eq!(
            surface.icons.last(),
            Some(&(
                IconSlot::Image,
                "/static/images/chat/image_idle.png".to_string()
            ))
        );
    }
}
