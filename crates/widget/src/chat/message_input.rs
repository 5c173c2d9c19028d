use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use plantae_transport::ImageUpload;

/// Keys the composer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// One key-down event reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn enter() -> Self {
        Self {
            key: Key::Enter,
            modifiers: Modifiers::default(),
        }
    }

    pub fn shift_enter() -> Self {
        Self {
            key: Key::Enter,
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::default()
            },
        }
    }
}

/// What the host should do with a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Suppress the default action and send.
    Submit,
    /// Let the host apply its default (Shift+Enter inserts a newline).
    Default,
}

/// An image chosen for the next send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// `data:` URL used for the composer preview and the optimistic entry.
    pub preview_url: String,
}

impl PendingUpload {
    pub fn from_file(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let mime_type = mime_type.into();
        let preview_url = format!("data:{mime_type};base64,{}", STANDARD.encode(&bytes));
        Self {
            file_name: file_name.into(),
            mime_type,
            bytes,
            preview_url,
        }
    }

    pub fn to_image_upload(&self) -> ImageUpload {
        ImageUpload::new(
            self.file_name.clone(),
            self.mime_type.clone(),
            self.bytes.clone(),
        )
    }
}

/// Text and attachment ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    pub image: Option<PendingUpload>,
}

/// Composer state: current text plus at most one pending image.
#[derive(Debug, Default)]
pub struct MessageInput {
    text: String,
    pending_upload: Option<PendingUpload>,
}

impl MessageInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn classify_key(&self, press: KeyPress) -> KeyOutcome {
        match press.key {
            Key::Enter if !press.modifiers.any() => KeyOutcome::Submit,
            Key::Enter | Key::Other => KeyOutcome::Default,
        }
    }

    /// Stores `upload`, replacing any earlier attachment.
    pub fn attach(&mut self, upload: PendingUpload) -> Option<PendingUpload> {
        self.pending_upload.replace(upload)
    }

    pub fn remove_attachment(&mut self) -> Option<PendingUpload> {
        self.pending_upload.take()
    }

    pub fn pending_upload(&self) -> Option<&PendingUpload> {
        self.pending_upload.as_ref()
    }

    /// True when a send would carry anything.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.pending_upload.is_some()
    }

    /// Takes the trimmed text and attachment, leaving the composer empty.
    ///
    /// Returns `None` and leaves state untouched when there is nothing to send.
    pub fn take_submission(&mut self) -> Option<Submission> {
        if !self.has_content() {
            return None;
        }

        let text = self.text.trim().to_string();
        self.text.clear();
        Some(Submission {
            text,
            image: self.pending_upload.take(),
        })
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.pending_upload = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_enter_submits_and_modified_enter_does_not() {
        let input = MessageInput::new();

        assert_eq!(input.classify_key(KeyPress::enter()), KeyOutcome::Submit);
        assert_eq!(
            input.classify_key(KeyPress::shift_enter()),
            KeyOutcome::Default
        );
        assert_eq!(
            input.classify_key(KeyPress {
                key: Key::Enter,
                modifiers: Modifiers {
                    ctrl: true,
                    ..Modifiers::default()
                },
            }),
            KeyOutcome::Default
        );
    }

    #[test]
    fn whitespace_only_text_has_no_content() {
        let mut input = MessageInput::new();
        input.set_text("   \n ");

        assert!(!input.has_content());
        assert_eq!(input.take_submission(), None);
        assert_eq!(input.text(), "   \n ");
    }

    #[test]
    fn image_alone_is_sendable() {
        let mut input = MessageInput::new();
        input.attach(PendingUpload::from_file("leaf.png", "image/png", vec![1, 2, 3]));

        let submission = input.take_submission().expect("image submission");

        assert_eq!(submission.text, "");
        assert_eq!(
            submission.image.map(|image| image.preview_url),
            Some("data:image/png;base64,AQID".to_string())
        );
        assert!(input.pending_upload().is_none());
    }

    #[test]
    fn submission_trims_and_clears_text() {
        let mut input = MessageInput::new();
        input.set_text("  water the fern  ");

        let submission = input.take_submission().expect("text submission");

        assert_eq!(submission.text, "water the fern");
        assert_eq!(input.text(), "");
    }

    #[test]
    fn removing_attachment_returns_it() {
        let mut input = MessageInput::new();
        input.attach(PendingUpload::from_file("a.png", "image/png", vec![9]));

        assert!(input.remove_attachment().is_some());
        assert!(!input.has_content());
    }
}
