use plantae_transport::AudioClip;

use crate::icons::IconSlot;

/// The host side of the widget: whatever actually draws the panel.
///
/// Calls are fire-and-forget; the controller never reads state back.
pub trait ChatSurface {
    /// Replaces the whole chat area with `html`.
    fn replace_content(&mut self, html: &str);
    fn scroll_to_bottom(&mut self);
    fn set_icon(&mut self, slot: IconSlot, source: &str);
    fn set_input_text(&mut self, text: &str);
    /// Shows or hides the pending image preview.
    fn set_image_preview(&mut self, preview_url: Option<&str>);
    fn set_open(&mut self, open: bool);
    fn alert(&mut self, message: &str);
    fn play_audio(&mut self, clip: AudioClip);
}
