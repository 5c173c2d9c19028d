//! Pure projection from transcript entries to chat-area markup.

use pulldown_cmark::{Options, Parser, html};

use crate::chat::message::{ChatEntry, EntryKind, EntryStatus, Role};

pub const TYPING_MARKUP: &str = "<em>Agent is typing...</em>";
pub const THUMBNAIL_MAX_PX: u32 = 120;

const USER_ROW_CLASS: &str = "d-flex justify-content-end my-2";
const AGENT_ROW_CLASS: &str = "d-flex justify-content-start my-2";
const USER_BUBBLE_CLASS: &str = "bg-primary text-white rounded-3 p-2 px-3";
const AGENT_BUBBLE_CLASS: &str = "bg-light rounded-3 p-2 px-3";
const BUBBLE_STYLE: &str = "max-width: 70%;";

/// Greeting shown when the transcript is empty.
pub fn default_greeting(first_name: &str) -> String {
    format!(
        "Hey {first_name}, this is your personal PLANTAE assistant. How can I assist you today?"
    )
}

/// Renders the full chat area for `entries`.
///
/// An empty transcript renders the default greeting as a single agent bubble.
pub fn render_thread(entries: &[ChatEntry], first_name: &str) -> String {
    if entries.is_empty() {
        let greeting = ammonia::clean_text(&default_greeting(first_name));
        return bubble(Role::Agent, None, &greeting);
    }

    entries.iter().map(render_entry).collect()
}

pub fn render_entry(entry: &ChatEntry) -> String {
    let inner = match (&entry.status, entry.kind) {
        (EntryStatus::Typing, _) => TYPING_MARKUP.to_string(),
        (EntryStatus::Interrupt(request), _) => return request.render_form(entry.id),
        (EntryStatus::Notice, _) => {
            format!("<em>{}</em>", ammonia::clean_text(&entry.content))
        }
        (EntryStatus::Settled, EntryKind::Image) => {
            render_image(&entry.content, entry.caption.as_deref())
        }
        (EntryStatus::Settled, EntryKind::Text) => match entry.role {
            Role::User => escape_multiline(&entry.content),
            Role::Agent => render_agent_markdown(&entry.content),
        },
    };

    bubble(entry.role, Some(entry), &inner)
}

/// Markdown to HTML, then sanitized.
///
/// Script elements, event-handler attributes and `javascript:` links are removed.
pub fn render_agent_markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(text, options);

    let mut unsafe_html = String::new();
    html::push_html(&mut unsafe_html, parser);

    ammonia::clean(&unsafe_html)
}


/// Returns true for sources the widget is willing to emit as `<img src>`.
pub fn is_allowed_image_source(source: &str) -> bool {
    let source = source.trim();
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || (source.starts_with('/') && !source.starts_with("//"))
        || lower.starts_with("data:image/")
}

/// Escapes each line on its own and joins them with `<br>`.
fn escape_multiline(text: &str) -> String {
    text.split('\n')
        .map(ammonia::clean_text)
        .collect::<Vec<_>>()
        .join("<br>")
}

fn render_image(source: &str, caption: Option<&str>) -> String {
    let mut inner = if is_allowed_image_source(source) {
        format!(
            "<img src=\"{}\" alt=\"Uploaded image\" class=\"img-fluid rounded\" style=\"max-width: {THUMBNAIL_MAX_PX}px; max-height: {THUMBNAIL_MAX_PX}px;\">",
            ammonia::clean_text(source.trim())
        )
    } else {
        tracing::debug!("dropping image entry with disallowed source scheme");
        "[image]".to_string()
    };

    if let Some(caption) = caption {
        inner.push_str(&format!(
            "<div class=\"mt-1\">{}</div>",
            escape_multiline(caption)
        ));
    }
    inner
}

fn bubble(role: Role, entry: Option<&ChatEntry>, inner: &str) -> String {
    let (row_class, bubble_class) = match role {
        Role::User => (USER_ROW_CLASS, USER_BUBBLE_CLASS),
        Role::Agent => (AGENT_ROW_CLASS, AGENT_BUBBLE_CLASS),
    };
    let id_attribute = entry
        .map(|entry| format!(" data-entry-id=\"{}\"", entry.id.0))
        .unwrap_or_default();

    format!(
        "<div class=\"{row_class}\"{id_attribute}><div class=\"{bubble_class}\" style=\"{BUBBLE_STYLE}\">{inner}</div></div>"
    )
}
