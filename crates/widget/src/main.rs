use std::path::Path;
use std::time::Instant;

use plantae_transport::{AudioClip, VariationSelection, create_transport};
use plantae_widget::chat::{ChatSurface, ChatWidget, PendingUpload};
use plantae_widget::icons::IconSlot;
use plantae_widget::settings::SettingsStore;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Line-oriented host that prints the chat area as plain text.
struct TerminalSurface {
    text_only: ammonia::Builder<'static>,
}

impl TerminalSurface {
    fn new() -> Self {
        let mut text_only = ammonia::Builder::empty();
        text_only.add_tags(["br"]);
        Self { text_only }
    }
}

impl ChatSurface for TerminalSurface {
    fn replace_content(&mut self, html: &str) {
        let separated = html.replace("</div></div>", "</div></div>\n");
        let plain = self.text_only.clean(&separated).to_string();
        println!("----------------------------------------");
        for line in plain.lines().filter(|line| !line.trim().is_empty()) {
            println!("{}", line.replace("<br>", " / "));
        }
    }

    fn scroll_to_bottom(&mut self) {}

    fn set_icon(&mut self, slot: IconSlot, source: &str) {
        tracing::trace!(?slot, %source, "icon changed");
    }

    fn set_input_text(&mut self, text: &str) {
        if !text.is_empty() {
            println!("> {text}");
        }
    }

    fn set_image_preview(&mut self, preview_url: Option<&str>) {
        match preview_url {
            Some(_) => println!("[image attached]"),
            None => tracing::debug!("image preview cleared"),
        }
    }

    fn set_open(&mut self, open: bool) {
        println!("[chat {}]", if open { "opened" } else { "closed" });
    }

    fn alert(&mut self, message: &str) {
        eprintln!("! {message}");
    }

    fn play_audio(&mut self, clip: AudioClip) {
        tracing::info!(
            mime = %clip.mime_type,
            bytes = clip.bytes.len(),
            "received reply audio"
        );
    }
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Parses `color=Red size=S` into an ordered selection.
fn parse_selection(arguments: &str) -> VariationSelection {
    VariationSelection::new(
        arguments
            .split_whitespace()
            .filter_map(|pair| pair.split_once('='))
            .map(|(category, value)| (category.to_string(), value.to_string()))
            .collect(),
    )
}

async fn attach_image_from(widget: &mut ChatWidget<TerminalSurface>, raw_path: &str) {
    widget.image_button_clicked(Instant::now());
    let path = Path::new(raw_path.trim());
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let upload = PendingUpload::from_file(file_name, image_mime(path), bytes);
            widget.attach_image(upload);
        }
        Err(error) => {
            tracing::error!(path = ?path, %error, "failed to read image");
            eprintln!("! could not read {}: {error}", path.display());
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let store = SettingsStore::load();
    let settings = store.settings();
    tracing::info!(
        config = ?store.config_path(),
        base_url = %settings.base_url,
        "starting plantae chat"
    );

    let transport = match create_transport(settings.transport_config(), settings.csrf_provider())
    {
        Ok(transport) => transport,
        Err(error) => {
            tracing::error!(%error, "failed to create agent transport");
            eprintln!("! {error}");
            std::process::exit(1);
        }
    };

    let mut widget = ChatWidget::new(TerminalSurface::new(), transport, &settings);
    widget.initialize().await;
    widget.open().await;

    println!("commands: /image <path>, /unimage, /pick key=value.., /cancel, /clear, /close, /open, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(%error, "failed to read stdin");
                break;
            }
        };

        widget.tick(Instant::now()).await;

        let trimmed = line.trim();
        match trimmed.split_once(' ').unwrap_or((trimmed, "")) {
            ("/quit", _) => break,
            ("/open", _) => widget.open().await,
            ("/close", _) => widget.close(),
            ("/clear", _) => {
                widget.clear_chat().await;
            }
            ("/image", path) => attach_image_from(&mut widget, path).await,
            ("/unimage", _) => widget.remove_image(),
            ("/pick", arguments) => {
                let outcome = widget.submit_variations(parse_selection(arguments)).await;
                tracing::debug!(?outcome, "variation form resolved");
            }
            ("/cancel", _) => {
                widget.cancel_variations();
            }
            _ => {
                widget.input_changed(line.clone());
                let outcome = widget.send().await;
                tracing::debug!(?outcome, "turn finished");
            }
        }
    }

    widget.teardown();
}
