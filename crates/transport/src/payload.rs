use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MalformedReplySnafu, TransportResult};

/// Speaker role as stored by the agent backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    #[serde(alias = "assistant")]
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryImage {
    pub url: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Body of `GET /agent/get_chat_history/`.
///
/// Older servers only send `messages`; newer ones add an `images` collection
/// that the widget merges by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryPayload {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
    #[serde(default)]
    pub images: Vec<HistoryImage>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// One chat turn sent to `/agent/ask/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    pub message: String,
    pub image: Option<ImageUpload>,
}

impl AskRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageUpload) -> Self {
        self.image = Some(image);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptKind {
    #[serde(rename = "variation_selection")]
    VariationSelection,
    #[serde(other)]
    Unknown,
}

/// Ordered category -> option list mapping.
///
/// JSON object order is preserved so dropdowns appear in the order the
/// agent listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariationOptions(pub Vec<(String, Vec<String>)>);

impl VariationOptions {
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        Self(entries)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(category, _)| category.as_str())
    }

    pub fn options(&self, category: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, options)| options.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(category, options)| (category.as_str(), options.as_slice()))
    }
}

impl<'de> Deserialize<'de> for VariationOptions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedOptionsVisitor;

        impl<'de> Visitor<'de> for OrderedOptionsVisitor {
            type Value = VariationOptions;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of variation categories to option lists")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((category, options)) = access.next_entry::<String, Vec<String>>()? {
                    entries.push((category, options));
                }
                Ok(VariationOptions(entries))
            }
        }

        deserializer.deserialize_map(OrderedOptionsVisitor)
    }
}

impl Serialize for VariationOptions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, options) in &self.0 {
            map.serialize_entry(category, options)?;
        }
        map.end()
    }
}

/// `interrupt_data` object attached to an interrupted ask reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptData {
    #[serde(rename = "type")]
    pub kind: InterruptKind,
    #[serde(default)]
    pub product_name: String,
    #[serde(default, alias = "variations")]
    pub variation_dict: VariationOptions,
    #[serde(default)]
    pub message: String,
}

/// Raw `/agent/ask/` body before it is classified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub interrupt: bool,
    #[serde(default)]
    pub interrupt_data: Option<InterruptData>,
}

/// Classified agent answer to one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    Response(String),
    Interrupt(InterruptData),
}

impl AskResponse {
    pub fn into_reply(self, endpoint: &str) -> TransportResult<AgentReply> {
        if self.interrupt {
            match self.interrupt_data {
                Some(data) if data.kind == InterruptKind::VariationSelection => {
                    return Ok(AgentReply::Interrupt(data));
                }
                Some(data) => {
                    tracing::warn!(
                        endpoint = %endpoint,
                        kind = ?data.kind,
                        "ignoring unsupported interrupt kind"
                    );
                }
                None => {
                    tracing::warn!(endpoint = %endpoint, "interrupt flag set without interrupt_data");
                }
            }
        }

        match self.response {
            Some(response) => Ok(AgentReply::Response(response)),
            None => MalformedReplySnafu {
                stage: "classify-ask-reply",
                endpoint: endpoint.to_string(),
                details: "reply carries neither `response` nor a supported interrupt".to_string(),
            }
            .fail(),
        }
    }
}

/// Ordered category -> chosen option mapping sent when resuming an interrupt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariationSelection(pub Vec<(String, String)>);

impl VariationSelection {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self(entries)
    }

    pub fn get(&self, category: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(category, value)| (category.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for VariationSelection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, value) in &self.0 {
            map.serialize_entry(category, value)?;
        }
        map.end()
    }
}

/// Body of a resume or variation-selection reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeReply {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub interrupt: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetResponse {
    #[serde(default)]
    pub greet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SttResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Encoded audio blob exchanged with the STT/TTS endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AudioClip {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn webm(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new("audio/webm", bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn variation_dict_keeps_category_order() {
        let data: InterruptData = serde_json::from_value(json!({
            "type": "variation_selection",
            "product_name": "Monstera",
            "variation_dict": {"size": ["S", "M"], "color": ["Red", "Blue"]},
            "message": "Pick one"
        }))
        .expect("interrupt data");

        let categories = data.variation_dict.categories().collect::<Vec<_>>();
        assert_eq!(categories, vec!["size", "color"]);
        assert_eq!(
            data.variation_dict.options("color"),
            Some(&["Red".to_string(), "Blue".to_string()][..])
        );
    }

    #[test]
    fn legacy_variations_key_is_accepted() {
        let data: InterruptData = serde_json::from_value(json!({
            "type": "variation_selection",
            "product_name": "Fern",
            "variations": {"pot": ["Clay"]},
            "message": "Choose"
        }))
        .expect("interrupt data");

        assert_eq!(data.variation_dict.len(), 1);
    }

    #[test]
    fn interrupted_reply_is_classified_before_response() {
        let response: AskResponse = serde_json::from_value(json!({
            "response": "ignored",
            "interrupt": true,
            "interrupt_data": {
                "type": "variation_selection",
                "product_name": "Fern",
                "variation_dict": {"pot": ["Clay"]},
                "message": "Choose"
            }
        }))
        .expect("ask response");

        let reply = response.into_reply("/agent/ask/").expect("classified reply");
        assert!(matches!(reply, AgentReply::Interrupt(data) if data.product_name == "Fern"));
    }

    #[test]
    fn unknown_interrupt_kind_falls_back_to_response_text() {
        let response: AskResponse = serde_json::from_value(json!({
            "response": "plain answer",
            "interrupt": true,
            "interrupt_data": {"type": "payment_confirmation"}
        }))
        .expect("ask response");

        let reply = response.into_reply("/agent/ask/").expect("classified reply");
        assert_eq!(reply, AgentReply::Response("plain answer".to_string()));
    }

    #[test]
    fn reply_without_response_or_interrupt_is_malformed() {
        let error = AskResponse::default()
            .into_reply("/agent/ask/")
            .expect_err("malformed reply");
        assert!(error.is_malformed_response());
    }

    #[test]
    fn selection_serializes_as_ordered_object() {
        let selection = VariationSelection::new(vec![
            ("color".to_string(), "Red".to_string()),
            ("size".to_string(), "S".to_string()),
        ]);

        let encoded = serde_json::to_string(&selection).expect("encode selection");
        assert_eq!(encoded, r#"{"color":"Red","size":"S"}"#);
    }
}
