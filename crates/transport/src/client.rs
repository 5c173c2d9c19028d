use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportResult;
use crate::payload::{
    AgentReply, AskRequest, AudioClip, ChatHistoryPayload, ClearResponse, ResumeReply,
    SttResponse, VariationSelection,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";
pub const DEFAULT_CSRF_HEADER: &str = "X-CSRFToken";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Supplies the anti-forgery token the hosting page rendered.
pub trait CsrfTokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Token captured once when the widget is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCsrfToken(String);

impl StaticCsrfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CsrfTokenProvider for StaticCsrfToken {
    fn token(&self) -> Option<String> {
        let token = self.0.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}

impl<F> CsrfTokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Server routes relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub history: String,
    pub ask: String,
    pub greet: String,
    pub clear_chat: String,
    pub stt: String,
    pub tts: String,
    pub variation_selection: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            history: "/agent/get_chat_history/".to_string(),
            ask: "/agent/ask/".to_string(),
            greet: "/agent/greet/".to_string(),
            clear_chat: "/agent/clear_chat/".to_string(),
            stt: "/agent/stt/".to_string(),
            tts: "/agent/tts/".to_string(),
            variation_selection: "/agent/variation_selection/".to_string(),
        }
    }
}

impl Endpoints {
    /// Replaces blank routes with their defaults.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let pick = |value: String, fallback: String| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                fallback
            } else {
                trimmed.to_string()
            }
        };

        Self {
            history: pick(self.history, defaults.history),
            ask: pick(self.ask, defaults.ask),
            greet: pick(self.greet, defaults.greet),
            clear_chat: pick(self.clear_chat, defaults.clear_chat),
            stt: pick(self.stt, defaults.stt),
            tts: pick(self.tts, defaults.tts),
            variation_selection: pick(self.variation_selection, defaults.variation_selection),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub csrf_header: String,
    pub request_timeout: Duration,
    /// Authenticated session cookie (`name=value`) sent with every request.
    pub session_cookie: Option<String>,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().to_string(),
            endpoints: Endpoints::default(),
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session_cookie: None,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints.normalized();
        self
    }

    pub fn with_csrf_header(mut self, header: impl Into<String>) -> Self {
        self.csrf_header = header.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        let cookie = cookie.into().trim().to_string();
        self.session_cookie = (!cookie.is_empty()).then_some(cookie);
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Every backend call the widget makes.
///
/// Implementations must map any non-success HTTP status to an error so the
/// pipeline can treat all transport failures uniformly.
pub trait AgentTransport: Send + Sync {
    fn fetch_history(&self) -> BoxFuture<'_, TransportResult<ChatHistoryPayload>>;
    fn ask(&self, request: AskRequest) -> BoxFuture<'_, TransportResult<AgentReply>>;
    /// Persists a widget-authored message without running the agent.
    fn save_message(&self, message: String) -> BoxFuture<'_, TransportResult<()>>;
    /// Continues an interrupted agent turn with the user's choices.
    fn resume(&self, selection: VariationSelection) -> BoxFuture<'_, TransportResult<ResumeReply>>;
    fn submit_variations(
        &self,
        selection: VariationSelection,
    ) -> BoxFuture<'_, TransportResult<ResumeReply>>;
    fn greet(&self) -> BoxFuture<'_, TransportResult<Option<String>>>;
    fn clear_chat(&self) -> BoxFuture<'_, TransportResult<ClearResponse>>;
    fn transcribe(&self, audio: AudioClip) -> BoxFuture<'_, TransportResult<SttResponse>>;
    fn synthesize(&self, text: String) -> BoxFuture<'_, TransportResult<AudioClip>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_endpoints_fall_back_to_defaults() {
        let endpoints = Endpoints {
            ask: "  ".to_string(),
            stt: " /voice/stt/ ".to_string(),
            ..Endpoints::default()
        }
        .normalized();

        assert_eq!(endpoints.ask, "/agent/ask/");
        assert_eq!(endpoints.stt, "/voice/stt/");
    }

    #[test]
    fn blank_static_token_is_not_sent() {
        assert_eq!(StaticCsrfToken::new("   ").token(), None);
        assert_eq!(
            StaticCsrfToken::new("abc").token(),
            Some("abc".to_string())
        );
    }

    #[test]
    fn blank_session_cookie_is_ignored() {
        let config = TransportConfig::default().with_session_cookie("  ");
        assert_eq!(config.session_cookie, None);

        let config = config.with_session_cookie(" sessionid=abc ");
        assert_eq!(config.session_cookie.as_deref(), Some("sessionid=abc"));
    }

    #[test]
    fn closures_provide_tokens() {
        let provider = || Some("from-page".to_string());
        assert_eq!(CsrfTokenProvider::token(&provider), Some("from-page".to_string()));
    }
}
