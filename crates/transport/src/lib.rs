//! HTTP plumbing between the chat widget and the server-side agent.
use std::sync::Arc;

mod client;
mod error;
mod http;
mod payload;

pub use client::{
    AgentTransport, BoxFuture, CsrfTokenProvider, DEFAULT_BASE_URL, DEFAULT_CSRF_HEADER,
    DEFAULT_REQUEST_TIMEOUT, Endpoints, StaticCsrfToken, TransportConfig,
};
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use payload::{
    AgentReply, AskRequest, AskResponse, AudioClip, ChatHistoryPayload, ClearResponse,
    GreetResponse, HistoryImage, HistoryMessage, HistoryRole, ImageUpload, InterruptData,
    InterruptKind, ResumeReply, SttResponse, VariationOptions, VariationSelection,
};

pub fn create_transport(
    config: TransportConfig,
    csrf: Arc<dyn CsrfTokenProvider>,
) -> TransportResult<Arc<dyn AgentTransport>> {
    tracing::debug!(base_url = %config.base_url, "creating agent transport");
    Ok(Arc::new(HttpTransport::new(config, csrf)?))
}
