use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use snafu::ResultExt;

use crate::client::{AgentTransport, BoxFuture, CsrfTokenProvider, TransportConfig};
use crate::error::{
    BuildClientSnafu, DecodeSnafu, EncodeSnafu, InvalidMimeSnafu, InvalidUrlSnafu, RequestSnafu,
    StatusSnafu, TransportResult,
};
use crate::payload::{
    AgentReply, AskRequest, AskResponse, AudioClip, ChatHistoryPayload, ClearResponse,
    GreetResponse, ResumeReply, SttResponse, VariationSelection,
};

const AUDIO_UPLOAD_FILE_NAME: &str = "audio.webm";
const DEFAULT_TTS_MIME: &str = "audio/mpeg";

/// `reqwest`-backed transport talking to the agent endpoints.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    config: TransportConfig,
    csrf: Arc<dyn CsrfTokenProvider>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig, csrf: Arc<dyn CsrfTokenProvider>) -> TransportResult<Self> {
        let base_url = Url::parse(&config.base_url).context(InvalidUrlSnafu {
            stage: "parse-base-url",
            url: config.base_url.clone(),
        })?;

        // Holds the login session and any cookie the server rotates.
        let cookies = Arc::new(Jar::default());
        if let Some(cookie) = config.session_cookie.as_deref() {
            cookies.add_cookie_str(cookie, &base_url);
        }

        let client = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .timeout(config.request_timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self {
            client,
            base_url,
            config,
            csrf,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn endpoint_url(&self, route: &str) -> TransportResult<Url> {
        self.base_url.join(route).context(InvalidUrlSnafu {
            stage: "join-endpoint-url",
            url: route.to_string(),
        })
    }

    fn request(&self, method: Method, route: &str) -> TransportResult<RequestBuilder> {
        let url = self.endpoint_url(route)?;
        let mut builder = self.client.request(method, url);

        match self.csrf.token() {
            Some(token) => {
                builder = builder.header(self.config.csrf_header.as_str(), token);
            }
            None => {
                tracing::debug!(endpoint = %route, "no csrf token available for request");
            }
        }

        Ok(builder)
    }

    async fn send(
        &self,
        stage: &'static str,
        route: &str,
        builder: RequestBuilder,
    ) -> TransportResult<Response> {
        let response = builder.send().await.context(RequestSnafu {
            stage,
            endpoint: route.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                endpoint = %route,
                status = status.as_u16(),
                "agent endpoint returned a non-success status"
            );
            return StatusSnafu {
                stage,
                endpoint: route.to_string(),
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(response)
    }

    async fn decode<T>(stage: &'static str, route: &str, response: Response) -> TransportResult<T>
    where
        T: DeserializeOwned,
    {
        let payload = response.text().await.context(RequestSnafu {
            stage,
            endpoint: route.to_string(),
        })?;

        serde_json::from_str(&payload).context(DecodeSnafu {
            stage,
            endpoint: route.to_string(),
        })
    }

    async fn fetch_history_inner(&self) -> TransportResult<ChatHistoryPayload> {
        let route = self.config.endpoints.history.as_str();
        let builder = self.request(Method::GET, route)?;
        let response = self.send("fetch-history", route, builder).await?;
        Self::decode("decode-history", route, response).await
    }

    async fn ask_inner(&self, request: AskRequest) -> TransportResult<AgentReply> {
        let route = self.config.endpoints.ask.as_str();
        let mut form = Form::new().text("message", request.message);

        if let Some(image) = request.image {
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.mime_type)
                .context(InvalidMimeSnafu {
                    stage: "build-image-part",
                    mime: image.mime_type.clone(),
                })?;
            form = form.part("image", part);
        }

        let builder = self.request(Method::POST, route)?.multipart(form);
        let response = self.send("ask-agent", route, builder).await?;
        let body: AskResponse = Self::decode("decode-ask-reply", route, response).await?;
        body.into_reply(route)
    }

    async fn save_message_inner(&self, message: String) -> TransportResult<()> {
        let route = self.config.endpoints.ask.as_str();
        let builder = self
            .request(Method::POST, route)?
            .json(&json!({ "message": message, "save_only": true }));
        self.send("save-message", route, builder).await?;
        Ok(())
    }

    async fn resume_inner(&self, selection: VariationSelection) -> TransportResult<ResumeReply> {
        let route = self.config.endpoints.ask.as_str();
        let resume_data = serde_json::to_string(&selection).context(EncodeSnafu {
            stage: "encode-resume-data",
        })?;
        let form = Form::new().text("resume_data", resume_data);

        let builder = self.request(Method::POST, route)?.multipart(form);
        let response = self.send("resume-agent", route, builder).await?;
        Self::decode("decode-resume-reply", route, response).await
    }

    async fn submit_variations_inner(
        &self,
        selection: VariationSelection,
    ) -> TransportResult<ResumeReply> {
        let route = self.config.endpoints.variation_selection.as_str();
        let builder = self
            .request(Method::POST, route)?
            .json(&json!({ "variations": selection }));
        let response = self.send("submit-variations", route, builder).await?;
        Self::decode("decode-variation-reply", route, response).await
    }

    async fn greet_inner(&self) -> TransportResult<Option<String>> {
        let route = self.config.endpoints.greet.as_str();
        let builder = self.request(Method::POST, route)?;
        let response = self.send("greet", route, builder).await?;
        let body: GreetResponse = Self::decode("decode-greet", route, response).await?;
        Ok(body.greet.filter(|greet| !greet.trim().is_empty()))
    }

    async fn clear_chat_inner(&self) -> TransportResult<ClearResponse> {
        let route = self.config.endpoints.clear_chat.as_str();
        let builder = self
            .request(Method::POST, route)?
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        let response = self.send("clear-chat", route, builder).await?;
        Self::decode("decode-clear-chat", route, response).await
    }

    async fn transcribe_inner(&self, audio: AudioClip) -> TransportResult<SttResponse> {
        let route = self.config.endpoints.stt.as_str();
        let part = Part::bytes(audio.bytes)
            .file_name(AUDIO_UPLOAD_FILE_NAME)
            .mime_str(&audio.mime_type)
            .context(InvalidMimeSnafu {
                stage: "build-audio-part",
                mime: audio.mime_type.clone(),
            })?;
        let form = Form::new().part("audio", part);

        let builder = self.request(Method::POST, route)?.multipart(form);
        let response = self.send("transcribe", route, builder).await?;
        Self::decode("decode-transcription", route, response).await
    }

    async fn synthesize_inner(&self, text: String) -> TransportResult<AudioClip> {
        let route = self.config.endpoints.tts.as_str();
        let form = Form::new().text("text", text);

        let builder = self.request(Method::POST, route)?.multipart(form);
        let response = self.send("synthesize", route, builder).await?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_TTS_MIME)
            .to_string();
        let bytes = response.bytes().await.context(RequestSnafu {
            stage: "read-tts-audio",
            endpoint: route.to_string(),
        })?;

        Ok(AudioClip::new(mime_type, bytes.to_vec()))
    }
}

impl AgentTransport for HttpTransport {
    fn fetch_history(&self) -> BoxFuture<'_, TransportResult<ChatHistoryPayload>> {
        Box::pin(self.fetch_history_inner())
    }

    fn ask(&self, request: AskRequest) -> BoxFuture<'_, TransportResult<AgentReply>> {
        Box::pin(self.ask_inner(request))
    }

    fn save_message(&self, message: String) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(self.save_message_inner(message))
    }

    fn resume(&self, selection: VariationSelection) -> BoxFuture<'_, TransportResult<ResumeReply>> {
        Box::pin(self.resume_inner(selection))
    }

    fn submit_variations(
        &self,
        selection: VariationSelection,
    ) -> BoxFuture<'_, TransportResult<ResumeReply>> {
        Box::pin(self.submit_variations_inner(selection))
    }

    fn greet(&self) -> BoxFuture<'_, TransportResult<Option<String>>> {
        Box::pin(self.greet_inner())
    }

    fn clear_chat(&self) -> BoxFuture<'_, TransportResult<ClearResponse>> {
        Box::pin(self.clear_chat_inner())
    }

    fn transcribe(&self, audio: AudioClip) -> BoxFuture<'_, TransportResult<SttResponse>> {
        Box::pin(self.transcribe_inner(audio))
    }

    fn synthesize(&self, text: String) -> BoxFuture<'_, TransportResult<AudioClip>> {
        Box::pin(self.synthesize_inner(text))
    }
}
