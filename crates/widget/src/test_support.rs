//! Recording doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use plantae_transport::{
    AgentReply, AgentTransport, AskRequest, AudioClip, BoxFuture, ChatHistoryPayload,
    ClearResponse, ResumeReply, SttResponse, TransportResult, VariationSelection,
};

use crate::chat::surface::ChatSurface;
use crate::icons::IconSlot;
use crate::voice::{AudioDevice, CaptureStream, VoiceError, VoiceResult};

#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub renders: Vec<String>,
    pub scrolls: usize,
    pub icons: Vec<(IconSlot, String)>,
    pub input_texts: Vec<String>,
    pub previews: Vec<Option<String>>,
    pub open_states: Vec<bool>,
    pub alerts: Vec<String>,
    pub played: Vec<AudioClip>,
}

impl ChatSurface for RecordingSurface {
    fn replace_content(&mut self, html: &str) {
        self.renders.push(html.to_string());
    }

    fn scroll_to_bottom(&mut self) {
        self.scrolls += 1;
    }

    fn set_icon(&mut self, slot: IconSlot, source: &str) {
        self.icons.push((slot, source.to_string()));
    }

    fn set_input_text(&mut self, text: &str) {
        self.input_texts.push(text.to_string());
    }

    fn set_image_preview(&mut self, preview_url: Option<&str>) {
        self.previews.push(preview_url.map(str::to_string));
    }

    fn set_open(&mut self, open: bool) {
        self.open_states.push(open);
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn play_audio(&mut self, clip: AudioClip) {
        self.played.push(clip);
    }
}

/// One observed transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchHistory,
    Ask(AskRequest),
    SaveMessage(String),
    Resume(VariationSelection),
    SubmitVariations(VariationSelection),
    Greet,
    ClearChat,
    Transcribe(Vec<u8>),
    Synthesize(String),
}

/// Scripted transport: queued results are returned in order, then defaults.
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    history: Mutex<VecDeque<TransportResult<ChatHistoryPayload>>>,
    asks: Mutex<VecDeque<TransportResult<AgentReply>>>,
    resumes: Mutex<VecDeque<TransportResult<ResumeReply>>>,
    greets: Mutex<VecDeque<TransportResult<Option<String>>>>,
    clears: Mutex<VecDeque<TransportResult<ClearResponse>>>,
    transcriptions: Mutex<VecDeque<TransportResult<SttResponse>>>,
    syntheses: Mutex<VecDeque<TransportResult<AudioClip>>>,
}

impl FakeTransport {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn push_history(&self, result: TransportResult<ChatHistoryPayload>) {
        self.history.lock().expect("history lock").push_back(result);
    }

    pub fn push_ask(&self, result: TransportResult<AgentReply>) {
        self.asks.lock().expect("ask lock").push_back(result);
    }

    pub fn push_resume(&self, result: TransportResult<ResumeReply>) {
        self.resumes.lock().expect("resume lock").push_back(result);
    }

    pub fn push_greet(&self, result: TransportResult<Option<String>>) {
        self.greets.lock().expect("greet lock").push_back(result);
    }

    pub fn push_clear(&self, result: TransportResult<ClearResponse>) {
        self.clears.lock().expect("clear lock").push_back(result);
    }

    pub fn push_transcribe(&self, result: TransportResult<SttResponse>) {
        self.transcriptions
            .lock()
            .expect("transcription lock")
            .push_back(result);
    }

    pub fn push_synthesize(&self, result: TransportResult<AudioClip>) {
        self.syntheses
            .lock()
            .expect("synthesis lock")
            .push_back(result);
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn next<T>(
        queue: &Mutex<VecDeque<TransportResult<T>>>,
        default: impl FnOnce() -> T,
    ) -> TransportResult<T> {
        queue
            .lock()
            .expect("queue lock")
            .pop_front()
            .unwrap_or_else(|| Ok(default()))
    }
}

impl AgentTransport for FakeTransport {
    fn fetch_history(&self) -> BoxFuture<'_, TransportResult<ChatHistoryPayload>> {
        self.record(Call::FetchHistory);
        let result = Self::next(&self.history, ChatHistoryPayload::default);
        Box::pin(async move { result })
    }

    fn ask(&self, request: AskRequest) -> BoxFuture<'_, TransportResult<AgentReply>> {
        self.record(Call::Ask(request));
        let result = Self::next(&self.asks, || AgentReply::Response("ok".to_string()));
        Box::pin(async move { result })
    }

    fn save_message(&self, message: String) -> BoxFuture<'_, TransportResult<()>> {
        self.record(Call::SaveMessage(message));
        Box::pin(async move { Ok(()) })
    }

    fn resume(&self, selection: VariationSelection) -> BoxFuture<'_, TransportResult<ResumeReply>> {
        self.record(Call::Resume(selection));
        let result = Self::next(&self.resumes, ResumeReply::default);
        Box::pin(async move { result })
    }

    fn submit_variations(
        &self,
        selection: VariationSelection,
    ) -> BoxFuture<'_, TransportResult<ResumeReply>> {
        self.record(Call::SubmitVariations(selection));
        let result = Self::next(&self.resumes, ResumeReply::default);
        Box::pin(async move { result })
    }

    fn greet(&self) -> BoxFuture<'_, TransportResult<Option<String>>> {
        self.record(Call::Greet);
        let result = Self::next(&self.greets, || None);
        Box::pin(async move { result })
    }

    fn clear_chat(&self) -> BoxFuture<'_, TransportResult<ClearResponse>> {
        self.record(Call::ClearChat);
        let result = Self::next(&self.clears, || ClearResponse {
            success: true,
            error: None,
        });
        Box::pin(async move { result })
    }

    fn transcribe(&self, audio: AudioClip) -> BoxFuture<'_, TransportResult<SttResponse>> {
        self.record(Call::Transcribe(audio.bytes));
        let result = Self::next(&self.transcriptions, SttResponse::default);
        Box::pin(async move { result })
    }

    fn synthesize(&self, text: String) -> BoxFuture<'_, TransportResult<AudioClip>> {
        self.record(Call::Synthesize(text));
        let result = Self::next(&self.syntheses, || AudioClip::new("audio/mpeg", vec![0_u8]));
        Box::pin(async move { result })
    }
}

struct FakeStream {
    releases: Arc<AtomicUsize>,
}

impl CaptureStream for FakeStream {
    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Microphone double counting how often its stream was released.
#[derive(Default)]
pub struct FakeDevice {
    releases: Arc<AtomicUsize>,
    denied: bool,
}

impl FakeDevice {
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl AudioDevice for FakeDevice {
    fn acquire(&mut self) -> VoiceResult<Box<dyn CaptureStream>> {
        if self.denied {
            return Err(VoiceError::PermissionDenied {
                stage: "acquire-microphone",
                details: "NotAllowedError".to_string(),
            });
        }
        Ok(Box::new(FakeStream {
            releases: Arc::clone(&self.releases),
        }))
    }
}
