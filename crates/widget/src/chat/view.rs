use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use plantae_transport::{AgentReply, AgentTransport, AskRequest, VariationSelection};

use crate::chat::events::{InterruptOutcome, ReplyMapped, ReplyPayload, SendOutcome, TurnOrigin};
use crate::chat::history::HistoryStore;
use crate::chat::interrupt::InterruptRequest;
use crate::chat::message::{ChatEntry, EntryId, PipelineState, PipelineTransition, TurnId};
use crate::chat::message_input::{KeyOutcome, KeyPress, MessageInput, PendingUpload};
use crate::chat::render::render_thread;
use crate::chat::surface::ChatSurface;
use crate::icons::{IconReflector, IconSlot, IconState};
use crate::settings::{ResumeRoute, WidgetSettings};
use crate::voice::{AudioDevice, SilenceDecision, VoiceRecorder};

pub const ERROR_REPLY: &str =
    "Sorry, there was an error processing your request. Please try again.";
pub const INCOMPLETE_SELECTION_ALERT: &str = "Please select all required variations.";
pub const SELECTION_CANCELLED_NOTICE: &str = "Variation selection cancelled.";

/// The turn currently awaiting an agent reply.
#[derive(Debug, Clone, Copy)]
struct ActiveTurn {
    turn: TurnId,
    placeholder_id: EntryId,
    origin: TurnOrigin,
}

/// The variation form still waiting for the user.
#[derive(Debug, Clone)]
struct PendingInterrupt {
    entry_id: EntryId,
    request: InterruptRequest,
}

/// Controller for one chat panel.
///
/// All operations take `&mut self`, so one widget handles one user action at
/// a time; a second send while a turn is in flight is rejected by the pipeline.
pub struct ChatWidget<S: ChatSurface> {
    surface: S,
    transport: Arc<dyn AgentTransport>,
    first_name: String,
    resume_route: ResumeRoute,
    history: HistoryStore,
    input: MessageInput,
    pipeline: PipelineState,
    icons: IconReflector,
    recorder: VoiceRecorder,
    active_turn: Option<ActiveTurn>,
    pending_interrupt: Option<PendingInterrupt>,
    speak_next_reply: bool,
    next_turn_id: u64,
    is_open: bool,
}

impl<S: ChatSurface> ChatWidget<S> {
    pub fn new(surface: S, transport: Arc<dyn AgentTransport>, settings: &WidgetSettings) -> Self {
        Self {
            surface,
            transport,
            first_name: settings.user_first_name.clone(),
            resume_route: settings.resume_route,
            history: HistoryStore::new(),
            input: MessageInput::new(),
            pipeline: PipelineState::Idle,
            icons: IconReflector::new(settings.icons.clone()),
            recorder: VoiceRecorder::new(),
            active_turn: None,
            pending_interrupt: None,
            speak_next_reply: false,
            next_turn_id: 1,
            is_open: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.pipeline
    }

    pub fn input_text(&self) -> &str {
        self.input.text()
    }

    pub fn pending_interrupt(&self) -> Option<&InterruptRequest> {
        self.pending_interrupt
            .as_ref()
            .map(|pending| &pending.request)
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn icon_state(&self, slot: IconSlot) -> IconState {
        self.icons.state(slot)
    }

    /// Mounts the widget: syncs icons and renders the server transcript.
    pub async fn initialize(&mut self) {
        self.icons.sync_all(&mut self.surface);
        self.load_history().await;
    }

    /// Reloads the transcript from the server.
    ///
    /// Any failure leaves the transcript empty, which renders the default greeting.
    pub async fn load_history(&mut self) {
        match self.transport.fetch_history().await {
            Ok(payload) => self.history.hydrate(payload),
            Err(error) => {
                tracing::warn!(stage = error.stage(), %error, "failed to load chat history");
                self.history.clear();
            }
        }
        self.render();
    }

    /// Opens the panel, asking the agent for a greeting when the transcript is empty.
    pub async fn open(&mut self) {
        self.is_open = true;
        self.surface.set_open(true);
        self.icons
            .set(&mut self.surface, IconSlot::Toggle, IconState::Idle);

        if self.history.is_empty() {
            match self.transport.greet().await {
                Ok(Some(greeting)) => {
                    let id = self.history.alloc_id();
                    let entry = ChatEntry::agent_text(id, greeting)
                        .with_timestamp(Some(Local::now().naive_local()));
                    self.history.append(entry);
                }
                Ok(None) => tracing::debug!("agent returned no greeting"),
                Err(error) => tracing::warn!(%error, "failed to fetch greeting"),
            }
        }
        self.render();
    }

    pub fn close(&mut self) {
        self.is_open = false;
        self.surface.set_open(false);
    }

    pub async fn toggle(&mut self) {
        if self.is_open {
            self.close();
        } else {
            self.open().await;
        }
    }

    /// Hover or focus on the toggle button.
    pub fn toggle_hovered(&mut self, hovered: bool) {
        let state = if hovered {
            IconState::Active
        } else {
            IconState::Idle
        };
        self.icons.set(&mut self.surface, IconSlot::Toggle, state);
    }

    /// Mirrors the host's text field.
    pub fn input_changed(&mut self, text: impl Into<String>) {
        self.input.set_text(text);
        let transition = if self.input.has_content() {
            PipelineTransition::Compose
        } else {
            PipelineTransition::ClearComposer
        };
        self.apply_transition(transition);
    }

    /// Handles a key press in the text field; a plain Enter sends.
    pub async fn handle_key(&mut self, press: KeyPress) -> KeyOutcome {
        let outcome = self.input.classify_key(press);
        if outcome == KeyOutcome::Submit {
            self.send().await;
        }
        outcome
    }

    /// The image button was pressed; its icon stays active while the picker opens.
    pub fn image_button_clicked(&mut self, now: Instant) {
        self.icons.flash(&mut self.surface, IconSlot::Image, now);
    }

    /// Stores the chosen image for the next send and shows its preview.
    pub fn attach_image(&mut self, upload: PendingUpload) {
        self.surface.set_image_preview(Some(&upload.preview_url));
        if let Some(previous) = self.input.attach(upload) {
            tracing::debug!(file_name = %previous.file_name, "replaced pending image");
        }
        self.apply_transition(PipelineTransition::Compose);
    }

    pub fn remove_image(&mut self) {
        if self.input.remove_attachment().is_some() {
            self.surface.set_image_preview(None);
        }
        if !self.input.has_content() {
            self.apply_transition(PipelineTransition::ClearComposer);
        }
    }

    /// Sends the composer contents as one turn.
    pub async fn send(&mut self) -> SendOutcome {
        let origin = if std::mem::take(&mut self.speak_next_reply) {
            TurnOrigin::Voice
        } else {
            TurnOrigin::Typed
        };
        self.send_turn(origin).await
    }

    async fn send_turn(&mut self, origin: TurnOrigin) -> SendOutcome {
        if !self.input.has_content() {
            return SendOutcome::Skipped;
        }

        let turn = TurnId::new(self.next_turn_id);
        match self.pipeline.apply(PipelineTransition::Dispatch(turn)) {
            Ok(next) => self.pipeline = next,
            Err(rejection) => {
                tracing::warn!(?rejection, "send ignored while a turn is in flight");
                return SendOutcome::Rejected(rejection);
            }
        }
        // Reserve the id immediately so later sends never reuse a turn.
        self.next_turn_id = self.next_turn_id.saturating_add(1);

        let Some(submission) = self.input.take_submission() else {
            self.apply_transition(PipelineTransition::ResetToIdle);
            return SendOutcome::Skipped;
        };

        let user_id = self.history.alloc_id();
        let user_entry = match submission.image.as_ref() {
            Some(image) => ChatEntry::user_image(
                user_id,
                image.preview_url.clone(),
                Some(submission.text.clone()),
            ),
            None => ChatEntry::user_text(user_id, submission.text.clone()),
        };
        self.history.append(user_entry);
        self.surface.set_input_text("");
        if submission.image.is_some() {
            self.surface.set_image_preview(None);
        }

        let placeholder_id = self.history.alloc_id();
        self.history.append(ChatEntry::typing(placeholder_id));
        self.icons
            .set(&mut self.surface, IconSlot::Send, IconState::Active);
        self.render();

        self.active_turn = Some(ActiveTurn {
            turn,
            placeholder_id,
            origin,
        });
        self.apply_transition(PipelineTransition::Await(turn));

        let mut request = AskRequest::new(submission.text);
        if let Some(image) = submission.image.as_ref() {
            request = request.with_image(image.to_image_upload());
        }

        tracing::debug!(turn = turn.0, ?origin, "dispatching chat turn");
        let payload = match self.transport.ask(request).await {
            Ok(AgentReply::Response(response)) => ReplyPayload::Response(response),
            Ok(AgentReply::Interrupt(data)) => ReplyPayload::Interrupt(data.into()),
            Err(error) => {
                tracing::error!(stage = error.stage(), %error, "chat turn failed");
                ReplyPayload::Error(error.to_string())
            }
        };

        self.finish_turn(ReplyMapped::new(turn, payload)).await
    }

    async fn finish_turn(&mut self, mapped: ReplyMapped) -> SendOutcome {
        let Some(active) = self.active_turn.filter(|active| active.turn == mapped.turn) else {
            tracing::warn!(turn = mapped.turn.0, "dropping reply for an inactive turn");
            return SendOutcome::Failed;
        };

        match self.pipeline.apply(mapped.transition()) {
            Ok(next) => self.pipeline = next,
            Err(rejection) => {
                tracing::warn!(?rejection, "reply rejected by pipeline");
                return SendOutcome::Failed;
            }
        }
        self.active_turn = None;

        match mapped.payload {
            ReplyPayload::Response(response) => {
                self.history.replace(
                    active.placeholder_id,
                    ChatEntry::agent_text(active.placeholder_id, response.clone()),
                );
                self.settle_send_icon_and_render();
                if active.origin == TurnOrigin::Voice {
                    self.speak(response).await;
                }
                self.apply_transition(PipelineTransition::ResetToIdle);
                SendOutcome::Replied
            }
            ReplyPayload::Interrupt(request) => {
                self.show_interrupt(active.placeholder_id, request);
                self.settle_send_icon_and_render();
                SendOutcome::Interrupted
            }
            ReplyPayload::Error(_) => {
                self.history.replace(
                    active.placeholder_id,
                    ChatEntry::notice(active.placeholder_id, ERROR_REPLY),
                );
                self.settle_send_icon_and_render();
                self.apply_transition(PipelineTransition::ResetToIdle);
                SendOutcome::Failed
            }
        }
    }

    fn show_interrupt(&mut self, entry_id: EntryId, request: InterruptRequest) {
        if let Some(previous) = self.pending_interrupt.take() {
            tracing::debug!(
                entry_id = previous.entry_id.0,
                "superseding unanswered variation form"
            );
            self.history.replace(
                previous.entry_id,
                ChatEntry::notice(previous.entry_id, SELECTION_CANCELLED_NOTICE),
            );
        }

        tracing::info!(product = %request.product_name, "agent requested variation selection");
        self.history
            .replace(entry_id, ChatEntry::interrupt(entry_id, request.clone()));
        self.pending_interrupt = Some(PendingInterrupt { entry_id, request });
    }

    /// Resolves the pending variation form with the user's choices.
    ///
    /// The form is replaced by a confirmation, the confirmation is saved to the
    /// transcript, and the agent is resumed exactly once.
    pub async fn submit_variations(&mut self, selection: VariationSelection) -> InterruptOutcome {
        let Some(pending) = self.pending_interrupt.as_ref() else {
            tracing::debug!("variation submit without a pending form");
            return InterruptOutcome::NoPendingInterrupt;
        };

        let selection = match pending.request.validate(&selection) {
            Ok(selection) => selection,
            Err(error) => {
                tracing::debug!(%error, "incomplete variation selection");
                self.surface.alert(INCOMPLETE_SELECTION_ALERT);
                return InterruptOutcome::Invalid;
            }
        };

        let Some(pending) = self.pending_interrupt.take() else {
            return InterruptOutcome::NoPendingInterrupt;
        };
        let confirmation = pending.request.confirmation_text(&selection);
        self.history.remove(pending.entry_id);
        let confirmation_id = self.history.alloc_id();
        self.history
            .append(ChatEntry::agent_text(confirmation_id, confirmation.clone()));
        self.render();

        if let Err(error) = self.transport.save_message(confirmation).await {
            tracing::warn!(%error, "failed to save variation confirmation");
        }

        let resumed = match self.resume_route {
            ResumeRoute::Ask => self.transport.resume(selection).await,
            ResumeRoute::VariationSelection => self.transport.submit_variations(selection).await,
        };

        let outcome = match resumed {
            Ok(reply) => {
                if reply.interrupt {
                    tracing::debug!("resumed agent interrupted again; showing reply text");
                }
                if !reply.response.trim().is_empty() {
                    let id = self.history.alloc_id();
                    self.history.append(ChatEntry::agent_text(id, reply.response));
                    self.render();
                }
                InterruptOutcome::Resumed
            }
            Err(error) => {
                tracing::error!(stage = error.stage(), %error, "failed to resume agent");
                InterruptOutcome::ResumeFailed
            }
        };

        self.settle_interrupted_pipeline();
        outcome
    }

    /// Abandons the pending variation form without contacting the agent.
    pub fn cancel_variations(&mut self) -> InterruptOutcome {
        let Some(pending) = self.pending_interrupt.take() else {
            return InterruptOutcome::NoPendingInterrupt;
        };

        self.history.replace(
            pending.entry_id,
            ChatEntry::notice(pending.entry_id, SELECTION_CANCELLED_NOTICE),
        );
        self.render();
        self.settle_interrupted_pipeline();
        InterruptOutcome::Cancelled
    }

    /// Clears the server transcript and, on success, the local one.
    pub async fn clear_chat(&mut self) -> bool {
        match self.transport.clear_chat().await {
            Ok(response) if response.success => {
                self.history.clear();
                self.pending_interrupt = None;
                self.settle_interrupted_pipeline();
                self.render();
                tracing::info!("chat history cleared");
                true
            }
            Ok(response) => {
                let reason = response
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string());
                self.surface
                    .alert(&format!("Failed to clear chat: {reason}"));
                false
            }
            Err(error) => {
                tracing::error!(%error, "failed to clear chat");
                self.surface
                    .alert(&format!("Error clearing chat: {error}"));
                false
            }
        }
    }

    /// Starts capturing audio; failures are reported to the user.
    pub fn start_recording(&mut self, device: &mut dyn AudioDevice, now: Instant) -> bool {
        match self.recorder.start(device, now) {
            Ok(()) => {
                self.icons
                    .set(&mut self.surface, IconSlot::Mic, IconState::Active);
                true
            }
            Err(error) => {
                tracing::error!(%error, "failed to start recording");
                self.surface
                    .alert(&format!("Error accessing microphone: {error}"));
                false
            }
        }
    }

    pub fn push_audio_chunk(&mut self, chunk: &[u8]) {
        self.recorder.push_chunk(chunk);
    }

    /// Feeds one analysis frame; sustained silence stops and sends the recording.
    pub async fn observe_audio_level(&mut self, level: f32, at: Instant) -> SilenceDecision {
        let decision = self.recorder.observe_level(level, at);
        if decision == SilenceDecision::AutoStop {
            tracing::debug!("silence detected, stopping recording");
            self.stop_recording().await;
        }
        decision
    }

    /// Advances timers: icon flashes and silence auto-stop.
    pub async fn tick(&mut self, now: Instant) {
        self.icons.expire(&mut self.surface, now);
        if self.recorder.poll(now) == SilenceDecision::AutoStop {
            tracing::debug!("silence timeout elapsed, stopping recording");
            self.stop_recording().await;
        }
    }

    /// Stops recording, transcribes, and sends the transcript as a voice turn.
    ///
    /// Returns `None` when nothing was recorded or transcription failed.
    pub async fn stop_recording(&mut self) -> Option<SendOutcome> {
        let clip = self.recorder.stop()?;
        self.icons
            .set(&mut self.surface, IconSlot::Mic, IconState::Idle);

        if clip.is_empty() {
            tracing::debug!("recording produced no audio");
            return None;
        }

        let transcript = match self.transport.transcribe(clip).await {
            Ok(response) => match response.text.filter(|text| !text.trim().is_empty()) {
                Some(text) => text,
                None => {
                    let reason = response
                        .error
                        .unwrap_or_else(|| "Unknown error".to_string());
                    self.surface.alert(&format!("STT error: {reason}"));
                    return None;
                }
            },
            Err(error) => {
                tracing::error!(%error, "speech to text failed");
                self.surface.alert(&format!("STT error: {error}"));
                return None;
            }
        };

        self.surface.set_input_text(&transcript);
        self.input_changed(transcript);
        self.speak_next_reply = true;
        Some(self.send().await)
    }

    /// Releases the microphone and drops unsent input.
    pub fn teardown(&mut self) {
        if self.recorder.stop().is_some() {
            tracing::debug!("discarded in-progress recording on teardown");
        }
        self.input.clear();
    }

    async fn speak(&mut self, text: String) {
        match self.transport.synthesize(text).await {
            Ok(clip) => self.surface.play_audio(clip),
            Err(error) => tracing::error!(%error, "text to speech failed"),
        }
    }

    fn settle_send_icon_and_render(&mut self) {
        self.icons
            .set(&mut self.surface, IconSlot::Send, IconState::Idle);
        self.render();
    }

    fn settle_interrupted_pipeline(&mut self) {
        if matches!(self.pipeline, PipelineState::Interrupted(_)) {
            self.apply_transition(PipelineTransition::ResetToIdle);
        }
    }

    fn apply_transition(&mut self, transition: PipelineTransition) {
        match self.pipeline.apply(transition) {
            Ok(next) => self.pipeline = next,
            Err(rejection) => tracing::debug!(?rejection, "ignored pipeline transition"),
        }
    }

    fn render(&mut self) {
        let html = render_thread(self.history.entries(), &self.first_name);
        self.surface.replace_content(&html);
        self.surface.scroll_to_bottom();
    }
}
