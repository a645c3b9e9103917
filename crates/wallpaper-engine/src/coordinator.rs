use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{json, Map, Value};
use wallpaper_contracts::events::EventWriter;
use wallpaper_contracts::history::{HistoryEntry, HistoryStore};
use wallpaper_contracts::image_uri::{download_file_name, ImageUri};
use wallpaper_contracts::preferences::{load_language, save_language};
use wallpaper_contracts::settings::{AspectRatio, Language, DEFAULT_STYLE};
use wallpaper_contracts::store::KeyValueStore;

use crate::api::ImageApi;
use crate::error::ApiError;
use crate::prompts::AssistantTask;
use crate::share::{ShareError, ShareOutcome, SharePayload, ShareTarget};

/// Which long-running operation owns the session. At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyState {
    #[default]
    Idle,
    Generating,
    Upscaling,
    AssistantBusy,
}

/// Inline failure shown where the image would have appeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    GenerationFailed,
    UpscaleFailed,
}

/// One-shot transient message, drained by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    EnhanceFailed,
    SuggestFailed,
    ShareUnsupported,
    ShareFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Busy(BusyState),
    EmptyPrompt,
    NoImage,
}

/// What a dispatched operation did. Session state stays the source of truth.
#[derive(Debug)]
pub enum Dispatch<T> {
    Done(T),
    Ignored(IgnoreReason),
    Failed(ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub prompt: String,
    pub base_image: Option<ImageUri>,
    pub aspect_ratio: AspectRatio,
    pub style: String,
    pub current_image: Option<ImageUri>,
    pub last_prompt_used: String,
    pub busy: BusyState,
    pub last_error: Option<ErrorKind>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            base_image: None,
            aspect_ratio: AspectRatio::default(),
            style: DEFAULT_STYLE.to_string(),
            current_image: None,
            last_prompt_used: String::new(),
            busy: BusyState::Idle,
            last_error: None,
        }
    }
}

struct Inner {
    session: SessionState,
    history: Vec<HistoryEntry>,
    language: Language,
    notices: Vec<Notice>,
}

struct GenerationRequest {
    prompt: String,
    base_image: Option<ImageUri>,
    aspect_ratio: AspectRatio,
    style: String,
}

/// Resets the busy flag when the operation ends, including by panic.
struct BusyGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock_inner(self.inner).session.busy = BusyState::Idle;
    }
}

/// Owns the session and runs generate, upscale, enhance and suggest against
/// an [`ImageApi`].
///
/// The state lock is only held for transitions, never across a remote call.
/// A request that arrives while another operation is in flight is dropped.
pub struct Coordinator {
    api: Arc<dyn ImageApi>,
    store: Arc<dyn KeyValueStore>,
    history_store: HistoryStore,
    events: Option<EventWriter>,
    inner: Mutex<Inner>,
}

impl Coordinator {
    pub fn new(api: Arc<dyn ImageApi>, store: Arc<dyn KeyValueStore>) -> Self {
        let language = load_language(store.as_ref()).unwrap_or_else(Language::detect);
        let history_store = HistoryStore::new(store.clone());
        let history = history_store.load();
        tracing::debug!(
            language = language.code(),
            history = history.len(),
            "session rehydrated"
        );
        Self {
            api,
            store,
            history_store,
            events: None,
            inner: Mutex::new(Inner {
                session: SessionState::default(),
                history,
                language,
                notices: Vec::new(),
            }),
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        events.record("session_started", Map::new());
        self.events = Some(events);
        self
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().session.clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history.clone()
    }

    pub fn language(&self) -> Language {
        self.lock().language
    }

    pub fn set_language(&self, language: Language) {
        self.lock().language = language;
        save_language(self.store.as_ref(), language);
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.lock().session.prompt = prompt.into();
    }

    pub fn set_base_image(&self, image: Option<ImageUri>) {
        self.lock().session.base_image = image;
    }

    pub fn set_aspect_ratio(&self, aspect_ratio: AspectRatio) {
        self.lock().session.aspect_ratio = aspect_ratio;
    }

    pub fn set_style(&self, style: impl Into<String>) {
        self.lock().session.style = style.into();
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.lock().notices)
    }

    pub fn download_file_name(&self) -> String {
        let inner = self.lock();
        download_file_name(
            &inner.session.last_prompt_used,
            inner.session.current_image.as_ref(),
        )
    }

    pub fn generate(&self) -> Dispatch<ImageUri> {
        let started = self.begin(BusyState::Generating, |inner| {
            let session = &mut inner.session;
            if session.prompt.trim().is_empty() {
                return Err(IgnoreReason::EmptyPrompt);
            }
            session.last_error = None;
            session.current_image = None;
            let style = if session.style.trim().is_empty() {
                DEFAULT_STYLE.to_string()
            } else {
                session.style.clone()
            };
            Ok(GenerationRequest {
                prompt: session.prompt.clone(),
                base_image: session.base_image.clone(),
                aspect_ratio: session.aspect_ratio,
                style,
            })
        });
        let (request, _busy) = match started {
            Ok(started) => started,
            Err(reason) => return Dispatch::Ignored(reason),
        };

        let mut started_payload = json!({
            "prompt": request.prompt,
            "mode": if request.base_image.is_some() { "edit" } else { "text" },
        });
        if request.base_image.is_none() {
            started_payload["aspect_ratio"] = json!(request.aspect_ratio.as_str());
            started_payload["style"] = json!(request.style);
        }
        self.emit("generation_started", started_payload);

        let result = self.run_generation(&request);

        let mut inner = self.lock();
        match result {
            Ok(image) => {
                let entry = match &request.base_image {
                    Some(source) => {
                        HistoryEntry::image_edit(&request.prompt, image.clone(), source.clone())
                    }
                    None => HistoryEntry::text_to_image(
                        &request.prompt,
                        image.clone(),
                        request.aspect_ratio,
                        &request.style,
                    ),
                };
                inner.history = self.history_store.append(entry, &inner.history);
                inner.session.current_image = Some(image.clone());
                inner.session.last_prompt_used = request.prompt.clone();
                let history_len = inner.history.len();
                drop(inner);

                let mut payload = image_summary(&image);
                payload.insert("history_len".to_string(), json!(history_len));
                self.emit("generation_finished", Value::Object(payload));
                Dispatch::Done(image)
            }
            Err(err) => {
                inner.session.last_error = Some(ErrorKind::GenerationFailed);
                drop(inner);

                tracing::warn!(error = %err, "image generation failed");
                self.emit("generation_failed", json!({ "error": err.to_string() }));
                Dispatch::Failed(err)
            }
        }
    }

    pub fn upscale(&self) -> Dispatch<ImageUri> {
        let started = self.begin(BusyState::Upscaling, |inner| {
            let session = &mut inner.session;
            let current = session.current_image.clone().ok_or(IgnoreReason::NoImage)?;
            session.last_error = None;
            Ok(current)
        });
        let (previous, _busy) = match started {
            Ok(started) => started,
            Err(reason) => return Dispatch::Ignored(reason),
        };
        self.emit("upscale_started", Value::Object(image_summary(&previous)));

        let result = previous
            .split()
            .map_err(ApiError::from)
            .and_then(|payload| self.api.upscale_image(&payload));

        let mut inner = self.lock();
        match result {
            Ok(upscaled) => {
                inner.session.current_image = Some(upscaled.clone());
                // Value match: entries sharing identical image data are all rewritten.
                inner.history = self.history_store.update_matching(
                    |entry| entry.result_image == previous,
                    |entry| entry.result_image = upscaled.clone(),
                    &inner.history,
                );
                drop(inner);

                self.emit("upscale_finished", Value::Object(image_summary(&upscaled)));
                Dispatch::Done(upscaled)
            }
            Err(err) => {
                inner.session.last_error = Some(ErrorKind::UpscaleFailed);
                drop(inner);

                tracing::warn!(error = %err, "upscale failed");
                self.emit("upscale_failed", json!({ "error": err.to_string() }));
                Dispatch::Failed(err)
            }
        }
    }

    pub fn enhance(&self) -> Dispatch<String> {
        let started = self.begin(BusyState::AssistantBusy, |inner| {
            if inner.session.prompt.trim().is_empty() {
                return Err(IgnoreReason::EmptyPrompt);
            }
            Ok((
                AssistantTask::Enhance {
                    prompt: inner.session.prompt.clone(),
                },
                inner.language,
            ))
        });
        match started {
            Ok(((task, language), _busy)) => {
                self.run_assistant(&task, language, Notice::EnhanceFailed, "prompt_enhanced")
            }
            Err(reason) => Dispatch::Ignored(reason),
        }
    }

    pub fn suggest(&self) -> Dispatch<String> {
        let started = self.begin(BusyState::AssistantBusy, |inner| {
            Ok((AssistantTask::Suggest, inner.language))
        });
        match started {
            Ok(((task, language), _busy)) => {
                self.run_assistant(&task, language, Notice::SuggestFailed, "prompt_suggested")
            }
            Err(reason) => Dispatch::Ignored(reason),
        }
    }

    /// Restores a past generation into the session. No remote call.
    pub fn select_from_history(&self, entry: &HistoryEntry) {
        let mut inner = self.lock();
        let session = &mut inner.session;
        session.prompt = entry.prompt.clone();
        session.base_image = entry.source_image.clone();
        session.aspect_ratio = entry.aspect_ratio.unwrap_or_default();
        session.style = entry
            .style
            .clone()
            .unwrap_or_else(|| DEFAULT_STYLE.to_string());
        session.current_image = Some(entry.result_image.clone());
        session.last_prompt_used = entry.prompt.clone();
        session.last_error = None;
    }

    /// Empties history once `confirm` says yes. Returns whether it cleared.
    pub fn clear_history<F>(&self, confirm: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        if !confirm() {
            return false;
        }
        let removed = {
            let mut inner = self.lock();
            let removed = inner.history.len();
            inner.history.clear();
            self.history_store.clear();
            removed
        };
        self.emit("history_cleared", json!({ "removed": removed }));
        true
    }

    pub fn share(&self, target: Option<&dyn ShareTarget>) -> ShareOutcome {
        let (image, prompt) = {
            let inner = self.lock();
            (
                inner.session.current_image.clone(),
                inner.session.last_prompt_used.clone(),
            )
        };
        let (Some(image), Some(target)) = (image, target) else {
            self.push_notice(Notice::ShareUnsupported);
            return ShareOutcome::Unsupported;
        };

        match target.share(&SharePayload::new(&prompt, image)) {
            Ok(()) => ShareOutcome::Shared,
            Err(ShareError::Cancelled) => ShareOutcome::Cancelled,
            Err(err) => {
                tracing::warn!(error = %err, "share failed");
                self.push_notice(Notice::ShareFailed);
                ShareOutcome::Failed
            }
        }
    }

    fn begin<T, F>(&self, state: BusyState, prepare: F) -> Result<(T, BusyGuard<'_>), IgnoreReason>
    where
        F: FnOnce(&mut Inner) -> Result<T, IgnoreReason>,
    {
        let mut inner = self.lock();
        if inner.session.busy != BusyState::Idle {
            tracing::debug!(busy = ?inner.session.busy, requested = ?state, "dropping request while busy");
            return Err(IgnoreReason::Busy(inner.session.busy));
        }
        let prepared = prepare(&mut *inner)?;
        inner.session.busy = state;
        tracing::debug!(state = ?state, "operation started");
        Ok((prepared, BusyGuard { inner: &self.inner }))
    }

    fn run_generation(&self, request: &GenerationRequest) -> Result<ImageUri, ApiError> {
        match &request.base_image {
            Some(base_image) => {
                let payload = base_image.split()?;
                self.api.generate_from_image(&payload, &request.prompt)
            }
            None => self.api.generate_from_text(
                &request.prompt,
                request.aspect_ratio,
                &request.style,
            ),
        }
    }

    fn run_assistant(
        &self,
        task: &AssistantTask,
        language: Language,
        failure: Notice,
        event_type: &str,
    ) -> Dispatch<String> {
        match self.api.assistant_text(task, language) {
            Ok(text) => {
                let text = text.trim().to_string();
                self.lock().session.prompt = text.clone();
                self.emit(event_type, json!({ "prompt": text, "language": language.code() }));
                Dispatch::Done(text)
            }
            Err(err) => {
                tracing::warn!(task = task.label(), error = %err, "assistant request failed");
                self.push_notice(failure);
                self.emit(
                    "assistant_failed",
                    json!({ "task": task.label(), "error": err.to_string() }),
                );
                Dispatch::Failed(err)
            }
        }
    }

    fn push_notice(&self, notice: Notice) {
        self.lock().notices.push(notice);
    }

    fn emit(&self, event_type: &str, payload: Value) {
        if let Some(events) = &self.events {
            events.record(event_type, map_object(payload));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Event-safe description of an image: never the payload itself.
fn image_summary(image: &ImageUri) -> Map<String, Value> {
    let mut summary = Map::new();
    match image.split() {
        Ok(payload) => {
            summary.insert("mime_type".to_string(), json!(payload.mime_type));
            summary.insert("bytes".to_string(), json!(payload.approx_byte_len()));
        }
        Err(err) => {
            summary.insert("image_error".to_string(), json!(err.to_string()));
        }
    }
    summary
}

fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
