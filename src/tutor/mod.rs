pub mod conversation;
pub mod model;
pub mod prompt_builder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{TutorConfig, DEFAULT_TIMEOUT_SECS};
use crate::error::{Result, TutorError};
use conversation::{ConversationStore, Turn};
use model::{InvokeOptions, ModelClient};
use prompt_builder::PromptBuilder;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingModel,
}

/// One tutoring conversation: owns the turn log and serializes every
/// `ask`/`reset` against it.
pub struct TutorSession {
    store: Mutex<ConversationStore>,
    client: Arc<dyn ModelClient>,
    builder: PromptBuilder,
    options: InvokeOptions,
    timeout: Duration,
    in_flight: AtomicBool,
}

impl TutorSession {
    pub fn new(client: Arc<dyn ModelClient>, builder: PromptBuilder, options: InvokeOptions) -> Self {
        Self {
            store: Mutex::new(ConversationStore::new()),
            client,
            builder,
            options,
            timeout: DEFAULT_MODEL_TIMEOUT,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &TutorConfig, client: Arc<dyn ModelClient>) -> Self {
        let builder = PromptBuilder::new(config.domain_instruction.clone())
            .with_window(config.history_window);
        Self::new(client, builder, config.invoke_options()).with_timeout(config.timeout)
    }

    /// Send one user utterance and return the tutor's reply.
    ///
    /// The prompt is rendered from the history *before* the utterance is
    /// recorded, so the utterance appears once, as the trailing `User:`
    /// line. The user turn is then stored whether or not the model call
    /// succeeds; the assistant turn is stored only on success.
    pub async fn ask(&self, user_text: &str) -> Result<String> {
        let mut store = self.store.lock().await;
        let _busy = InFlight::enter(&self.in_flight);

        let prompt = self.builder.build(store.snapshot(), user_text);
        store.append(Turn::user(user_text));

        info!(turns = store.len(), model = %self.options.model, "Asking tutor");
        debug!(prompt_chars = prompt.len(), "Rendered prompt");

        let outcome = tokio::time::timeout(self.timeout, self.client.invoke(&prompt, &self.options)).await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(error = %err, "Model call failed");
                return Err(err);
            }
            Err(_) => {
                let err = TutorError::transport(format!("model call timed out after {:?}", self.timeout));
                warn!(error = %err, "Model call failed");
                return Err(err);
            }
        };

        store.append(Turn::assistant(response.text.clone()));
        debug!(turns = store.len(), "Recorded tutor reply");
        Ok(response.text)
    }

    pub async fn reset(&self) {
        let mut store = self.store.lock().await;
        let dropped = store.len();
        store.clear();
        info!(dropped, "Conversation reset");
    }

    /// Copy of the full turn log, oldest first.
    pub async fn transcript(&self) -> Vec<Turn> {
        self.store.lock().await.snapshot().to_vec()
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.load(Ordering::Acquire) {
            SessionState::AwaitingModel
        } else {
            SessionState::Idle
        }
    }
}

/// Marks the session busy; clears the flag on drop so a cancelled `ask`
/// still returns the session to idle.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
