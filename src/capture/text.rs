use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::adapter::{CaptureAdapter, CaptureError};
use super::artifact::{Artifact, CaptureKind};

#[derive(Debug, Default)]
struct TextState {
    text: String,
    open: bool,
}

/// Handle the UI writes the response into
///
/// Writes are accepted only while the paired `TextCapture` is acquired.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    state: Arc<Mutex<TextState>>,
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TextState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the whole response; returns false if input is closed
    pub fn set(&self, text: impl Into<String>) -> bool {
        let mut state = self.lock();
        if !state.open {
            return false;
        }
        state.text = text.into();
        true
    }

    /// Append to the response; returns false if input is closed
    pub fn append(&self, text: &str) -> bool {
        let mut state = self.lock();
        if !state.open {
            return false;
        }
        state.text.push_str(text);
        true
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Current (untrimmed) contents
    pub fn contents(&self) -> String {
        self.lock().text.clone()
    }

    pub fn word_count(&self) -> usize {
        self.lock().text.split_whitespace().count()
    }
}

/// Typed-response capture for writing tasks
pub struct TextCapture {
    input: TextInput,
    captured: Option<String>,
}

impl TextCapture {
    /// Create the adapter and the input handle the UI writes into
    pub fn new() -> (Self, TextInput) {
        let input = TextInput::new();
        (
            Self {
                input: input.clone(),
                captured: None,
            },
            input,
        )
    }
}

#[async_trait::async_trait]
impl CaptureAdapter for TextCapture {
    async fn acquire(&mut self) -> Result<(), CaptureError> {
        {
            let mut state = self.input.lock();
            state.text.clear();
            state.open = true;
        }
        self.captured = None;
        info!("Text input opened");
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.input.lock();
        state.open = false;
        self.captured = Some(state.text.trim().to_string());
        debug!("Text input closed ({} chars)", state.text.len());
    }

    async fn finalize(&mut self) -> Result<Artifact, CaptureError> {
        self.captured
            .take()
            .map(Artifact::Text)
            .ok_or(CaptureError::NotCaptured)
    }

    fn kind(&self) -> CaptureKind {
        CaptureKind::Writing
    }

    fn name(&self) -> &str {
        "text"
    }
}
