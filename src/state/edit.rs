//! In-memory editing timeline for one open photo
//!
//! The session keeps every step of the current edit: the original
//! photo first, then each AI edit in the order it was applied. It is
//! never persisted and is thrown away when the editing view closes.

use chrono::Utc;

use super::data::{EditIteration, ORIGINAL_ITERATION_ID, ORIGINAL_PROMPT};

/// Errors for operations that need an active session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session has not been seeded with an original photo yet
    #[error("edit session has not been started")]
    NotStarted,

    #[error("iteration index {index} is out of range (timeline has {len} iterations)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Active,
}

/// Ordered timeline of edit iterations
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    iterations: Vec<EditIteration>,
    /// Sequence number handed to the next appended iteration
    next_sequence: u64,
    /// Index of the iteration currently shown as "edited"
    current: usize,
}

impl EditSession {
    /// Create an uninitialized session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        if self.iterations.is_empty() {
            SessionState::Uninitialized
        } else {
            SessionState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Seed the timeline with the unedited original.
    ///
    /// Does nothing if the session is already active, so the original
    /// is inserted exactly once.
    pub fn start(&mut self, original_image: impl Into<String>) {
        if self.is_active() {
            tracing::debug!("edit session already started, ignoring second seed");
            return;
        }

        self.iterations.push(EditIteration {
            id: ORIGINAL_ITERATION_ID.to_string(),
            image: original_image.into(),
            prompt: ORIGINAL_PROMPT.to_string(),
            timestamp: Utc::now(),
            analysis: None,
            sequence: 0,
        });
        self.next_sequence = 1;
        self.current = 0;
    }

    /// Append a new iteration at the end of the timeline
    pub fn append(
        &mut self,
        image: impl Into<String>,
        prompt: impl Into<String>,
        analysis: Option<String>,
    ) -> Result<&EditIteration, SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotStarted);
        }

        let sequence = self.next_sequence;
        debug_assert!(
            self.iterations
                .last()
                .map_or(true, |last| last.sequence < sequence),
            "iteration sequence must increase monotonically"
        );
        self.next_sequence += 1;

        self.iterations.push(EditIteration {
            id: format!("edit-{}", sequence),
            image: image.into(),
            prompt: prompt.into(),
            timestamp: Utc::now(),
            analysis,
            sequence,
        });

        let index = self.iterations.len() - 1;
        Ok(&self.iterations[index])
    }

    /// Select the iteration at `index` as the one to display.
    ///
    /// The timeline itself is left untouched; index 0 is the original.
    pub fn select_iteration(&mut self, index: usize) -> Result<&EditIteration, SessionError> {
        let len = self.check_index(index)?;
        debug_assert!(index < len);
        self.current = index;
        Ok(&self.iterations[index])
    }

    /// Read-only view of the timeline in insertion order
    pub fn snapshot(&self) -> &[EditIteration] {
        &self.iterations
    }

    /// The currently selected iteration
    pub fn current(&self) -> Result<&EditIteration, SessionError> {
        self.iterations
            .get(self.current)
            .ok_or(SessionError::NotStarted)
    }

    /// Index of the currently selected iteration
    pub fn current_index(&self) -> Option<usize> {
        self.is_active().then_some(self.current)
    }

    /// The unedited original
    pub fn original(&self) -> Result<&EditIteration, SessionError> {
        self.iterations.first().ok_or(SessionError::NotStarted)
    }

    /// The most recently appended iteration
    pub fn latest(&self) -> Result<&EditIteration, SessionError> {
        self.iterations.last().ok_or(SessionError::NotStarted)
    }

    /// Move the selection one step back (stays on the original)
    pub fn step_back(&mut self) -> Result<&EditIteration, SessionError> {
        let index = self.current_index().ok_or(SessionError::NotStarted)?;
        self.select_iteration(index.saturating_sub(1))
    }

    /// Move the selection one step forward (stays on the latest)
    pub fn step_forward(&mut self) -> Result<&EditIteration, SessionError> {
        let index = self.current_index().ok_or(SessionError::NotStarted)?;
        let last = self.iterations.len() - 1;
        self.select_iteration((index + 1).min(last))
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// End the session, dropping the whole timeline
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn check_index(&self, index: usize) -> Result<usize, SessionError> {
        let len = self.iterations.len();
        if len == 0 {
            return Err(SessionError::NotStarted);
        }
        if index >= len {
            return Err(SessionError::IndexOutOfRange { index, len });
        }
        Ok(len)
    }
}
