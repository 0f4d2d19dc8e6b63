use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SearchResult;
use crate::image::EncodedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Analyzing,
    Complete,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Analyzing => "analyzing",
            Phase::Complete => "complete",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("an image can only be selected from idle (current phase: {0})")]
    ImageSelectionUnavailable(Phase),
    #[error("no analysis is in flight (current phase: {0})")]
    NotAnalyzing(Phase),
}

/// Snapshot of everything the front-end renders.
///
/// Transitions take `&self` and return a new snapshot; a snapshot is never
/// changed after it is built. `result` and `error_message` are never both set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalysisState {
    phase: Phase,
    image: Option<Arc<EncodedImage>>,
    result: Option<Arc<SearchResult>>,
    error_message: Option<String>,
}

impl AnalysisState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn image(&self) -> Option<&Arc<EncodedImage>> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&Arc<SearchResult>> {
        self.result.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn select_image(&self, image: Arc<EncodedImage>) -> Result<Self, TransitionError> {
        if self.phase != Phase::Idle {
            return Err(TransitionError::ImageSelectionUnavailable(self.phase));
        }
        Ok(Self {
            phase: Phase::Analyzing,
            image: Some(image),
            result: None,
            error_message: None,
        })
    }

    pub fn complete(&self, result: SearchResult) -> Result<Self, TransitionError> {
        self.require_analyzing()?;
        Ok(Self {
            phase: Phase::Complete,
            image: self.image.clone(),
            result: Some(Arc::new(result)),
            error_message: None,
        })
    }

    pub fn fail(&self, message: impl Into<String>) -> Result<Self, TransitionError> {
        self.require_analyzing()?;
        Ok(Self {
            phase: Phase::Error,
            image: self.image.clone(),
            result: None,
            error_message: Some(message.into()),
        })
    }

    pub fn reset(&self) -> Self {
        Self::idle()
    }

    fn require_analyzing(&self) -> Result<(), TransitionError> {
        if self.phase != Phase::Analyzing {
            return Err(TransitionError::NotAnalyzing(self.phase));
        }
        Ok(())
    }
}
