use piece_contracts::analysis::SearchResult;
use piece_contracts::image::EncodedImage;
use thiserror::Error;

pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze the image. Please try again.";

/// The only failure an [`AnalysisClient`] reports to its caller.
///
/// Diagnostic detail is logged where the failure happens and is not carried
/// here; the message is always [`ANALYSIS_FAILED_MESSAGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("Failed to analyze the image. Please try again.")]
pub struct AnalysisError;

impl AnalysisError {
    pub fn message(&self) -> &'static str {
        ANALYSIS_FAILED_MESSAGE
    }
}

/// Turns one encoded image into one search result.
///
/// Implementations issue exactly one remote call per `analyze` and never retry.
pub trait AnalysisClient: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, image: &EncodedImage) -> Result<SearchResult, AnalysisError>;
}
