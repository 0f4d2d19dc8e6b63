mod result;
mod state;

pub use result::{Citation, SearchResult, NO_DESCRIPTION_PLACEHOLDER};
pub use state::{AnalysisState, Phase, TransitionError};
