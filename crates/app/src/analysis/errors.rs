//! Vision client errors.

use agrimarket::analysis::AnalysisParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("vision API key is not configured")]
    MissingApiKey,

    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint returned a non-2xx response or a body without a reply.
    #[error("unexpected response from vision API: {0}")]
    UnexpectedResponse(String),

    #[error("no JSON found in model reply")]
    MissingJson,

    #[error("model reply is not valid JSON")]
    Parse(#[source] serde_json::Error),
}

impl From<AnalysisParseError> for VisionError {
    fn from(error: AnalysisParseError) -> Self {
        match error {
            AnalysisParseError::MissingJson => Self::MissingJson,
            AnalysisParseError::Json(source) => Self::Parse(source),
        }
    }
}
