use std::time::Duration;

/// Failures that can occur inside the enrichment pipeline.
///
/// Every variant is caught at the boundary of its own sub-operation and
/// degrades to "key absent" in the merged record — none of them abort the
/// invocation or cancel sibling extractors.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// The stored file could not be located through any candidate path.
    /// The whole enrichment is skipped, not surfaced as an error.
    #[error("stored file could not be located on disk")]
    FileNotFound,

    /// A single extractor failed; its key is omitted from the merge.
    #[error("{stage} extraction failed: {message}")]
    Extractor {
        stage: &'static str,
        message: String,
    },

    /// An extractor exceeded its deadline. Treated like any extractor failure.
    #[error("{stage} extraction timed out after {limit:?}")]
    Timeout {
        stage: &'static str,
        limit: Duration,
    },

    /// The routed geocoding provider has no credential configured.
    /// A configuration problem — never retried.
    #[error("missing credential for {provider} geocoding provider")]
    MissingCredential { provider: &'static str },

    /// All geocoding attempts failed; carries the last provider error.
    #[error("reverse geocoding failed after {attempts} attempt(s): {last_error}")]
    GeocodingExhausted { attempts: u32, last_error: String },

    /// The final metadata write failed. The in-memory record is lost for
    /// this invocation; retry policy belongs to the sink.
    #[error("metadata persistence failed: {0}")]
    Persistence(String),
}

impl EnrichError {
    /// Wrap an arbitrary error as an extractor failure for the given stage.
    pub fn extractor(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Extractor {
            stage,
            message: err.to_string(),
        }
    }
}
