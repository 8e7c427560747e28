//! Failure taxonomy for the embedding pipeline.
//!
//! Every kind is fatal to the invocation: the message reaches stderr and the
//! process exits 1. The collaborator-reported detail is carried where one
//! exists.

use crate::config::Script;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    /// No embedding capability can be constructed for the script.
    #[error("embedding model unavailable for {script} script")]
    ModelUnavailable { script: Script },

    /// Asset download reported failure, or assets remained unavailable after
    /// the acquisition attempt.
    #[error("asset acquisition failed for {script} script: {detail}")]
    AssetAcquisitionFailed { script: Script, detail: String },

    /// Model failed to initialize after its assets were confirmed present.
    #[error("model load failed for {script} script: {detail}")]
    ModelLoadFailed { script: Script, detail: String },

    /// The model raised an error while producing token vectors.
    #[error("embedding computation failed for {script} script: {detail}")]
    EmbeddingComputationFailed { script: Script, detail: String },

    /// The model returned zero token vectors for the input.
    #[error("no token vectors produced for {script} script input")]
    NoTokensProduced { script: Script },
}
