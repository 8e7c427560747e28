//! Script-specific contextual embedding: the engine capability seam, the
//! per-script session protocol, and the ONNX-backed implementation.

pub mod download;
pub mod onnx;
pub mod session;
pub mod tokenizer;

use crate::config::{self, EmbedConfig, Script};
use crate::error::EmbedError;
use crate::pooling::TokenVector;

pub use session::{EmbeddingSession, ModelReadiness};

/// Completion result reported by the asset-acquisition collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// All assets are present locally.
    Completed,
    /// The provider does not serve assets for this model.
    NotAvailable,
    /// The acquisition attempt failed.
    Error(String),
}

/// One-shot completion callback; invoked exactly once per request.
pub type AcquisitionCallback = Box<dyn FnOnce(AcquisitionOutcome) + Send + 'static>;

/// An embedding engine for one script, injected into the session so the
/// orchestration can be exercised against a fake in tests.
pub trait ScriptCapability: Send {
    /// Whether the model assets are already present locally.
    fn assets_available(&self) -> bool;

    /// Start asynchronous asset acquisition. `on_complete` is called exactly
    /// once, possibly from another thread.
    fn request_assets(&self, on_complete: AcquisitionCallback);

    /// Bring the model into memory. Assets must be available.
    fn load(&self) -> anyhow::Result<()>;

    /// Per-token vectors for the full text, in token order. Language
    /// detection is the model's concern, not the caller's.
    fn compute_token_vectors(&self, text: &str) -> anyhow::Result<Vec<TokenVector>>;
}

/// Construct the embedding capability for a script, or `None` when the
/// script is not supported by this build.
pub fn capability_for(script: Script, config: &EmbedConfig) -> Option<Box<dyn ScriptCapability>> {
    let spec = config::spec_for(script)?;
    match onnx::OnnxCapability::new(script, spec, config) {
        Ok(capability) => Some(Box::new(capability)),
        Err(e) => {
            tracing::warn!("No embedding capability for {} script: {}", script, e);
            None
        }
    }
}

/// Run the full pipeline for one script: capability construction, asset
/// readiness, model load, token vectors, pooling, normalization.
pub fn embed_text(
    config: &EmbedConfig,
    script: Script,
    text: &str,
) -> Result<Vec<f64>, EmbedError> {
    let capability =
        capability_for(script, config).ok_or(EmbedError::ModelUnavailable { script })?;
    let mut session = EmbeddingSession::new(script, capability);
    session.run(text)
}
