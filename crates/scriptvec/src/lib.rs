//! Convert a text string into one L2-normalized embedding vector per writing
//! system (Latin, then Simplified Chinese), downloading and loading the
//! per-script ONNX model on first use.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod pooling;

// Re-export primary types for convenience
pub use config::{EmbedConfig, Script};
pub use embeddings::{capability_for, embed_text, EmbeddingSession, ScriptCapability};
pub use error::EmbedError;
pub use pooling::{format_vector, l2_normalize, mean_pool, TokenVector};
