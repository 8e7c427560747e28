use std::path::Path;

use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

/// Thin wrapper over the HuggingFace tokenizer shipped next to each model.
pub struct TextTokenizer {
    inner: Tokenizer,
    max_seq_len: usize,
}

impl TextTokenizer {
    pub fn from_model_dir(model_dir: &Path, max_seq_len: usize) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        let inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load {}: {}", tokenizer_path.display(), e))?;
        Ok(Self { inner, max_seq_len })
    }

    /// Token ids for the text, with special tokens, truncated to the model's
    /// sequence limit.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = encoding.get_ids().to_vec();
        if ids.len() > self.max_seq_len {
            ids.truncate(self.max_seq_len);
        }
        Ok(ids)
    }

    /// Model inputs for a single unpadded sequence.
    pub fn prepare_for_model(&self, token_ids: &[u32]) -> (Vec<i64>, Vec<i64>) {
        let ids: Vec<i64> = token_ids.iter().map(|&id| id as i64).collect();
        let mask = vec![1i64; ids.len()];
        (ids, mask)
    }
}
