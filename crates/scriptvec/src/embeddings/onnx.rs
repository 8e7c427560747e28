//! ONNX-backed embedding capability, one instance per script.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;

use crate::config::{EmbedConfig, Script, ScriptModelSpec};
use crate::pooling::TokenVector;

use super::download::{missing_files, AssetDownloader};
use super::tokenizer::TextTokenizer;
use super::{AcquisitionCallback, ScriptCapability};

struct LoadedModel {
    session: Session,
    tokenizer: TextTokenizer,
}

pub struct OnnxCapability {
    script: Script,
    spec: &'static ScriptModelSpec,
    model_dir: PathBuf,
    downloader: AssetDownloader,
    loaded: Mutex<Option<LoadedModel>>,
}

impl OnnxCapability {
    pub fn new(
        script: Script,
        spec: &'static ScriptModelSpec,
        config: &EmbedConfig,
    ) -> Result<Self> {
        let downloader = AssetDownloader::new()?;
        Ok(Self {
            script,
            spec,
            model_dir: config.script_model_dir(spec),
            downloader,
            loaded: Mutex::new(None),
        })
    }
}

impl ScriptCapability for OnnxCapability {
    fn assets_available(&self) -> bool {
        missing_files(&self.model_dir, self.spec).is_empty()
    }

    fn request_assets(&self, on_complete: AcquisitionCallback) {
        self.downloader
            .request(self.spec, self.model_dir.clone(), on_complete);
    }

    fn load(&self) -> Result<()> {
        let mut loaded = self.loaded.lock();
        if loaded.is_some() {
            return Ok(());
        }

        ort::init().with_name("scriptvec").commit();

        let graph_path = self.model_dir.join(self.spec.graph_file().local_name);
        let model_bytes = std::fs::read(&graph_path)
            .map_err(|e| anyhow!("Failed to read model {}: {}", graph_path.display(), e))?;

        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        // Model is loaded from memory (commit_from_memory), so no CWD change needed.
        let session = Session::builder()
            .map_err(|e| anyhow!("Session builder: {:?}", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("Optimization level: {:?}", e))?
            .with_intra_threads(num_threads)
            .map_err(|e| anyhow!("Intra threads: {:?}", e))?
            .with_inter_threads(1)
            .map_err(|e| anyhow!("Inter threads: {:?}", e))?
            .with_memory_pattern(true)
            .map_err(|e| anyhow!("Memory pattern: {:?}", e))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| anyhow!("Failed to load model: {:?}", e))?;

        let tokenizer = TextTokenizer::from_model_dir(&self.model_dir, self.spec.max_seq_len)?;

        tracing::info!(
            "Loaded {} embedding model ({})",
            self.script,
            self.spec.repo
        );
        *loaded = Some(LoadedModel { session, tokenizer });
        Ok(())
    }

    fn compute_token_vectors(&self, text: &str) -> Result<Vec<TokenVector>> {
        let mut loaded = self.loaded.lock();
        let model = loaded.as_mut().ok_or_else(|| anyhow!("model not loaded"))?;

        let token_ids = model.tokenizer.encode(text)?;
        let (ids_vec, mask_vec) = model.tokenizer.prepare_for_model(&token_ids);
        let seq_len = ids_vec.len();
        if seq_len == 0 {
            return Ok(Vec::new());
        }

        let shape = vec![1, seq_len];
        let input_ids = Value::from_array((shape.clone(), ids_vec))
            .map_err(|e| anyhow!("input_ids tensor: {:?}", e))?;
        let attention_mask = Value::from_array((shape, mask_vec.clone()))
            .map_err(|e| anyhow!("attention_mask tensor: {:?}", e))?;

        let inputs = ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
        ];

        let outputs = model
            .session
            .run(inputs)
            .map_err(|e| anyhow!("Inference failed: {:?}", e))?;

        let output_name = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state" || *name == "token_embeddings")
            .map(|(name, _)| name.to_string())
            .ok_or_else(|| anyhow!("model has no per-token output"))?;

        let (out_shape, data) = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("Failed to extract output '{}': {:?}", output_name, e))?;

        let out_seq = out_shape[1] as usize;
        let hidden_dim = out_shape[2] as usize;
        if hidden_dim != self.spec.dimension {
            tracing::warn!(
                "Model produced {}d vectors instead of the cataloged {}d",
                hidden_dim,
                self.spec.dimension
            );
        }

        // One vector per attended position, in token order. Pooling happens
        // in the session, not here.
        let mut token_vectors = Vec::with_capacity(out_seq);
        for pos in 0..out_seq {
            if pos >= mask_vec.len() || mask_vec[pos] == 0 {
                continue;
            }
            let offset = pos * hidden_dim;
            let row = &data[offset..offset + hidden_dim];
            token_vectors.push(row.iter().map(|&x| x as f64).collect());
        }

        Ok(token_vectors)
    }
}
