use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const HF_BASE: &str = "https://huggingface.co";

/// Writing systems with a dedicated embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Script {
    Latin,
    SimplifiedChinese,
}

impl Script {
    /// Output order: one stdout line per script, in this order.
    pub const PIPELINE_ORDER: [Script; 2] = [Script::Latin, Script::SimplifiedChinese];
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Script::Latin => write!(f, "Latin"),
            Script::SimplifiedChinese => write!(f, "Simplified Chinese"),
        }
    }
}

/// Model file descriptor: remote path, local filename, and the size floor
/// under which a file is treated as a truncated download.
pub struct ModelFile {
    pub url_path: &'static str,
    pub local_name: &'static str,
    pub min_bytes: u64,
}

impl ModelFile {
    pub fn url(&self, repo: &str) -> String {
        format!("{}/{}/resolve/main/{}", HF_BASE, repo, self.url_path)
    }
}

/// Per-script embedding model descriptor.
pub struct ScriptModelSpec {
    pub repo: &'static str,
    pub dir: &'static str,
    pub dimension: usize,
    pub max_seq_len: usize,
    pub files: &'static [ModelFile],
}

impl ScriptModelSpec {
    /// The ONNX graph entry of the manifest.
    pub fn graph_file(&self) -> &ModelFile {
        self.files
            .iter()
            .find(|f| f.local_name.ends_with(".onnx"))
            .expect("manifest includes a graph file")
    }
}

const LATIN_FILES: &[ModelFile] = &[
    ModelFile {
        url_path: "onnx/model.onnx",
        local_name: "model.onnx",
        min_bytes: 100_000_000, // ~440 MB
    },
    ModelFile {
        url_path: "tokenizer.json",
        local_name: "tokenizer.json",
        min_bytes: 100_000, // ~700 KB
    },
];

static LATIN_MODEL: ScriptModelSpec = ScriptModelSpec {
    repo: "intfloat/e5-base-v2",
    dir: "e5-base-v2",
    dimension: 768,
    max_seq_len: 512,
    files: LATIN_FILES,
};

const SIMPLIFIED_CHINESE_FILES: &[ModelFile] = &[
    ModelFile {
        url_path: "onnx/model.onnx",
        local_name: "model.onnx",
        min_bytes: 100_000_000, // ~390 MB
    },
    ModelFile {
        url_path: "tokenizer.json",
        local_name: "tokenizer.json",
        min_bytes: 10_000,
    },
];

static SIMPLIFIED_CHINESE_MODEL: ScriptModelSpec = ScriptModelSpec {
    repo: "shibing624/text2vec-base-chinese",
    dir: "text2vec-base-chinese",
    dimension: 768,
    max_seq_len: 512,
    files: SIMPLIFIED_CHINESE_FILES,
};

/// Look up the model descriptor for a script. `None` means the script has no
/// model on this build, so no embedding capability can be constructed.
pub fn spec_for(script: Script) -> Option<&'static ScriptModelSpec> {
    match script {
        Script::Latin => Some(&LATIN_MODEL),
        Script::SimplifiedChinese => Some(&SIMPLIFIED_CHINESE_MODEL),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    pub model_dir: PathBuf,
}

impl EmbedConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.model_dir.as_os_str().is_empty() {
            return Err("model_dir must not be empty".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Directory holding one script's model assets.
    pub fn script_model_dir(&self, spec: &ScriptModelSpec) -> PathBuf {
        self.model_dir.join(spec.dir)
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        let model_dir = if Path::new("models").exists() {
            PathBuf::from("models")
        } else if let Ok(env_path) = std::env::var("SCRIPTVEC_MODEL_DIR") {
            PathBuf::from(env_path)
        } else {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("scriptvec")
                .join("models")
        };

        Self { model_dir }
    }
}
