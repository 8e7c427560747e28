//! Per-script orchestration: asset-readiness lifecycle, blocking acquisition
//! wait, model load, token-vector collection, pooling.

use std::sync::mpsc;

use crate::config::Script;
use crate::error::EmbedError;
use crate::pooling::{l2_normalize, mean_pool, TokenVector};

use super::{AcquisitionOutcome, ScriptCapability};

/// Asset-readiness lifecycle for one session. Transitions are
/// one-directional: a single acquisition attempt, no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelReadiness {
    AssetsMissing,
    Acquiring,
    Ready,
    Failed,
}

/// One script's embedding computation, from asset check to normalized vector.
pub struct EmbeddingSession {
    script: Script,
    capability: Box<dyn ScriptCapability>,
    readiness: ModelReadiness,
}

impl EmbeddingSession {
    pub fn new(script: Script, capability: Box<dyn ScriptCapability>) -> Self {
        Self {
            script,
            capability,
            readiness: ModelReadiness::AssetsMissing,
        }
    }

    /// Readiness state; terminal (`Ready` or `Failed`) once `run` returns.
    pub fn readiness(&self) -> ModelReadiness {
        self.readiness
    }

    /// Produce one normalized vector for the input text, or a classified
    /// failure.
    pub fn run(&mut self, text: &str) -> Result<Vec<f64>, EmbedError> {
        self.ensure_assets()?;

        self.capability
            .load()
            .map_err(|e| EmbedError::ModelLoadFailed {
                script: self.script,
                detail: e.to_string(),
            })?;

        let token_vectors: Vec<TokenVector> = self
            .capability
            .compute_token_vectors(text)
            .map_err(|e| EmbedError::EmbeddingComputationFailed {
                script: self.script,
                detail: e.to_string(),
            })?;

        if token_vectors.is_empty() {
            return Err(EmbedError::NoTokensProduced {
                script: self.script,
            });
        }

        Ok(l2_normalize(mean_pool(&token_vectors)))
    }

    /// Block until model assets are locally available, acquiring them through
    /// the collaborator if needed. One attempt, no timeout.
    fn ensure_assets(&mut self) -> Result<(), EmbedError> {
        if self.capability.assets_available() {
            self.readiness = ModelReadiness::Ready;
            return Ok(());
        }

        tracing::info!(
            "Model assets missing for {} script, requesting acquisition",
            self.script
        );
        self.readiness = ModelReadiness::Acquiring;

        // Single-resolution signal: the collaborator's callback fires at most
        // once, and the bounded channel keeps the send non-blocking.
        let (tx, rx) = mpsc::sync_channel::<AcquisitionOutcome>(1);
        self.capability.request_assets(Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }));

        let outcome = match rx.recv() {
            Ok(outcome) => outcome,
            // Collaborator dropped the callback without invoking it.
            Err(_) => AcquisitionOutcome::Error("acquisition callback was never invoked".into()),
        };

        match outcome {
            AcquisitionOutcome::Completed => {}
            AcquisitionOutcome::NotAvailable => {
                self.readiness = ModelReadiness::Failed;
                return Err(
                    self.acquisition_failed("assets not available from the model provider")
                );
            }
            AcquisitionOutcome::Error(detail) => {
                self.readiness = ModelReadiness::Failed;
                return Err(self.acquisition_failed(&detail));
            }
        }

        if !self.capability.assets_available() {
            self.readiness = ModelReadiness::Failed;
            return Err(self.acquisition_failed("assets still unavailable after acquisition"));
        }

        tracing::info!("Model assets ready for {} script", self.script);
        self.readiness = ModelReadiness::Ready;
        Ok(())
    }

    fn acquisition_failed(&self, detail: &str) -> EmbedError {
        EmbedError::AssetAcquisitionFailed {
            script: self.script,
            detail: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::embeddings::AcquisitionCallback;

    const TOL: f64 = 1e-9;

    /// Scriptable stand-in for the platform embedding engine.
    struct FakeCapability {
        available: Arc<Mutex<bool>>,
        available_after_acquire: bool,
        outcome: Mutex<Option<AcquisitionOutcome>>,
        invoke_callback: bool,
        acquisitions: Arc<AtomicUsize>,
        load_error: Option<String>,
        compute: Result<Vec<TokenVector>, String>,
    }

    impl FakeCapability {
        fn ready(token_vectors: Vec<TokenVector>) -> Self {
            Self {
                available: Arc::new(Mutex::new(true)),
                available_after_acquire: true,
                outcome: Mutex::new(Some(AcquisitionOutcome::Completed)),
                invoke_callback: true,
                acquisitions: Arc::new(AtomicUsize::new(0)),
                load_error: None,
                compute: Ok(token_vectors),
            }
        }

        fn missing_assets(outcome: AcquisitionOutcome, available_after: bool) -> Self {
            let mut fake = Self::ready(vec![vec![1.0, 0.0]]);
            fake.available = Arc::new(Mutex::new(false));
            fake.available_after_acquire = available_after;
            fake.outcome = Mutex::new(Some(outcome));
            fake
        }
    }

    impl ScriptCapability for FakeCapability {
        fn assets_available(&self) -> bool {
            *self.available.lock()
        }

        fn request_assets(&self, on_complete: AcquisitionCallback) {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            if !self.invoke_callback {
                // Drops the callback without invoking it.
                return;
            }
            let outcome = self.outcome.lock().take().expect("at most one acquisition");
            if outcome == AcquisitionOutcome::Completed {
                *self.available.lock() = self.available_after_acquire;
            }
            // Deliver from another thread, like the real async downloader.
            std::thread::spawn(move || on_complete(outcome));
        }

        fn load(&self) -> anyhow::Result<()> {
            match &self.load_error {
                Some(msg) => Err(anyhow::anyhow!("{}", msg)),
                None => Ok(()),
            }
        }

        fn compute_token_vectors(&self, _text: &str) -> anyhow::Result<Vec<TokenVector>> {
            self.compute
                .clone()
                .map_err(|msg| anyhow::anyhow!("{}", msg))
        }
    }

    fn session_for(fake: FakeCapability) -> EmbeddingSession {
        EmbeddingSession::new(Script::Latin, Box::new(fake))
    }

    #[test]
    fn test_run_pools_and_normalizes() {
        let fake = FakeCapability::ready(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let mut session = session_for(fake);
        let vector = session.run("hello world").unwrap();
        assert!((vector[0] - 0.707_106_781_186).abs() < 1e-6);
        assert!((vector[1] - 0.707_106_781_186).abs() < 1e-6);
        assert_eq!(session.readiness(), ModelReadiness::Ready);
    }

    #[test]
    fn test_available_assets_skip_acquisition() {
        let fake = FakeCapability::ready(vec![vec![2.0, 0.0]]);
        let acquisitions = fake.acquisitions.clone();
        let mut session = session_for(fake);
        let vector = session.run("text").unwrap();
        assert_eq!(acquisitions.load(Ordering::SeqCst), 0);
        assert!((vector[0] - 1.0).abs() < TOL);
        assert!(vector[1].abs() < TOL);
    }

    #[test]
    fn test_missing_assets_acquired_once() {
        let fake = FakeCapability::missing_assets(AcquisitionOutcome::Completed, true);
        let acquisitions = fake.acquisitions.clone();
        let mut session = session_for(fake);
        assert!(session.run("text").is_ok());
        assert_eq!(acquisitions.load(Ordering::SeqCst), 1);
        assert_eq!(session.readiness(), ModelReadiness::Ready);
    }

    #[test]
    fn test_acquisition_error_carries_detail() {
        let fake =
            FakeCapability::missing_assets(AcquisitionOutcome::Error("disk full".into()), false);
        let mut session = session_for(fake);
        match session.run("text") {
            Err(EmbedError::AssetAcquisitionFailed { detail, .. }) => {
                assert!(detail.contains("disk full"));
            }
            other => panic!("expected AssetAcquisitionFailed, got {:?}", other),
        }
        assert_eq!(session.readiness(), ModelReadiness::Failed);
    }

    #[test]
    fn test_acquisition_not_available() {
        let fake = FakeCapability::missing_assets(AcquisitionOutcome::NotAvailable, false);
        let mut session = session_for(fake);
        assert!(matches!(
            session.run("text"),
            Err(EmbedError::AssetAcquisitionFailed { .. })
        ));
        assert_eq!(session.readiness(), ModelReadiness::Failed);
    }

    #[test]
    fn test_post_check_still_unavailable() {
        let fake = FakeCapability::missing_assets(AcquisitionOutcome::Completed, false);
        let mut session = session_for(fake);
        match session.run("text") {
            Err(EmbedError::AssetAcquisitionFailed { detail, .. }) => {
                assert!(detail.contains("still unavailable"));
            }
            other => panic!("expected AssetAcquisitionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_dropped_callback_is_acquisition_failure() {
        let mut fake = FakeCapability::missing_assets(AcquisitionOutcome::Completed, true);
        fake.invoke_callback = false;
        let mut session = session_for(fake);
        match session.run("text") {
            Err(EmbedError::AssetAcquisitionFailed { detail, .. }) => {
                assert!(detail.contains("never invoked"));
            }
            other => panic!("expected AssetAcquisitionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_load_failure() {
        let mut fake = FakeCapability::ready(vec![vec![1.0]]);
        fake.load_error = Some("bad graph".into());
        let mut session = session_for(fake);
        match session.run("text") {
            Err(EmbedError::ModelLoadFailed { detail, .. }) => {
                assert!(detail.contains("bad graph"));
            }
            other => panic!("expected ModelLoadFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_compute_failure() {
        let mut fake = FakeCapability::ready(vec![]);
        fake.compute = Err("inference blew up".into());
        let mut session = session_for(fake);
        match session.run("text") {
            Err(EmbedError::EmbeddingComputationFailed { detail, .. }) => {
                assert!(detail.contains("inference blew up"));
            }
            other => panic!("expected EmbeddingComputationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_token_vectors_fail() {
        let fake = FakeCapability::ready(vec![]);
        let mut session = session_for(fake);
        assert!(matches!(
            session.run("text"),
            Err(EmbedError::NoTokensProduced { .. })
        ));
    }
}
