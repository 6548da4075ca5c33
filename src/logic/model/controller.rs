//! Model Controller
//!
//! Refresh: download -> compile -> swap handle -> remove local artifact.
//! Predict: one forward pass (feedforward) or a strict left-to-right scan over
//! timesteps carrying hidden/cell state between passes (sequential).
//!
//! # Failure Strategy
//! - Validation runs before the runtime is touched.
//! - A failed refresh never replaces or drops a working handle.
//! - A failed timestep aborts the whole prediction, nothing partial escapes.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ndarray::{ArrayD, IxDyn};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::binding::{FeedforwardBinding, ModelKind, SequentialBinding};
use super::runtime::{ForwardOptions, ModelRuntime, NamedTensors, RuntimeError, Tensor};
use super::ModelError;
use crate::logic::config::SdkConfig;
use crate::logic::transfer::{guarded, CancelToken, TransferClient};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Caller data for one prediction
#[derive(Debug, Clone, Copy)]
pub enum ModelInput<'a> {
    /// One vector per feature channel, all of length T
    Sequence(&'a [Vec<f32>]),
    /// One value per feature
    Flat(&'a [f32]),
}

/// Outcome of a successful refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub remote_name: String,
    pub refreshed_at: DateTime<Utc>,
    /// Set when the local artifact could not be removed afterwards
    pub cleanup_error: Option<String>,
}

/// Controller status for UI / diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub compiled: bool,
    pub kind: String,
    pub num_features: usize,
    pub feature_names: Vec<String>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_refresh_error: Option<String>,
    pub forward_passes: u64,
    pub avg_forward_ms: f32,
}

#[derive(Debug, Default)]
struct RefreshState {
    last_refreshed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Recurrent state carried between timesteps of one call
#[derive(Default)]
struct InferenceState {
    hidden: Option<Tensor>,
    cell: Option<Tensor>,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct ModelController<R: ModelRuntime> {
    kind: RwLock<ModelKind>,
    num_features: usize,
    runtime: Arc<R>,
    transfer: Arc<dyn TransferClient>,
    artifact_path: PathBuf,
    handle: RwLock<Option<Arc<R::Model>>>,
    refresh_state: RwLock<RefreshState>,
    refresh_lock: tokio::sync::Mutex<()>,
    options: ForwardOptions,
    timeout: Duration,
    cancel: CancelToken,
    forward_passes: AtomicU64,
    forward_time_us: AtomicU64,
}

impl<R: ModelRuntime> ModelController<R> {
    pub fn new(
        kind: ModelKind,
        num_features: usize,
        runtime: Arc<R>,
        transfer: Arc<dyn TransferClient>,
        config: &SdkConfig,
    ) -> Result<Self, ModelError> {
        if num_features == 0 {
            return Err(ModelError::InvalidInput("num_features must be positive".to_string()));
        }

        Ok(Self {
            kind: RwLock::new(kind),
            num_features,
            runtime,
            transfer,
            artifact_path: config.model_artifact_path(),
            handle: RwLock::new(None),
            refresh_state: RwLock::new(RefreshState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            options: ForwardOptions {
                use_accelerator: config.use_accelerator,
            },
            timeout: config.timeout(),
            cancel: CancelToken::new(),
            forward_passes: AtomicU64::new(0),
            forward_time_us: AtomicU64::new(0),
        })
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn is_compiled(&self) -> bool {
        self.handle.read().is_some()
    }

    pub fn kind(&self) -> ModelKind {
        self.kind.read().clone()
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Token that cancels in-flight artifact downloads; later refreshes are unaffected
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn status(&self) -> ModelStatus {
        let kind = self.kind.read();
        let refresh = self.refresh_state.read();
        let passes = self.forward_passes.load(Ordering::Relaxed);
        let total_us = self.forward_time_us.load(Ordering::Relaxed);

        ModelStatus {
            compiled: self.is_compiled(),
            kind: kind.name().to_string(),
            num_features: self.num_features,
            feature_names: kind.names(),
            last_refreshed_at: refresh.last_refreshed_at,
            last_refresh_error: refresh.last_error.clone(),
            forward_passes: passes,
            avg_forward_ms: if passes > 0 { (total_us as f32 / passes as f32) / 1000.0 } else { 0.0 },
        }
    }

    /// Rebind slot names; wrong arity leaves the current binding in place
    pub fn set_feature_names(&self, names: &[String]) -> Result<(), ModelError> {
        let mut kind = self.kind.write();
        match kind.rebind(names) {
            Ok(rebound) => {
                *kind = rebound;
                log::info!("Rebound {} model slots: {:?}", kind.name(), names);
                Ok(())
            }
            Err(e) => {
                log::warn!("Rejected feature names {:?}: {}", names, e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // REFRESH
    // ========================================================================

    /// Download `remote_name`, compile it and swap it in
    pub async fn refresh(&self, remote_name: &str) -> Result<RefreshReport, ModelError> {
        self.refresh_inner(remote_name, None).await
    }

    /// Like `refresh`, rejecting an artifact whose SHA-256 differs from `expected_sha256`
    pub async fn refresh_verified(&self, remote_name: &str, expected_sha256: &str) -> Result<RefreshReport, ModelError> {
        self.refresh_inner(remote_name, Some(expected_sha256)).await
    }

    async fn refresh_inner(&self, remote_name: &str, expected_sha256: Option<&str>) -> Result<RefreshReport, ModelError> {
        let cancel = self.cancel.renew();
        // Single artifact slot: one refresh at a time
        let _slot = self.refresh_lock.lock().await;
        log::info!("Refreshing model from {}", remote_name);

        if self.artifact_path.exists() {
            if let Err(e) = tokio::fs::remove_file(&self.artifact_path).await {
                log::warn!("Could not remove stale artifact {:?}: {}", self.artifact_path, e);
            }
        }
        if let Some(parent) = self.artifact_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let download = guarded(
            self.timeout,
            &cancel,
            self.transfer.download(remote_name, &self.artifact_path),
        )
        .await;
        if let Err(e) = download {
            log::error!("Model download failed: {}", e);
            self.refresh_state.write().last_error = Some(e.to_string());
            return Err(ModelError::Download(e));
        }

        let compiled = self.compile_artifact(expected_sha256).await;

        // Free the slot whatever the compile outcome
        let cleanup_error = match tokio::fs::remove_file(&self.artifact_path).await {
            Ok(()) => None,
            Err(e) => {
                log::warn!("Could not remove artifact {:?}: {}", self.artifact_path, e);
                Some(e.to_string())
            }
        };

        match compiled {
            Ok(model) => {
                let now = Utc::now();
                *self.handle.write() = Some(Arc::new(model));
                *self.refresh_state.write() = RefreshState {
                    last_refreshed_at: Some(now),
                    last_error: None,
                };
                log::info!("Model refreshed from {}", remote_name);
                Ok(RefreshReport {
                    remote_name: remote_name.to_string(),
                    refreshed_at: now,
                    cleanup_error,
                })
            }
            Err(e) => {
                if self.is_compiled() {
                    log::error!("Model compile failed, keeping previous model: {}", e);
                } else {
                    log::error!("Model compile failed, no model available: {}", e);
                }
                self.refresh_state.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn compile_artifact(&self, expected_sha256: Option<&str>) -> Result<R::Model, ModelError> {
        let runtime = Arc::clone(&self.runtime);
        let path = self.artifact_path.clone();
        let expected = expected_sha256.map(str::to_string);

        tokio::task::spawn_blocking(move || -> Result<R::Model, ModelError> {
            if let Some(expected) = expected {
                let actual = sha256_file(&path)?;
                if !actual.eq_ignore_ascii_case(expected.trim()) {
                    return Err(ModelError::ChecksumMismatch { expected, actual });
                }
            }
            let compiled = runtime.compile(&path)?;
            Ok(runtime.load_model(compiled)?)
        })
        .await
        .map_err(|e| ModelError::Runtime(RuntimeError::Compile(e.to_string())))?
    }

    // ========================================================================
    // PREDICTION
    // ========================================================================

    /// Run a prediction; `Err` is the empty result
    pub fn predict(&self, input: ModelInput<'_>) -> Result<Tensor, ModelError> {
        let kind = self.kind.read().clone();
        match (&kind, input) {
            (ModelKind::Sequential(binding), ModelInput::Sequence(series)) => {
                self.predict_sequential(binding, series)
            }
            (ModelKind::Feedforward(binding), ModelInput::Flat(values)) => {
                self.predict_feedforward(binding, values)
            }
            (other, _) => Err(ModelError::InputKindMismatch(other.name())),
        }
    }

    pub fn predict_sequence(&self, series: &[Vec<f32>]) -> Result<Tensor, ModelError> {
        self.predict(ModelInput::Sequence(series))
    }

    pub fn predict_flat(&self, values: &[f32]) -> Result<Tensor, ModelError> {
        self.predict(ModelInput::Flat(values))
    }

    fn loaded_model(&self) -> Result<Arc<R::Model>, ModelError> {
        self.handle.read().clone().ok_or(ModelError::NotCompiled)
    }

    fn predict_feedforward(&self, binding: &FeedforwardBinding, values: &[f32]) -> Result<Tensor, ModelError> {
        if values.len() != self.num_features {
            return Err(ModelError::InvalidInput(format!(
                "expected {} features, got {}",
                self.num_features,
                values.len()
            )));
        }
        let model = self.loaded_model()?;

        let mut inputs = NamedTensors::with_capacity(1);
        inputs.insert(
            binding.input.clone(),
            to_tensor(&[1, self.num_features], values.to_vec())?,
        );

        let mut outputs = self.forward(&model, inputs).map_err(|e| {
            log::debug!("Feedforward pass failed: {}", e);
            ModelError::Runtime(e)
        })?;
        take_output(&mut outputs, &binding.output)
    }

    fn predict_sequential(&self, binding: &SequentialBinding, series: &[Vec<f32>]) -> Result<Tensor, ModelError> {
        let steps = self.validate_series(series)?;
        let model = self.loaded_model()?;

        let mut state = InferenceState::default();
        let mut result = None;

        for step in 0..steps {
            let current: Vec<f32> = series.iter().map(|channel| channel[step]).collect();

            let mut inputs = NamedTensors::with_capacity(3);
            inputs.insert(binding.input.clone(), to_tensor(&[1, 1, self.num_features], current)?);
            // Step 0 leaves state slots unbound so the runtime uses its initial state
            if let Some(hidden) = state.hidden.take() {
                inputs.insert(binding.hidden.clone(), hidden);
            }
            if let Some(cell) = state.cell.take() {
                inputs.insert(binding.cell.clone(), cell);
            }

            let mut outputs = self.forward(&model, inputs).map_err(|source| {
                log::debug!("Sequential pass aborted at step {}/{}: {}", step, steps, source);
                ModelError::Step { step, source }
            })?;

            state.hidden = Some(take_output(&mut outputs, &binding.hidden)?);
            state.cell = Some(take_output(&mut outputs, &binding.cell)?);
            if step + 1 == steps {
                result = Some(take_output(&mut outputs, &binding.output)?);
            }
        }

        result.ok_or_else(|| ModelError::InvalidInput("empty sequence".to_string()))
    }

    /// Returns T, the shared channel length
    fn validate_series(&self, series: &[Vec<f32>]) -> Result<usize, ModelError> {
        if series.len() != self.num_features {
            return Err(ModelError::InvalidInput(format!(
                "expected {} feature channels, got {}",
                self.num_features,
                series.len()
            )));
        }
        let steps = series[0].len();
        if steps == 0 {
            return Err(ModelError::InvalidInput("sequence has no timesteps".to_string()));
        }
        if let Some(idx) = series.iter().position(|channel| channel.len() != steps) {
            return Err(ModelError::InvalidInput(format!(
                "channel {} has {} timesteps, expected {}",
                idx,
                series[idx].len(),
                steps
            )));
        }
        Ok(steps)
    }

    fn forward(&self, model: &R::Model, inputs: NamedTensors) -> Result<NamedTensors, RuntimeError> {
        let start = Instant::now();
        let out = self.runtime.forward(model, inputs, self.options);
        self.forward_passes.fetch_add(1, Ordering::Relaxed);
        self.forward_time_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        out
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn to_tensor(shape: &[usize], data: Vec<f32>) -> Result<Tensor, ModelError> {
    ArrayD::from_shape_vec(IxDyn(shape), data)
        .map_err(|e| ModelError::InvalidInput(format!("tensor shape error: {}", e)))
}

fn take_output(outputs: &mut NamedTensors, name: &str) -> Result<Tensor, ModelError> {
    outputs
        .remove(name)
        .ok_or_else(|| ModelError::Runtime(RuntimeError::MissingOutput(name.to_string())))
}

/// Lowercase hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
