//! ONNX Runtime Integration
//!
//! compile: read + checksum the artifact into memory, so the file can go away.
//! load: build an ort session from those bytes.
//! forward: named ndarray tensors in, named tensors out.

use std::collections::HashMap;
use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor as OrtTensor;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::runtime::{ForwardOptions, ModelRuntime, NamedTensors, RuntimeError};

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrtRuntimeConfig {
    /// 0 = disabled, 1 = basic, 2 = extended, 3 = all
    pub optimization_level: u8,
    pub intra_threads: usize,
    /// Graph output name -> slot name, for models whose state outputs are
    /// named differently from the matching inputs (e.g. `h_out` -> `h`)
    pub output_aliases: HashMap<String, String>,
}

impl Default for OrtRuntimeConfig {
    fn default() -> Self {
        Self {
            optimization_level: 3,
            intra_threads: 1,
            output_aliases: HashMap::new(),
        }
    }
}

impl OrtRuntimeConfig {
    fn level(&self) -> GraphOptimizationLevel {
        match self.optimization_level {
            0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Artifact bytes held in memory after compilation
pub struct CompiledArtifact {
    bytes: Vec<u8>,
    sha256: String,
}

impl CompiledArtifact {
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

/// Loaded ort session
pub struct OrtModel {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    sha256: String,
}

impl OrtModel {
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrtRuntime {
    config: OrtRuntimeConfig,
}

impl OrtRuntime {
    pub fn new(config: OrtRuntimeConfig) -> Self {
        Self { config }
    }
}

// ============================================================================
// RUNTIME
// ============================================================================

impl ModelRuntime for OrtRuntime {
    type Compiled = CompiledArtifact;
    type Model = OrtModel;

    fn compile(&self, artifact: &Path) -> Result<CompiledArtifact, RuntimeError> {
        log::info!("Compiling model artifact: {:?}", artifact);

        let bytes = std::fs::read(artifact)?;
        if bytes.is_empty() {
            return Err(RuntimeError::Compile("artifact is empty".to_string()));
        }
        let sha256 = hex::encode(Sha256::digest(&bytes));

        Ok(CompiledArtifact { bytes, sha256 })
    }

    fn load_model(&self, compiled: CompiledArtifact) -> Result<OrtModel, RuntimeError> {
        log::info!("Loading ONNX model from memory ({} bytes)", compiled.bytes.len());

        let session = Session::builder()
            .map_err(|e| RuntimeError::Load(format!("Session builder error: {}", e)))?
            .with_optimization_level(self.config.level())
            .map_err(|e| RuntimeError::Load(format!("Optimization error: {}", e)))?
            .with_intra_threads(self.config.intra_threads.max(1))
            .map_err(|e| RuntimeError::Load(format!("Thread config error: {}", e)))?
            .commit_from_memory(&compiled.bytes)
            .map_err(|e| RuntimeError::Compile(format!("Load from memory error: {}", e)))?;

        let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        log::info!("ONNX model loaded (sha256 {})", &compiled.sha256[..12]);

        Ok(OrtModel {
            session: Mutex::new(session),
            input_names,
            output_names,
            sha256: compiled.sha256,
        })
    }

    fn forward(
        &self,
        model: &OrtModel,
        inputs: NamedTensors,
        options: ForwardOptions,
    ) -> Result<NamedTensors, RuntimeError> {
        if options.use_accelerator {
            log::trace!("Accelerator requested; session uses its configured providers");
        }

        let mut feed: Vec<(String, SessionInputValue<'static>)> = Vec::with_capacity(inputs.len());
        for (name, array) in inputs {
            if !model.input_names.contains(&name) {
                return Err(RuntimeError::Forward(format!("model has no input '{}'", name)));
            }
            let tensor = OrtTensor::from_array(array)
                .map_err(|e| RuntimeError::Forward(format!("Tensor error: {}", e)))?;
            feed.push((name, tensor.into()));
        }

        let mut session = model.session.lock();
        let outputs = session
            .run(feed)
            .map_err(|e| RuntimeError::Forward(format!("Inference failed: {}", e)))?;

        let mut named = NamedTensors::with_capacity(model.output_names.len());
        for graph_name in &model.output_names {
            let value = match outputs.get(graph_name.as_str()) {
                Some(v) => v,
                None => continue,
            };
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| RuntimeError::Forward(format!("Extract error: {}", e)))?;
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            let array = ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
                .map_err(|e| RuntimeError::Forward(format!("Array error: {}", e)))?;

            let slot = self
                .config
                .output_aliases
                .get(graph_name)
                .cloned()
                .unwrap_or_else(|| graph_name.clone());
            named.insert(slot, array);
        }

        Ok(named)
    }
}
