//! ML Runtime Boundary
//!
//! Compile an artifact from a file, load it, run single forward passes over
//! named tensors. Inputs are a plain name -> tensor map built fresh per call.

use std::collections::HashMap;
use std::path::Path;

use ndarray::ArrayD;

/// Tensor exchanged with the runtime
pub type Tensor = ArrayD<f32>;

/// Named tensors going in or out of one forward pass
pub type NamedTensors = HashMap<String, Tensor>;

/// Per-call execution options
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardOptions {
    /// Use a hardware accelerator when the runtime has one
    pub use_accelerator: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Compile failed: {0}")]
    Compile(String),
    #[error("Load failed: {0}")]
    Load(String),
    #[error("Forward pass failed: {0}")]
    Forward(String),
    #[error("Missing output '{0}'")]
    MissingOutput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for inference runtimes (ONNX Runtime, test stubs, ...)
pub trait ModelRuntime: Send + Sync + 'static {
    /// Output of compilation; must not depend on the artifact file after return
    type Compiled: Send + 'static;
    /// Loaded model ready for forward passes
    type Model: Send + Sync + 'static;

    fn compile(&self, artifact: &Path) -> Result<Self::Compiled, RuntimeError>;

    fn load_model(&self, compiled: Self::Compiled) -> Result<Self::Model, RuntimeError>;

    fn forward(
        &self,
        model: &Self::Model,
        inputs: NamedTensors,
        options: ForwardOptions,
    ) -> Result<NamedTensors, RuntimeError>;
}
