//! Model Module - Refresh and Inference
//!
//! Owns the compiled model handle, refreshes it from object storage and runs
//! feedforward or recurrent prediction through a pluggable runtime.
//!
//! ## Structure
//! - `runtime.rs` - `ModelRuntime` boundary, named tensors
//! - `binding.rs` - `ModelKind` sum type and slot names
//! - `controller.rs` - refresh state machine + prediction loops
//! - `ort_runtime.rs` - ONNX Runtime implementation

pub mod runtime;
pub mod binding;
pub mod controller;
pub mod ort_runtime;


pub use binding::{FeedforwardBinding, ModelKind, SequentialBinding};
pub use controller::{ModelController, ModelInput, ModelStatus, RefreshReport};
pub use ort_runtime::{OrtRuntime, OrtRuntimeConfig};
pub use runtime::{ForwardOptions, ModelRuntime, NamedTensors, RuntimeError, Tensor};

use crate::logic::transfer::TransferError;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Expected {expected} feature names, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("Input does not match a {0} model")]
    InputKindMismatch(&'static str),
    #[error("No compiled model available")]
    NotCompiled,
    #[error("Artifact download failed: {0}")]
    Download(#[from] TransferError),
    #[error("Artifact checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Timestep {step} failed: {source}")]
    Step {
        step: usize,
        #[source]
        source: RuntimeError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
