//! Slot bindings for the two model categories

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Which named tensors of a recurrent model carry input, state and output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialBinding {
    pub input: String,
    pub hidden: String,
    /// Cell / output-state slot
    pub cell: String,
    pub output: String,
}

impl SequentialBinding {
    pub const ARITY: usize = 4;

    /// Names in order: input, hidden, cell, output
    pub fn from_names(names: &[String]) -> Result<Self, ModelError> {
        match names {
            [input, hidden, cell, output] => Ok(Self {
                input: input.clone(),
                hidden: hidden.clone(),
                cell: cell.clone(),
                output: output.clone(),
            }),
            _ => Err(ModelError::ArityMismatch {
                expected: Self::ARITY,
                actual: names.len(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedforwardBinding {
    pub input: String,
    pub output: String,
}

impl FeedforwardBinding {
    pub const ARITY: usize = 2;

    /// Names in order: input, output
    pub fn from_names(names: &[String]) -> Result<Self, ModelError> {
        match names {
            [input, output] => Ok(Self {
                input: input.clone(),
                output: output.clone(),
            }),
            _ => Err(ModelError::ArityMismatch {
                expected: Self::ARITY,
                actual: names.len(),
            }),
        }
    }
}

/// Model category with its slot names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelKind {
    Sequential(SequentialBinding),
    Feedforward(FeedforwardBinding),
}

impl ModelKind {
    /// Default names for a recurrent (LSTM-style) model
    pub fn sequential() -> Self {
        ModelKind::Sequential(SequentialBinding {
            input: "input".to_string(),
            hidden: "hidden".to_string(),
            cell: "cell".to_string(),
            output: "output".to_string(),
        })
    }

    /// Default names for a single-step model
    pub fn feedforward() -> Self {
        ModelKind::Feedforward(FeedforwardBinding {
            input: "input".to_string(),
            output: "output".to_string(),
        })
    }

    pub fn arity(&self) -> usize {
        match self {
            ModelKind::Sequential(_) => SequentialBinding::ARITY,
            ModelKind::Feedforward(_) => FeedforwardBinding::ARITY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Sequential(_) => "sequential",
            ModelKind::Feedforward(_) => "feedforward",
        }
    }

    /// Same category, new names. `self` is untouched on error.
    pub fn rebind(&self, names: &[String]) -> Result<Self, ModelError> {
        match self {
            ModelKind::Sequential(_) => SequentialBinding::from_names(names).map(ModelKind::Sequential),
            ModelKind::Feedforward(_) => FeedforwardBinding::from_names(names).map(ModelKind::Feedforward),
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            ModelKind::Sequential(b) => vec![b.input.clone(), b.hidden.clone(), b.cell.clone(), b.output.clone()],
            ModelKind::Feedforward(b) => vec![b.input.clone(), b.output.clone()],
        }
    }
}
