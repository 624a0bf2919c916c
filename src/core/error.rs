use crate::core::types::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("parameter '{dependent}' depends on '{missing}', which does not exist")]
    MissingDependency { dependent: String, missing: String },

    #[error("parameter '{parameter}': min {min} is greater than max {max}")]
    InvalidBounds {
        parameter: String,
        min: Value,
        max: Value,
    },

    #[error("cyclic parameter dependency: {cycle}")]
    CyclicDependency { cycle: String },

    #[error("parameter '{parameter}': probability {value} is outside [0, 1]")]
    InvalidProbability { parameter: String, value: f64 },

    #[error("duplicate parameter '{parameter}'")]
    DuplicateParameter { parameter: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
