//! Domain error types.

use std::fmt;
use std::path::Path;

/// Pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Prepare,
    Load,
    Group,
    Split,
    Balance,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Load => "load",
            Stage::Group => "group",
            Stage::Split => "split",
            Stage::Balance => "balance",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the dataset pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("[{stage}] missing required column '{column}'")]
    InputShape { stage: Stage, column: String },

    #[error("[{stage}] invalid value {value:?} in column '{column}' at row {row}")]
    InvalidValue {
        stage: Stage,
        row: usize,
        column: String,
        value: String,
    },

    #[error("[{stage}] insufficient data: {reason}")]
    InsufficientData { stage: Stage, reason: String },

    #[error("[{stage}] computation error at index {index}: {reason}")]
    Computation {
        stage: Stage,
        index: usize,
        reason: String,
    },

    #[error("[{stage}] invalid parameter: {reason}")]
    InvalidParameter { stage: Stage, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("[{stage}] csv error in {path}: {reason}")]
    Csv {
        stage: Stage,
        path: String,
        reason: String,
    },

    #[error("[{stage}] io error on {path}: {source}")]
    Io {
        stage: Stage,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(stage: Stage, path: &Path, source: std::io::Error) -> Self {
        PipelineError::Io {
            stage,
            path: path.display().to_string(),
            source,
        }
    }

    /// Stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::InputShape { stage, .. }
            | PipelineError::InvalidValue { stage, .. }
            | PipelineError::InsufficientData { stage, .. }
            | PipelineError::Computation { stage, .. }
            | PipelineError::InvalidParameter { stage, .. }
            | PipelineError::Csv { stage, .. }
            | PipelineError::Io { stage, .. } => Some(*stage),
            PipelineError::ConfigParse { .. }
            | PipelineError::ConfigMissing { .. }
            | PipelineError::ConfigInvalid { .. } => None,
        }
    }
}

impl From<&PipelineError> for std::process::ExitCode {
    fn from(err: &PipelineError) -> Self {
        let code: u8 = match err {
            PipelineError::Io { .. } | PipelineError::Csv { .. } => 1,
            PipelineError::ConfigParse { .. }
            | PipelineError::ConfigMissing { .. }
            | PipelineError::ConfigInvalid { .. }
            | PipelineError::InvalidParameter { .. } => 2,
            PipelineError::InputShape { .. } | PipelineError::InvalidValue { .. } => 3,
            PipelineError::Computation { .. } => 4,
            PipelineError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
