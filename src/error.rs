use std::time::Duration;

use actix_web::http::StatusCode;
use thiserror::Error;

/// Every way a compile request can end short of printing program output
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error("Security violation: {0}")]
    SecurityViolation(String),
    #[error("Compilation failed")]
    Compile(String),
    #[error("Execution timed out after {} ms", .0.as_millis())]
    ExecutionTimeout(Duration),
    #[error("Program exited with code {code}")]
    Runtime { code: i32, output: String },
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Compile errors, timeouts and runtime errors are ordinary user outcomes
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::SecurityViolation(_) => StatusCode::BAD_REQUEST,
            Self::Compile(_) | Self::ExecutionTimeout(_) | Self::Runtime { .. } => StatusCode::OK,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the `output` field of the response
    pub fn output(&self) -> String {
        match self {
            Self::Compile(text) => format!("Compilation Error:\n{text}"),
            Self::Runtime { output, .. } => output.clone(),
            other => other.to_string(),
        }
    }
}
