// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::backends::wasm::ScriptError;
use crate::model::ProcessorType;

/// Failure of a single processor execution.
///
/// Execution errors are recorded as FAILED for the processor and are never
/// retried automatically: processors may have already produced side effects
/// (a file written to a destination, for example).
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No executor registered for processor type {processor_type} (processor '{processor_id}')")]
    UnsupportedType {
        processor_id: String,
        processor_type: ProcessorType,
    },

    #[error("Processor '{processor_id}' failed: {message}")]
    ProcessorFailed {
        processor_id: String,
        message: String,
    },

    #[error("I/O failure in processor '{processor_id}' at '{path}': {source}")]
    Io {
        processor_id: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Script failure in processor '{processor_id}': {source}")]
    Script {
        processor_id: String,
        #[source]
        source: ScriptError,
    },

    #[error("Input '{input_id}' of processor '{processor_id}' has no output for this run")]
    MissingInput {
        processor_id: String,
        input_id: String,
    },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ExecutionError {
    pub fn failed(processor_id: &str, message: impl Into<String>) -> Self {
        ExecutionError::ProcessorFailed {
            processor_id: processor_id.to_string(),
            message: message.into(),
        }
    }

    /// The processor the error belongs to, when it is tied to one.
    pub fn processor_id(&self) -> Option<&str> {
        match self {
            ExecutionError::UnsupportedType { processor_id, .. }
            | ExecutionError::ProcessorFailed { processor_id, .. }
            | ExecutionError::Io { processor_id, .. }
            | ExecutionError::Script { processor_id, .. }
            | ExecutionError::MissingInput { processor_id, .. } => Some(processor_id),
            ExecutionError::InternalError { .. } => None,
        }
    }
}
