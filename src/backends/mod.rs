// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in processor executors.
//!
//! Each processor type has one executor implementing
//! [`ProcessorExecutor`](crate::traits::ProcessorExecutor):
//!
//! - **INGEST** ([`ingest::IngestExecutor`]): reads a file or inline data into the payload.
//! - **TRANSFORM** ([`transform::TransformExecutor`]): text operations on a UTF-8 payload.
//! - **SCRIPT** ([`script::ScriptExecutor`]): runs a WebAssembly module over the payload.
//! - **COLLECT** ([`collect::CollectExecutor`]): writes the payload to a destination.
//!
//! Executors are looked up by type through the
//! [`ExecutorRegistry`](crate::executor::ExecutorRegistry); adding a type means
//! registering another implementation.
//!
//! ## Stub Backend (Test-Only)
//! [`stub`] holds executors for exercising failure and cancellation paths. It
//! is only compiled for tests.

pub mod collect;
pub mod ingest;
pub mod script;
#[cfg(test)]
pub mod stub;
pub mod transform;
pub mod wasm;

pub use collect::CollectExecutor;
pub use ingest::IngestExecutor;
pub use script::ScriptExecutor;
pub use transform::TransformExecutor;

use crate::errors::ExecutionError;
use crate::model::{ProcessorProperties, ProcessorRunModel};

/// The compiler pairs types with properties, so this only fires when an
/// executor is registered under the wrong type.
fn mismatched(processor: &ProcessorRunModel, found: &ProcessorProperties) -> ExecutionError {
    ExecutionError::InternalError {
        message: format!(
            "processor '{}' is {} but carries {} properties",
            processor.id,
            processor.processor_type,
            found.processor_type()
        ),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::model::{ProcessorProperties, ProcessorRunModel};

    pub fn run_model(id: &str, properties: ProcessorProperties) -> ProcessorRunModel {
        ProcessorRunModel {
            id: id.to_string(),
            flow_id: "flow".to_string(),
            name: id.to_string(),
            processor_type: properties.processor_type(),
            phase: 0,
            inputs: Vec::new(),
            properties,
        }
    }
}
