// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::ExecutionError;
use crate::model::{DataEnvelope, ProcessorRunModel, ProcessorType};

/// Executes one processor type over a data envelope.
///
/// Implementations read the typed properties frozen into the run model, move
/// or transform the payload, and append exactly one SUCCESS entry to the
/// envelope history before returning it. Failures are returned, never
/// swallowed; the caller records the FAILURE entry and turns the error into a
/// status event.
#[async_trait]
pub trait ProcessorExecutor: Send + Sync {
    async fn execute(
        &self,
        processor: &ProcessorRunModel,
        envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError>;

    /// The processor type this executor is registered under.
    fn processor_type(&self) -> ProcessorType;
}
