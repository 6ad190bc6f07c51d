// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::ExecutionError;
use crate::model::{DataEnvelope, ProcessorProperties, ProcessorRunModel, ProcessorType};
use crate::traits::{ProcessorExecutor, ScriptRuntime};

/// SCRIPT: hands the payload to an embedded interpreter and takes its output.
///
/// The interpreter call blocks, so it runs on tokio's blocking pool and never
/// stalls the worker's stop handling.
pub struct ScriptExecutor {
    runtime: Arc<dyn ScriptRuntime>,
}

impl ScriptExecutor {
    pub fn new(runtime: Arc<dyn ScriptRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ProcessorExecutor for ScriptExecutor {
    async fn execute(
        &self,
        processor: &ProcessorRunModel,
        mut envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError> {
        let script = match &processor.properties {
            ProcessorProperties::Script(script) => script.clone(),
            other => return Err(super::mismatched(processor, other)),
        };

        let runtime = Arc::clone(&self.runtime);
        let input = envelope.payload().to_vec();
        let output = tokio::task::spawn_blocking(move || runtime.run(&script.source, &input))
            .await
            .map_err(|e| ExecutionError::InternalError {
                message: format!("script task for '{}' did not complete: {}", processor.id, e),
            })?
            .map_err(|source| ExecutionError::Script {
                processor_id: processor.id.clone(),
                source,
            })?;

        envelope.set_payload(output);
        envelope.record_success(&processor.id);
        Ok(envelope)
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Script
    }
}
