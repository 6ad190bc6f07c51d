// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::{CollectExecutor, IngestExecutor, ScriptExecutor, TransformExecutor};
use crate::errors::ExecutionError;
use crate::model::{DataEnvelope, ProcessorRunModel, ProcessorType};
use crate::traits::{ProcessorExecutor, ScriptRuntime};

/// Maps a processor type to the executor that implements it.
///
/// Looked up at execution time, so a worker can be handed a registry with
/// additional or replacement executors without any change to dispatch.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<ProcessorType, Arc<dyn ProcessorExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in executors.
    pub fn with_builtins(script_runtime: Arc<dyn ScriptRuntime>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(IngestExecutor));
        registry.register(Arc::new(TransformExecutor));
        registry.register(Arc::new(ScriptExecutor::new(script_runtime)));
        registry.register(Arc::new(CollectExecutor));
        registry
    }

    /// Register an executor under its own type, returning the one it replaced.
    pub fn register(
        &mut self,
        executor: Arc<dyn ProcessorExecutor>,
    ) -> Option<Arc<dyn ProcessorExecutor>> {
        self.executors.insert(executor.processor_type(), executor)
    }

    pub fn get(&self, processor_type: ProcessorType) -> Option<&Arc<dyn ProcessorExecutor>> {
        self.executors.get(&processor_type)
    }

    pub fn contains(&self, processor_type: ProcessorType) -> bool {
        self.executors.contains_key(&processor_type)
    }

    /// Execute one processor through whichever executor is registered for its type.
    pub async fn execute(
        &self,
        processor: &ProcessorRunModel,
        envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError> {
        let executor = self
            .get(processor.processor_type)
            .ok_or_else(|| ExecutionError::UnsupportedType {
                processor_id: processor.id.clone(),
                processor_type: processor.processor_type,
            })?;
        executor.execute(processor, envelope).await
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.executors.keys().collect();
        types.sort();
        f.debug_struct("ExecutorRegistry")
            .field("processor_types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::StubExecutor;
    use crate::backends::tests::run_model;
    use crate::backends::wasm::WasmScriptRuntime;
    use crate::model::{ProcessorProperties, TransformOperation};

    #[test]
    fn builtins_cover_every_type() {
        let registry = ExecutorRegistry::with_builtins(Arc::new(WasmScriptRuntime::new(1_000_000).unwrap()));
        for processor_type in ProcessorType::ALL {
            assert!(registry.contains(processor_type), "{} missing", processor_type);
        }
    }

    #[tokio::test]
    async fn unregistered_type_is_unsupported() {
        let registry = ExecutorRegistry::new();
        let model = run_model("t", ProcessorProperties::Transform(TransformOperation::Trim));
        let err = registry.execute(&model, DataEnvelope::new("run")).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::UnsupportedType {
                processor_type: ProcessorType::Transform,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn registering_replaces_executor() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(TransformExecutor));
        let stub = Arc::new(StubExecutor::new(ProcessorType::Transform));
        assert!(registry.register(stub.clone()).is_some());

        let model = run_model("t", ProcessorProperties::Transform(TransformOperation::Uppercase));
        let out = registry
            .execute(&model, DataEnvelope::with_payload("run", b"quiet".to_vec()))
            .await
            .unwrap();
        assert_eq!(out.payload(), b"quiet");
        assert_eq!(stub.calls(), 1);
    }
}
