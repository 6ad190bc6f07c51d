// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::errors::ExecutionError;
use crate::model::{DataEnvelope, ProcessorRunModel, ProcessorType};
use crate::traits::ProcessorExecutor;

/// Records success without touching the payload and counts its calls.
pub struct StubExecutor {
    pub processor_type: ProcessorType,
    pub calls: AtomicUsize,
}

impl StubExecutor {
    pub fn new(processor_type: ProcessorType) -> Self {
        Self {
            processor_type,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessorExecutor for StubExecutor {
    async fn execute(
        &self,
        processor: &ProcessorRunModel,
        mut envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        envelope.record_success(&processor.id);
        Ok(envelope)
    }

    fn processor_type(&self) -> ProcessorType {
        self.processor_type
    }
}

/// Always fails.
pub struct FailingExecutor {
    pub processor_type: ProcessorType,
}

#[async_trait]
impl ProcessorExecutor for FailingExecutor {
    async fn execute(
        &self,
        processor: &ProcessorRunModel,
        _envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError> {
        Err(ExecutionError::failed(&processor.id, "stub failure"))
    }

    fn processor_type(&self) -> ProcessorType {
        self.processor_type
    }
}

/// Signals `started`, then waits for `release` before succeeding.
pub struct BlockingExecutor {
    pub processor_type: ProcessorType,
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl BlockingExecutor {
    pub fn new(processor_type: ProcessorType) -> Self {
        Self {
            processor_type,
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ProcessorExecutor for BlockingExecutor {
    async fn execute(
        &self,
        processor: &ProcessorRunModel,
        mut envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError> {
        self.started.notify_one();
        self.release.notified().await;
        envelope.record_success(&processor.id);
        Ok(envelope)
    }

    fn processor_type(&self) -> ProcessorType {
        self.processor_type
    }
}
