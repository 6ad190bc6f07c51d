// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for worker and processor execution events.
//!
//! This module contains message types for logging events related to:
//! * Worker instance lifecycle
//! * Processor execution lifecycle (start, completion, failure, stop)
//! * Stop requests reaching a worker

use crate::model::ProcessorType;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A worker instance subscribed and is accepting work.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dataflow_orchestrator::observability::messages::processor::WorkerStarted;
///
/// let msg = WorkerStarted {
///     instance: "processor-7f3c",
///     pool_size: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct WorkerStarted<'a> {
    pub instance: &'a str,
    pub pool_size: usize,
}

impl Display for WorkerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' accepting work: pool_size={}",
            self.instance, self.pool_size
        )
    }
}

impl StructuredLog for WorkerStarted<'_> {
    fn log(&self) {
        tracing::info!(instance = self.instance, pool_size = self.pool_size, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("worker", span_name = name, instance = self.instance)
    }
}

/// A worker instance shut down.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerStopped<'a> {
    pub instance: &'a str,
    pub reason: &'a str,
}

impl Display for WorkerStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker '{}' stopped: {}", self.instance, self.reason)
    }
}

/// Processor execution started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ProcessorExecutionStarted<'a> {
    pub run_plan_id: &'a str,
    pub processor_id: &'a str,
    pub processor_type: ProcessorType,
    pub input_envelopes: usize,
}

impl Display for ProcessorExecutionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' ({}) of run plan '{}' started: {} input envelopes",
            self.processor_id, self.processor_type, self.run_plan_id, self.input_envelopes
        )
    }
}

impl StructuredLog for ProcessorExecutionStarted<'_> {
    fn log(&self) {
        tracing::info!(
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
            processor_type = self.processor_type.as_str(),
            input_envelopes = self.input_envelopes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "processor",
            span_name = name,
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
            processor_type = self.processor_type.as_str(),
        )
    }
}

/// Processor execution completed successfully.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ProcessorExecutionCompleted<'a> {
    pub run_plan_id: &'a str,
    pub processor_id: &'a str,
    pub output_envelopes: usize,
    pub duration: std::time::Duration,
}

impl Display for ProcessorExecutionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' of run plan '{}' completed: {} output envelopes in {:?}",
            self.processor_id, self.run_plan_id, self.output_envelopes, self.duration
        )
    }
}

impl StructuredLog for ProcessorExecutionCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
            output_envelopes = self.output_envelopes,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "processor_completed",
            span_name = name,
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
        )
    }
}

/// Processor execution failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use dataflow_orchestrator::observability::messages::processor::ProcessorExecutionFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// let msg = ProcessorExecutionFailed {
///     run_plan_id: "run-1",
///     processor_id: "collect",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ProcessorExecutionFailed<'a> {
    pub run_plan_id: &'a str,
    pub processor_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ProcessorExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' of run plan '{}' failed: {}",
            self.processor_id, self.run_plan_id, self.error
        )
    }
}

impl StructuredLog for ProcessorExecutionFailed<'_> {
    fn log(&self) {
        tracing::error!(
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "processor_failed",
            span_name = name,
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
        )
    }
}

/// The worker shut down under a running processor. No terminal status is
/// reported, the processor stays RUNNING on the plan.
///
/// # Log Level
/// `warn!` - Work abandoned without a stop request
pub struct ProcessorAbandoned<'a> {
    pub run_plan_id: &'a str,
    pub processor_id: &'a str,
    pub instance: &'a str,
}

impl Display for ProcessorAbandoned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' shut down while processor '{}' of run plan '{}' was running",
            self.instance, self.processor_id, self.run_plan_id
        )
    }
}

impl StructuredLog for ProcessorAbandoned<'_> {
    fn log(&self) {
        tracing::warn!(
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
            instance = self.instance,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "processor_abandoned",
            span_name = name,
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
        )
    }
}

/// A processor observed a stop request and discarded its in-flight result.
///
/// # Log Level
/// `warn!` - Run was interrupted
pub struct ProcessorStopped<'a> {
    pub run_plan_id: &'a str,
    pub processor_id: &'a str,
}

impl Display for ProcessorStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processor '{}' of run plan '{}' stopped",
            self.processor_id, self.run_plan_id
        )
    }
}

impl StructuredLog for ProcessorStopped<'_> {
    fn log(&self) {
        tracing::warn!(
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "processor_stopped",
            span_name = name,
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
        )
    }
}

/// A broadcast stop request reached this worker.
///
/// # Log Level
/// `info!` - Important operational event
pub struct StopRequestReceived<'a> {
    pub run_plan_id: &'a str,
    pub instance: &'a str,
    pub cancelled: usize,
}

impl Display for StopRequestReceived<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' received stop for run plan '{}': cancelling {} in-flight processors",
            self.instance, self.run_plan_id, self.cancelled
        )
    }
}

impl StructuredLog for StopRequestReceived<'_> {
    fn log(&self) {
        tracing::info!(
            run_plan_id = self.run_plan_id,
            instance = self.instance,
            cancelled = self.cancelled,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "stop_request",
            span_name = name,
            run_plan_id = self.run_plan_id,
            instance = self.instance,
        )
    }
}
