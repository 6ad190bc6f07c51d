// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for RunPlan orchestration events.
//!
//! This module contains message types for logging events related to:
//! * RunPlan compilation and start
//! * Phase dispatch and re-dispatch
//! * RunPlan state transitions
//! * Status events that were ignored or could not be applied

use crate::errors::StoreError;
use crate::model::{ProcessorState, RunPlanState};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A Dataflow was compiled into a RunPlan.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunPlanCompiled<'a> {
    pub run_plan_id: &'a str,
    pub dataflow_id: &'a str,
    pub processor_count: usize,
    pub phase_count: usize,
}

impl Display for RunPlanCompiled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Compiled dataflow '{}' into run plan '{}': {} processors in {} phases",
            self.dataflow_id, self.run_plan_id, self.processor_count, self.phase_count
        )
    }
}

impl StructuredLog for RunPlanCompiled<'_> {
    fn log(&self) {
        tracing::info!(
            run_plan_id = self.run_plan_id,
            dataflow_id = self.dataflow_id,
            processor_count = self.processor_count,
            phase_count = self.phase_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_plan_compiled",
            span_name = name,
            run_plan_id = self.run_plan_id,
            dataflow_id = self.dataflow_id,
        )
    }
}

/// A RunPlan started dispatching.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dataflow_orchestrator::observability::messages::engine::RunPlanStarted;
///
/// let msg = RunPlanStarted {
///     run_plan_id: "run-1",
///     dataflow_id: "orders",
///     first_phase: Some(0),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunPlanStarted<'a> {
    pub run_plan_id: &'a str,
    pub dataflow_id: &'a str,
    pub first_phase: Option<u64>,
}

impl Display for RunPlanStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.first_phase {
            Some(phase) => write!(
                f,
                "Run plan '{}' for dataflow '{}' starting at phase {}",
                self.run_plan_id, self.dataflow_id, phase
            ),
            None => write!(
                f,
                "Run plan '{}' for dataflow '{}' has no processors",
                self.run_plan_id, self.dataflow_id
            ),
        }
    }
}

impl StructuredLog for RunPlanStarted<'_> {
    fn log(&self) {
        tracing::info!(
            run_plan_id = self.run_plan_id,
            dataflow_id = self.dataflow_id,
            first_phase = ?self.first_phase,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_plan",
            span_name = name,
            run_plan_id = self.run_plan_id,
            dataflow_id = self.dataflow_id,
        )
    }
}

/// Process requests for (part of) a phase were published.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PhaseDispatched<'a> {
    pub run_plan_id: &'a str,
    pub phase: u64,
    pub processor_ids: &'a [String],
}

impl Display for PhaseDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run plan '{}' dispatched phase {}: [{}]",
            self.run_plan_id,
            self.phase,
            self.processor_ids.join(", ")
        )
    }
}

impl StructuredLog for PhaseDispatched<'_> {
    fn log(&self) {
        tracing::info!(
            run_plan_id = self.run_plan_id,
            phase = self.phase,
            processor_count = self.processor_ids.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "phase_dispatch",
            span_name = name,
            run_plan_id = self.run_plan_id,
            phase = self.phase,
        )
    }
}

/// The aggregate state of a RunPlan changed.
///
/// # Log Level
/// `info!` for SUCCESS and intermediate states, `warn!` for FAILED and STOPPED
pub struct RunPlanTransition<'a> {
    pub run_plan_id: &'a str,
    pub from: RunPlanState,
    pub to: RunPlanState,
    pub reason: Option<&'a str>,
}

impl Display for RunPlanTransition<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Run plan '{}': {} -> {}", self.run_plan_id, self.from, self.to)?;
        if let Some(reason) = self.reason {
            write!(f, " ({})", reason)?;
        }
        Ok(())
    }
}

impl StructuredLog for RunPlanTransition<'_> {
    fn log(&self) {
        let from = self.from.to_string();
        let to = self.to.to_string();
        match self.to {
            RunPlanState::Failed | RunPlanState::Stopped => tracing::warn!(
                run_plan_id = self.run_plan_id,
                from = from.as_str(),
                to = to.as_str(),
                reason = self.reason,
                "{}", self
            ),
            _ => tracing::info!(
                run_plan_id = self.run_plan_id,
                from = from.as_str(),
                to = to.as_str(),
                "{}", self
            ),
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_plan_transition",
            span_name = name,
            run_plan_id = self.run_plan_id,
            to = %self.to,
        )
    }
}

/// A status event was a no-op: duplicate, stale attempt, or the run already ended.
///
/// # Log Level
/// `debug!` - Expected under at-least-once delivery
pub struct StatusEventIgnored<'a> {
    pub run_plan_id: &'a str,
    pub processor_id: &'a str,
    pub state: ProcessorState,
    pub reason: &'a str,
}

impl Display for StatusEventIgnored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring {} for processor '{}' of run plan '{}': {}",
            self.state, self.processor_id, self.run_plan_id, self.reason
        )
    }
}

impl StructuredLog for StatusEventIgnored<'_> {
    fn log(&self) {
        tracing::debug!(
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
            state = %self.state,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "status_ignored",
            span_name = name,
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
        )
    }
}

/// A start failure arrived after the run was already under way.
///
/// # Log Level
/// `warn!` - Unexpected but harmless
pub struct StartFailureIgnored<'a> {
    pub run_plan_id: &'a str,
    pub state: RunPlanState,
    pub reason: &'a str,
}

impl Display for StartFailureIgnored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring start failure for run plan '{}' in state {}: {}",
            self.run_plan_id, self.state, self.reason
        )
    }
}

/// Lost a concurrent RunPlan update; retrying against the refreshed document.
///
/// # Log Level
/// `warn!` - Contention worth noticing
pub struct StatusConflictRetry<'a> {
    pub run_plan_id: &'a str,
    pub attempt: u32,
    pub error: &'a StoreError,
}

impl Display for StatusConflictRetry<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run plan '{}' update conflicted (attempt {}): {}",
            self.run_plan_id, self.attempt, self.error
        )
    }
}

impl StructuredLog for StatusConflictRetry<'_> {
    fn log(&self) {
        tracing::warn!(
            run_plan_id = self.run_plan_id,
            attempt = self.attempt,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "status_conflict",
            span_name = name,
            run_plan_id = self.run_plan_id,
            attempt = self.attempt,
        )
    }
}

/// A status, stop or start-failure message could not be applied.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct StatusHandlingFailed<'a> {
    pub run_plan_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for StatusHandlingFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to apply status for run plan '{}': {}",
            self.run_plan_id, self.error
        )
    }
}

impl StructuredLog for StatusHandlingFailed<'_> {
    fn log(&self) {
        tracing::error!(
            run_plan_id = self.run_plan_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("status_failed", span_name = name, run_plan_id = self.run_plan_id)
    }
}

/// Conflict retries ran out; the event goes back on its topic to be applied later.
///
/// # Log Level
/// `warn!` - Heavy contention on one run plan
pub struct StatusEventRequeued<'a> {
    pub run_plan_id: &'a str,
    pub topic: &'a str,
    pub delay: std::time::Duration,
}

impl Display for StatusEventRequeued<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Requeueing event for run plan '{}' on {} after {:?}",
            self.run_plan_id, self.topic, self.delay
        )
    }
}

impl StructuredLog for StatusEventRequeued<'_> {
    fn log(&self) {
        tracing::warn!(
            run_plan_id = self.run_plan_id,
            topic = self.topic,
            delay_ms = self.delay.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("status_requeued", span_name = name, run_plan_id = self.run_plan_id)
    }
}

/// An operator re-dispatched a failed phase.
///
/// # Log Level
/// `info!` - Operator action
pub struct PhaseRedispatched<'a> {
    pub run_plan_id: &'a str,
    pub phase: u64,
    pub reset_count: usize,
}

impl Display for PhaseRedispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run plan '{}' re-dispatching phase {} ({} processors reset to PENDING)",
            self.run_plan_id, self.phase, self.reset_count
        )
    }
}

impl StructuredLog for PhaseRedispatched<'_> {
    fn log(&self) {
        tracing::info!(
            run_plan_id = self.run_plan_id,
            phase = self.phase,
            reset_count = self.reset_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "phase_redispatch",
            span_name = name,
            run_plan_id = self.run_plan_id,
            phase = self.phase,
        )
    }
}
