// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Publishing work and control messages with bounded retry.
//!
//! Every publish goes through [`publish_with_retry`]: up to
//! `max_attempts` tries with exponential backoff between them. When a process
//! request still cannot be published the dispatcher reports a start failure
//! (best effort, the bus may be the thing that is down) and hands a
//! [`DispatchError::Exhausted`] back to the caller.

use chrono::Utc;
use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::errors::{BusError, DispatchError};
use crate::messaging::{Message, MessageBus, ProcessRequest, StartFailure, StopRequest, Topic};
use crate::model::RunPlan;
use crate::observability::messages::engine::{PhaseDispatched, StatusEventRequeued};
use crate::observability::messages::messaging::{DispatchExhausted, PublishRetry};
use crate::observability::messages::StructuredLog;

/// Publish `message`, retrying per `policy`.
///
/// # Returns
/// * `Ok(())` once the bus accepted the message.
/// * `Err((attempts, last_error))` when every attempt failed.
pub async fn publish_with_retry(
    bus: &dyn MessageBus,
    policy: &DispatchConfig,
    topic: Topic,
    message: &Message,
) -> Result<(), (u32, BusError)> {
    let max_attempts = policy.get_max_attempts();
    let mut attempt = 1;
    loop {
        match bus.publish(topic, message).await {
            Ok(()) => return Ok(()),
            Err(error) if attempt < max_attempts => {
                let backoff = policy.backoff_for(attempt);
                PublishRetry {
                    topic,
                    run_plan_id: message.run_plan_id(),
                    attempt,
                    max_attempts,
                    backoff,
                    error: &error,
                }
                .log();
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(error) => return Err((attempt, error)),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    bus: Arc<dyn MessageBus>,
    policy: DispatchConfig,
}

impl Dispatcher {
    pub fn new(bus: Arc<dyn MessageBus>, policy: DispatchConfig) -> Self {
        Self { bus, policy }
    }

    /// Publish one process request per id, in order.
    ///
    /// Each request carries the processor's current `dispatch_count` as its
    /// attempt, so the caller must have recorded the dispatch on `plan`
    /// before calling. Stops at the first processor that cannot be published.
    pub async fn dispatch_processors(&self, plan: &RunPlan, processor_ids: &[String]) -> Result<(), DispatchError> {
        if processor_ids.is_empty() {
            return Ok(());
        }

        for processor_id in processor_ids {
            let unknown = || DispatchError::UnknownProcessor {
                run_plan_id: plan.id.clone(),
                processor_id: processor_id.clone(),
            };
            let model = plan.processor(processor_id).ok_or_else(unknown)?;
            let status = plan.status(processor_id).ok_or_else(unknown)?;

            let request = Message::from(ProcessRequest {
                run_plan_id: plan.id.clone(),
                dataflow_id: plan.dataflow_id.clone(),
                attempt: status.dispatch_count,
                processor: model.clone(),
                dispatched_at: Utc::now(),
            });

            if let Err((attempts, error)) =
                publish_with_retry(self.bus.as_ref(), &self.policy, Topic::ProcessRequest, &request).await
            {
                DispatchExhausted {
                    run_plan_id: &plan.id,
                    processor_id,
                    attempts,
                    error: &error,
                }
                .log();
                self.report_start_failure(&plan.id, processor_id, &error).await;
                return Err(DispatchError::Exhausted {
                    run_plan_id: plan.id.clone(),
                    processor_id: processor_id.clone(),
                    attempts,
                    source: error,
                });
            }
        }

        if let Some(phase) = plan.current_phase {
            PhaseDispatched {
                run_plan_id: &plan.id,
                phase,
                processor_ids,
            }
            .log();
        }
        Ok(())
    }

    /// Tell every worker to abandon the run.
    pub async fn broadcast_stop(&self, run_plan_id: &str, reason: Option<&str>) -> Result<(), BusError> {
        let message = Message::from(StopRequest::new(run_plan_id, reason.map(str::to_string)));
        publish_with_retry(self.bus.as_ref(), &self.policy, Topic::RunPlanStopRequest, &message)
            .await
            .map_err(|(_, error)| error)
    }

    /// Put a message back on `topic` after the longest backoff, so it is
    /// applied again once contention has had time to clear.
    pub async fn requeue(&self, topic: Topic, message: &Message) -> Result<(), BusError> {
        let delay = self.policy.get_max_backoff();
        StatusEventRequeued {
            run_plan_id: message.run_plan_id(),
            topic: topic.name(),
            delay,
        }
        .log();
        tokio::time::sleep(delay).await;
        publish_with_retry(self.bus.as_ref(), &self.policy, topic, message)
            .await
            .map_err(|(_, error)| error)
    }

    async fn report_start_failure(&self, run_plan_id: &str, processor_id: &str, error: &BusError) {
        let message = Message::from(StartFailure {
            run_plan_id: run_plan_id.to_string(),
            processor_id: Some(processor_id.to_string()),
            reason: error.to_string(),
        });
        if let Err(publish_error) = self.bus.publish(Topic::RunPlanStartFailure, &message).await {
            tracing::warn!(
                run_plan_id,
                processor_id,
                error = %publish_error,
                "Could not report start failure for run plan '{}'", run_plan_id
            );
        }
    }
}
