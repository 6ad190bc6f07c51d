// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{DispatchConfig, NodeConfig};
use crate::engine::dispatcher::publish_with_retry;
use crate::errors::{BusError, ExecutionError, StoreError};
use crate::executor::{run_chain, ChainOutcome, ExecutorRegistry};
use crate::messaging::{
    instance_subscription, Message, MessageBus, ProcessRequest, StatusEvent, StopRequest, Subscription, Topic,
};
use crate::model::{DataEnvelope, EnvelopeTrace, ProcessorState};
use crate::observability::messages::messaging::{MessageDropped, SubscriptionOpened};
use crate::observability::messages::processor::{
    ProcessorAbandoned, ProcessorExecutionCompleted, ProcessorExecutionFailed, ProcessorExecutionStarted,
    ProcessorStopped, StopRequestReceived, WorkerStarted, WorkerStopped,
};
use crate::observability::messages::StructuredLog;
use crate::store::EnvelopeStore;

enum WorkOutcome {
    Succeeded(Vec<EnvelopeTrace>),
    Failed {
        error: ExecutionError,
        traces: Vec<EnvelopeTrace>,
    },
    Stopped(Vec<EnvelopeTrace>),
}

/// One worker instance.
///
/// Takes process requests from the shared worker subscription (competing
/// with every other instance), runs up to `pool_size` of them at once and
/// reports each processor's progress on the status topic. Stop requests are
/// received on a per-instance subscription so every instance sees them.
///
/// A stop only reaches work dispatched at or before its `requested_at`;
/// anything dispatched later belongs to a re-dispatch and keeps running.
pub struct Worker {
    instance: String,
    worker_group: String,
    bus: Arc<dyn MessageBus>,
    envelopes: Arc<dyn EnvelopeStore>,
    registry: ExecutorRegistry,
    policy: DispatchConfig,
    pool: Arc<Semaphore>,
    pool_size: usize,
    /// Cancellation handle and dispatch time per (run plan, processor, attempt) currently executing.
    active: Mutex<HashMap<(String, String, u32), (CancellationToken, DateTime<Utc>)>>,
    /// Latest stop request time per run plan, kept for `stop_retention`.
    stopped: Mutex<HashMap<String, DateTime<Utc>>>,
    stop_retention: chrono::Duration,
    shutting_down: AtomicBool,
}

impl Worker {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        envelopes: Arc<dyn EnvelopeStore>,
        registry: ExecutorRegistry,
        config: &NodeConfig,
    ) -> Self {
        let pool_size = config.worker.get_pool_size();
        let stop_retention = chrono::Duration::from_std(config.worker.get_stop_retention())
            .unwrap_or_else(|_| chrono::Duration::seconds(crate::config::consts::DEFAULT_STOP_RETENTION_SECS as i64));
        Self {
            instance: instance_subscription(),
            worker_group: config.messaging.get_worker_group().to_string(),
            bus,
            envelopes,
            registry,
            policy: config.dispatch.clone(),
            pool: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            active: Mutex::new(HashMap::new()),
            stopped: Mutex::new(HashMap::new()),
            stop_retention,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Whether a stop request for the run has reached this instance.
    pub async fn stop_requested(&self, run_plan_id: &str) -> bool {
        self.stopped.lock().await.contains_key(run_plan_id)
    }

    /// Process requests until `shutdown` fires. Work still running at that
    /// point is cancelled without reporting a terminal status; only a stop
    /// request makes a processor STOPPED.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<(), BusError> {
        let mut requests = self.bus.subscribe(Topic::ProcessRequest, &self.worker_group).await?;
        SubscriptionOpened {
            topic: Topic::ProcessRequest,
            subscription: &self.worker_group,
        }
        .log();
        let stops = self.bus.subscribe(Topic::RunPlanStopRequest, &self.instance).await?;
        SubscriptionOpened {
            topic: Topic::RunPlanStopRequest,
            subscription: &self.instance,
        }
        .log();

        WorkerStarted {
            instance: &self.instance,
            pool_size: self.pool_size,
        }
        .log();

        let stop_listener = tokio::spawn(self.clone().listen_for_stops(stops, shutdown.clone()));

        let reason = loop {
            // only take a request once there is room to run it
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break "shutdown requested",
                permit = self.pool.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break "worker pool closed",
                },
            };

            let received = tokio::select! {
                _ = shutdown.cancelled() => break "shutdown requested",
                m = requests.next() => m,
            };

            match received {
                None => break "request subscription closed",
                Some(Ok(Message::ProcessRequest(request))) => {
                    let worker = self.clone();
                    tokio::spawn(async move {
                        worker.process(request).await;
                        drop(permit);
                    });
                }
                Some(Ok(other)) => {
                    let error = BusError::UnexpectedMessage {
                        topic: Topic::ProcessRequest.to_string(),
                        expected: "process_request",
                    };
                    tracing::debug!(kind = other.kind(), "Unexpected message on the request topic");
                    log_dropped(Topic::ProcessRequest, &error);
                }
                Some(Err(error)) => log_dropped(Topic::ProcessRequest, &error),
            }
        };

        self.shutting_down.store(true, Ordering::SeqCst);
        for (token, _) in self.active.lock().await.values() {
            token.cancel();
        }
        if let Err(error) = stop_listener.await {
            tracing::warn!(instance = %self.instance, error = %error, "Stop listener ended abnormally");
        }

        let stopped = WorkerStopped {
            instance: &self.instance,
            reason,
        };
        tracing::info!(instance = %self.instance, "{}", stopped);
        Ok(())
    }

    async fn listen_for_stops(self: Arc<Self>, mut stops: Subscription, shutdown: CancellationToken) {
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                m = stops.next() => m,
            };
            match received {
                None => break,
                Some(Ok(Message::StopRequest(stop))) => self.stop_run(&stop).await,
                Some(Ok(other)) => {
                    let error = BusError::UnexpectedMessage {
                        topic: Topic::RunPlanStopRequest.to_string(),
                        expected: "stop_request",
                    };
                    tracing::debug!(kind = other.kind(), "Unexpected message on the stop topic");
                    log_dropped(Topic::RunPlanStopRequest, &error);
                }
                Some(Err(error)) => log_dropped(Topic::RunPlanStopRequest, &error),
            }
        }
    }

    async fn stop_run(&self, stop: &StopRequest) {
        {
            let mut stopped = self.stopped.lock().await;
            let at = stopped.entry(stop.run_plan_id.clone()).or_insert(stop.requested_at);
            if stop.requested_at > *at {
                *at = stop.requested_at;
            }
            let now = Utc::now();
            stopped.retain(|_, at| now.signed_duration_since(*at) < self.stop_retention);
        }

        let active = self.active.lock().await;
        let mut cancelled = 0;
        for ((run_plan_id, _, _), (token, dispatched_at)) in active.iter() {
            if *run_plan_id == stop.run_plan_id && *dispatched_at <= stop.requested_at {
                token.cancel();
                cancelled += 1;
            }
        }

        StopRequestReceived {
            run_plan_id: &stop.run_plan_id,
            instance: &self.instance,
            cancelled,
        }
        .log();
    }

    /// Requests dispatched before the latest stop of their run are not run.
    async fn dispatched_before_stop(&self, request: &ProcessRequest) -> bool {
        self.stopped
            .lock()
            .await
            .get(&request.run_plan_id)
            .map_or(false, |at| request.dispatched_at <= *at)
    }

    async fn process(&self, request: ProcessRequest) {
        let key = (request.run_plan_id.clone(), request.processor.id.clone(), request.attempt);
        let token = CancellationToken::new();
        // register before checking the stop record, so a concurrent stop
        // either is seen here or cancels the token
        self.active
            .lock()
            .await
            .insert(key.clone(), (token.clone(), request.dispatched_at));

        let outcome = if self.dispatched_before_stop(&request).await {
            ProcessorStopped {
                run_plan_id: &request.run_plan_id,
                processor_id: &request.processor.id,
            }
            .log();
            WorkOutcome::Stopped(Vec::new())
        } else {
            self.publish(StatusEvent::new(&request, ProcessorState::Running)).await;
            self.execute(&request, &token).await
        };

        self.active.lock().await.remove(&key);

        if matches!(outcome, WorkOutcome::Stopped(_))
            && self.shutting_down.load(Ordering::SeqCst)
            && !self.dispatched_before_stop(&request).await
        {
            ProcessorAbandoned {
                run_plan_id: &request.run_plan_id,
                processor_id: &request.processor.id,
                instance: &self.instance,
            }
            .log();
            return;
        }

        let event = match outcome {
            WorkOutcome::Succeeded(traces) => StatusEvent::new(&request, ProcessorState::Success).with_traces(traces),
            WorkOutcome::Failed { error, traces } => StatusEvent::new(&request, ProcessorState::Failed)
                .with_error(error.to_string())
                .with_traces(traces),
            WorkOutcome::Stopped(traces) => StatusEvent::new(&request, ProcessorState::Stopped).with_traces(traces),
        };
        self.publish(event).await;
    }

    async fn execute(&self, request: &ProcessRequest, token: &CancellationToken) -> WorkOutcome {
        let run_plan_id = request.run_plan_id.as_str();
        let model = &request.processor;

        let inputs = match self.gather_inputs(request).await {
            Ok(inputs) => inputs,
            Err(error) => return self.failed(request, error, Vec::new()),
        };

        let started_message = ProcessorExecutionStarted {
            run_plan_id,
            processor_id: &model.id,
            processor_type: model.processor_type,
            input_envelopes: inputs.len(),
        };
        started_message.log();
        let span = started_message.span("execute");
        let started = Instant::now();

        let mut outputs = Vec::with_capacity(inputs.len());
        for envelope in inputs {
            let outcome = run_chain(&self.registry, std::slice::from_ref(model), envelope, token)
                .instrument(span.clone())
                .await;
            match outcome {
                ChainOutcome::Completed(output) => outputs.push(output),
                ChainOutcome::Failed { envelope, error } => {
                    let mut traces = traces_of(&outputs);
                    traces.push(envelope.trace());
                    return self.failed(request, error, traces);
                }
                ChainOutcome::Stopped(_) => {
                    ProcessorStopped {
                        run_plan_id,
                        processor_id: &model.id,
                    }
                    .log();
                    return WorkOutcome::Stopped(traces_of(&outputs));
                }
            }
        }

        let traces = traces_of(&outputs);
        let output_envelopes = outputs.len();
        if let Err(error) = self.envelopes.put_outputs(run_plan_id, &model.id, outputs).await {
            let error = ExecutionError::InternalError {
                message: format!("failed to store outputs of '{}': {}", model.id, error),
            };
            return self.failed(request, error, traces);
        }

        ProcessorExecutionCompleted {
            run_plan_id,
            processor_id: &model.id,
            output_envelopes,
            duration: started.elapsed(),
        }
        .log();
        WorkOutcome::Succeeded(traces)
    }

    /// A processor without inputs starts from one empty envelope; otherwise it
    /// receives every envelope its inputs produced, input by input.
    async fn gather_inputs(&self, request: &ProcessRequest) -> Result<Vec<DataEnvelope>, ExecutionError> {
        let model = &request.processor;
        if model.inputs.is_empty() {
            return Ok(vec![DataEnvelope::new(request.run_plan_id.as_str())]);
        }

        let mut inputs = Vec::new();
        for input_id in &model.inputs {
            match self.envelopes.outputs(&request.run_plan_id, input_id).await {
                Ok(envelopes) => inputs.extend(envelopes),
                Err(StoreError::NotFound { .. }) => {
                    return Err(ExecutionError::MissingInput {
                        processor_id: model.id.clone(),
                        input_id: input_id.clone(),
                    })
                }
                Err(error) => {
                    return Err(ExecutionError::InternalError {
                        message: format!("failed to read outputs of '{}': {}", input_id, error),
                    })
                }
            }
        }
        Ok(inputs)
    }

    fn failed(&self, request: &ProcessRequest, error: ExecutionError, traces: Vec<EnvelopeTrace>) -> WorkOutcome {
        ProcessorExecutionFailed {
            run_plan_id: &request.run_plan_id,
            processor_id: &request.processor.id,
            error: &error,
        }
        .log();
        WorkOutcome::Failed { error, traces }
    }

    async fn publish(&self, event: StatusEvent) {
        let message = Message::from(event);
        if let Err((attempts, error)) =
            publish_with_retry(self.bus.as_ref(), &self.policy, Topic::RunPlanStatus, &message).await
        {
            tracing::error!(
                run_plan_id = message.run_plan_id(),
                attempts,
                error = %error,
                "Worker '{}' could not publish status after {} attempts: {}", self.instance, attempts, error
            );
        }
    }
}

fn traces_of(envelopes: &[DataEnvelope]) -> Vec<EnvelopeTrace> {
    envelopes.iter().map(DataEnvelope::trace).collect()
}

fn log_dropped(topic: Topic, error: &BusError) {
    tracing::warn!(topic = %topic, "{}", MessageDropped { topic, reason: error });
}
