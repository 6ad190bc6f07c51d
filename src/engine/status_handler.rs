// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The single writer of RunPlan state.
//!
//! Every input (start, status event, start failure, stop, re-dispatch) goes
//! through the same cycle:
//!
//! 1. take the per-plan lock, so inputs for one plan on this node are serialized
//! 2. read the plan, apply the input with [`state::apply`]
//! 3. write it back with a version check; on conflict re-read and re-apply
//! 4. only after the write succeeded, publish what the new state requires
//!
//! A bus event that still conflicts after `max_conflict_retries` is put back
//! on its topic rather than dropped.
//!
//! Step 3 is what keeps several handler instances (or a handler and an
//! operator) from losing each other's updates. Because dispatch is recorded
//! on the plan before the requests are published, a processor is dispatched
//! at most once per attempt even when two completions race.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::engine::dispatcher::Dispatcher;
use crate::engine::state::{self, Action, Applied, Effects};
use crate::errors::{BusError, StatusError};
use crate::messaging::{Message, MessageBus, StartFailure, StatusEvent, Topic};
use crate::model::{ProcessorState, RunPlan, RunPlanState};
use crate::observability::messages::engine::{
    PhaseRedispatched, RunPlanStarted, RunPlanTransition, StartFailureIgnored, StatusConflictRetry,
    StatusEventIgnored, StatusHandlingFailed,
};
use crate::observability::messages::messaging::{MessageDropped, SubscriptionOpened};
use crate::observability::messages::StructuredLog;
use crate::store::{EnvelopeStore, RunPlanStore};

enum Written {
    Changed(RunPlan, Effects),
    Ignored(RunPlan),
}

pub struct StatusHandler {
    run_plans: Arc<dyn RunPlanStore>,
    envelopes: Arc<dyn EnvelopeStore>,
    dispatcher: Dispatcher,
    max_conflict_retries: u32,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StatusHandler {
    pub fn new(
        run_plans: Arc<dyn RunPlanStore>,
        envelopes: Arc<dyn EnvelopeStore>,
        dispatcher: Dispatcher,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            run_plans,
            envelopes,
            dispatcher,
            max_conflict_retries,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// CREATED → STARTING and dispatch the first phase.
    pub async fn start_run(&self, run_plan_id: &str) -> Result<RunPlan, StatusError> {
        let plan = self.update(run_plan_id, Action::Begin).await?;
        RunPlanStarted {
            run_plan_id: &plan.id,
            dataflow_id: &plan.dataflow_id,
            first_phase: plan.first_phase(),
        }
        .log();
        Ok(plan)
    }

    pub async fn receive_status(&self, event: &StatusEvent) -> Result<RunPlan, StatusError> {
        self.update(&event.run_plan_id, Action::Status(event)).await
    }

    pub async fn receive_start_failure(&self, failure: &StartFailure) -> Result<RunPlan, StatusError> {
        self.update(&failure.run_plan_id, Action::StartFailure(failure)).await
    }

    /// Stop the run and tell every worker to abandon its work for it.
    pub async fn receive_stop(&self, run_plan_id: &str, reason: Option<&str>) -> Result<RunPlan, StatusError> {
        self.update(run_plan_id, Action::Stop(reason)).await
    }

    /// Resume a FAILED or STOPPED run from its lowest unsuccessful phase.
    pub async fn redispatch_failed_phase(&self, run_plan_id: &str) -> Result<RunPlan, StatusError> {
        let plan = self.update(run_plan_id, Action::Redispatch).await?;
        if let Some(phase) = plan.current_phase {
            let reset_count = plan
                .phases
                .range(phase..)
                .flat_map(|(_, ids)| ids.iter())
                .filter(|id| plan.status(id).map_or(false, |s| s.state == ProcessorState::Pending))
                .count();
            PhaseRedispatched {
                run_plan_id: &plan.id,
                phase,
                reset_count,
            }
            .log();
        }
        Ok(plan)
    }

    /// Consume status and start-failure events until `shutdown` fires.
    ///
    /// Each message is applied on its own task; ordering between messages for
    /// the same plan is restored by the per-plan lock and the state machine's
    /// tolerance for out-of-order events.
    pub async fn run(
        self: Arc<Self>,
        bus: Arc<dyn MessageBus>,
        subscription: String,
        shutdown: CancellationToken,
    ) -> Result<(), BusError> {
        let mut statuses = bus.subscribe(Topic::RunPlanStatus, &subscription).await?;
        SubscriptionOpened {
            topic: Topic::RunPlanStatus,
            subscription: &subscription,
        }
        .log();
        let mut failures = bus.subscribe(Topic::RunPlanStartFailure, &subscription).await?;
        SubscriptionOpened {
            topic: Topic::RunPlanStartFailure,
            subscription: &subscription,
        }
        .log();

        loop {
            let (topic, received) = tokio::select! {
                _ = shutdown.cancelled() => break,
                m = statuses.next() => (Topic::RunPlanStatus, m),
                m = failures.next() => (Topic::RunPlanStartFailure, m),
            };

            match received {
                None => break,
                Some(Err(error)) => {
                    tracing::warn!(topic = %topic, "{}", MessageDropped { topic, reason: &error });
                }
                Some(Ok(message)) => {
                    let handler = self.clone();
                    tokio::spawn(async move { handler.handle(topic, message).await });
                }
            }
        }
        Ok(())
    }

    async fn handle(&self, topic: Topic, message: Message) {
        let result = match &message {
            Message::Status(event) => self.receive_status(event).await,
            Message::StartFailure(failure) => self.receive_start_failure(failure).await,
            _ => {
                let error = BusError::UnexpectedMessage {
                    topic: topic.to_string(),
                    expected: "status or start_failure",
                };
                tracing::warn!(topic = %topic, "{}", MessageDropped { topic, reason: &error });
                return;
            }
        };
        match result {
            Ok(_) => {}
            // the event must not be lost: hand it back to the bus
            Err(StatusError::ConflictRetriesExhausted { .. }) => {
                if let Err(error) = self.dispatcher.requeue(topic, &message).await {
                    StatusHandlingFailed {
                        run_plan_id: message.run_plan_id(),
                        error: &error,
                    }
                    .log();
                }
            }
            Err(error) => StatusHandlingFailed {
                run_plan_id: message.run_plan_id(),
                error: &error,
            }
            .log(),
        }
    }

    async fn update(&self, run_plan_id: &str, action: Action<'_>) -> Result<RunPlan, StatusError> {
        let lock = self.lock_for(run_plan_id).await;
        let _guard = lock.lock().await;

        let mut written = self.write(run_plan_id, action).await?;
        loop {
            let (plan, effects) = match written {
                Written::Ignored(plan) => return Ok(plan),
                Written::Changed(plan, effects) => (plan, effects),
            };

            match self.dispatcher.dispatch_processors(&plan, &effects.dispatch).await {
                Ok(()) => {
                    self.after_write(&plan, &effects).await;
                    return Ok(plan);
                }
                Err(error) => {
                    let message = error.to_string();
                    let failure = Action::DispatchFailure {
                        processor_id: error.processor_id(),
                        error: &message,
                    };
                    written = self.write(run_plan_id, failure).await?;
                }
            }
        }
    }

    /// Read, apply and compare-and-swap until the write lands or retries run out.
    async fn write(&self, run_plan_id: &str, action: Action<'_>) -> Result<Written, StatusError> {
        let mut conflicts = 0;
        loop {
            let mut plan = self.run_plans.get_run_plan(run_plan_id).await?;
            let from = plan.state;

            let effects = match state::apply(&mut plan, action)? {
                Applied::Ignored(reason) => {
                    log_ignored(&plan, action, reason);
                    return Ok(Written::Ignored(plan));
                }
                Applied::Changed(effects) => effects,
            };

            match self.run_plans.update_run_plan(plan).await {
                Ok(written) => {
                    if written.state != from {
                        RunPlanTransition {
                            run_plan_id: &written.id,
                            from,
                            to: written.state,
                            reason: effects.reason.as_deref(),
                        }
                        .log();
                    }
                    return Ok(Written::Changed(written, effects));
                }
                Err(error) if error.is_conflict() => {
                    conflicts += 1;
                    if conflicts > self.max_conflict_retries {
                        return Err(StatusError::ConflictRetriesExhausted {
                            run_plan_id: run_plan_id.to_string(),
                            attempts: conflicts,
                        });
                    }
                    StatusConflictRetry {
                        run_plan_id,
                        attempt: conflicts,
                        error: &error,
                    }
                    .log();
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn after_write(&self, plan: &RunPlan, effects: &Effects) {
        if effects.broadcast_stop {
            if let Err(error) = self.dispatcher.broadcast_stop(&plan.id, effects.reason.as_deref()).await {
                tracing::warn!(
                    run_plan_id = %plan.id,
                    error = %error,
                    "Could not broadcast stop for run plan '{}'", plan.id
                );
            }
        }

        // failed and stopped runs keep their outputs for a later re-dispatch
        if plan.state == RunPlanState::Success {
            if let Err(error) = self.envelopes.discard_run(&plan.id).await {
                tracing::warn!(
                    run_plan_id = %plan.id,
                    error = %error,
                    "Could not discard envelopes of run plan '{}'", plan.id
                );
            }
        }

        if plan.state.is_terminal() {
            self.locks.lock().await.remove(&plan.id);
        }
    }

    async fn lock_for(&self, run_plan_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(run_plan_id.to_string())
            .or_default()
            .clone()
    }
}

fn log_ignored(plan: &RunPlan, action: Action<'_>, reason: &str) {
    match action {
        Action::Status(event) => StatusEventIgnored {
            run_plan_id: &plan.id,
            processor_id: &event.processor_id,
            state: event.state,
            reason,
        }
        .log(),
        Action::StartFailure(_) => {
            let message = StartFailureIgnored {
                run_plan_id: &plan.id,
                state: plan.state,
                reason,
            };
            tracing::warn!(run_plan_id = %plan.id, "{}", message);
        }
        _ => tracing::debug!(run_plan_id = %plan.id, "Ignored request for run plan '{}': {}", plan.id, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_with_id;
    use crate::config::DispatchConfig;
    use crate::errors::StoreError;
    use crate::messaging::{InMemoryBus, ProcessRequest, Subscription};
    use crate::model::{DataEnvelope, Dataflow, Processor, ProcessorType};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Lets a concurrent writer win the next `conflicts` updates.
    struct ConflictingStore {
        inner: InMemoryStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl RunPlanStore for ConflictingStore {
        async fn get_run_plan(&self, id: &str) -> Result<RunPlan, StoreError> {
            self.inner.get_run_plan(id).await
        }

        async fn run_plans_for_dataflow(&self, dataflow_id: &str) -> Result<Vec<RunPlan>, StoreError> {
            self.inner.run_plans_for_dataflow(dataflow_id).await
        }

        async fn create_run_plan(&self, plan: RunPlan) -> Result<RunPlan, StoreError> {
            self.inner.create_run_plan(plan).await
        }

        async fn update_run_plan(&self, plan: RunPlan) -> Result<RunPlan, StoreError> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                let current = self.inner.get_run_plan(&plan.id).await?;
                self.inner.update_run_plan(current).await?;
            }
            self.inner.update_run_plan(plan).await
        }

        async fn delete_run_plan(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_run_plan(id).await
        }
    }

    fn transform(id: &str, phase: i64, inputs: &[&str]) -> Processor {
        Processor::new(id, id, ProcessorType::Transform, phase)
            .with_inputs(inputs)
            .with_property("operation", "TRIM")
    }

    /// a(0), b(0) → c(1)
    fn dataflow() -> Dataflow {
        let mut dataflow = Dataflow::new("df", "flow");
        dataflow.processors = vec![transform("a", 0, &[]), transform("b", 0, &[]), transform("c", 1, &["a", "b"])];
        dataflow
    }

    fn policy() -> DispatchConfig {
        DispatchConfig {
            max_attempts: Some(2),
            initial_backoff_ms: Some(1),
            max_backoff_ms: Some(2),
        }
    }

    struct Fixture {
        bus: Arc<InMemoryBus>,
        store: Arc<ConflictingStore>,
        handler: Arc<StatusHandler>,
        requests: Subscription,
    }

    async fn fixture(max_conflict_retries: u32) -> Fixture {
        let bus = Arc::new(InMemoryBus::new("test"));
        let requests = bus.subscribe(Topic::ProcessRequest, "processors").await.unwrap();
        let store = Arc::new(ConflictingStore {
            inner: InMemoryStore::new(),
            conflicts: AtomicU32::new(0),
        });
        let envelopes = Arc::new(InMemoryStore::new());
        store
            .create_run_plan(compile_with_id(&dataflow(), "run".into()).unwrap())
            .await
            .unwrap();
        let handler = Arc::new(StatusHandler::new(
            store.clone(),
            envelopes,
            Dispatcher::new(bus.clone(), policy()),
            max_conflict_retries,
        ));
        Fixture {
            bus,
            store,
            handler,
            requests,
        }
    }

    fn drain(requests: &mut Subscription) -> Vec<ProcessRequest> {
        let mut drained = Vec::new();
        while let Some(Ok(Message::ProcessRequest(request))) = requests.try_next() {
            drained.push(request);
        }
        drained
    }

    fn success(request: &ProcessRequest) -> StatusEvent {
        StatusEvent::new(request, ProcessorState::Success)
            .with_traces(vec![DataEnvelope::new(&request.run_plan_id).trace()])
    }

    #[tokio::test]
    async fn start_dispatches_first_phase() {
        let mut f = fixture(3).await;
        let plan = f.handler.start_run("run").await.unwrap();
        assert_eq!(plan.state, RunPlanState::Starting);

        let ids: Vec<String> = drain(&mut f.requests).into_iter().map(|r| r.processor.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_completions_dispatch_next_phase_once() {
        let mut f = fixture(3).await;
        f.handler.start_run("run").await.unwrap();
        let requests = drain(&mut f.requests);
        let (a, b) = (success(&requests[0]), success(&requests[1]));

        let (ra, rb) = tokio::join!(f.handler.receive_status(&a), f.handler.receive_status(&b));
        ra.unwrap();
        rb.unwrap();

        let next: Vec<String> = drain(&mut f.requests).into_iter().map(|r| r.processor.id).collect();
        assert_eq!(next, vec!["c".to_string()]);
        let plan = f.store.get_run_plan("run").await.unwrap();
        assert_eq!(plan.current_phase, Some(1));
        assert_eq!(plan.status("a").unwrap().traces.len(), 1);
    }

    #[tokio::test]
    async fn conflicts_are_retried_against_fresh_state() {
        let mut f = fixture(3).await;
        f.handler.start_run("run").await.unwrap();
        let requests = drain(&mut f.requests);

        f.store.conflicts.store(2, Ordering::SeqCst);
        let plan = f.handler.receive_status(&success(&requests[0])).await.unwrap();
        assert_eq!(plan.status("a").unwrap().state, ProcessorState::Success);
    }

    #[tokio::test]
    async fn exhausted_conflict_retries_requeue_the_event() {
        let mut f = fixture(1).await;
        let shutdown = CancellationToken::new();
        let listener = tokio::spawn(f.handler.clone().run(f.bus.clone(), "status".into(), shutdown.clone()));
        f.handler.start_run("run").await.unwrap();
        let requests = drain(&mut f.requests);

        // a direct call gives up after the configured retries
        f.store.conflicts.store(5, Ordering::SeqCst);
        let err = f.handler.receive_status(&success(&requests[0])).await.unwrap_err();
        assert!(matches!(err, StatusError::ConflictRetriesExhausted { attempts: 2, .. }), "got {:?}", err);

        // over the bus the same event keeps coming back until it lands
        f.store.conflicts.store(5, Ordering::SeqCst);
        f.bus
            .publish(Topic::RunPlanStatus, &Message::from(success(&requests[0])))
            .await
            .unwrap();

        let mut state = ProcessorState::Pending;
        for _ in 0..200 {
            state = f.store.get_run_plan("run").await.unwrap().status("a").unwrap().state;
            if state == ProcessorState::Success {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(state, ProcessorState::Success);
        assert_eq!(f.store.conflicts.load(Ordering::SeqCst), 0);

        shutdown.cancel();
        listener.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_dispatch_fails_the_run() {
        let mut f = fixture(3).await;
        f.handler.start_run("run").await.unwrap();
        let requests = drain(&mut f.requests);
        f.handler.receive_status(&success(&requests[0])).await.unwrap();

        f.bus.set_available(false);
        let plan = f.handler.receive_status(&success(&requests[1])).await.unwrap();
        assert_eq!(plan.state, RunPlanState::Failed);
        assert_eq!(plan.status("c").unwrap().state, ProcessorState::Failed);
        assert!(plan.error.is_some());
    }

    #[tokio::test]
    async fn first_phase_dispatch_failure_never_reaches_running() {
        let f = fixture(3).await;
        f.bus.set_available(false);
        let plan = f.handler.start_run("run").await.unwrap();
        assert_eq!(plan.state, RunPlanState::Failed);
        assert!(plan.started_at.is_some());
    }

    #[tokio::test]
    async fn stop_is_broadcast() {
        let f = fixture(3).await;
        let mut stops = f.bus.subscribe(Topic::RunPlanStopRequest, "processor-x").await.unwrap();
        f.handler.start_run("run").await.unwrap();

        let plan = f.handler.receive_stop("run", Some("operator")).await.unwrap();
        assert_eq!(plan.state, RunPlanState::Stopped);
        match stops.try_next() {
            Some(Ok(Message::StopRequest(stop))) => assert_eq!(stop.run_plan_id, "run"),
            other => panic!("expected a stop request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn listener_applies_bus_events() {
        let mut f = fixture(3).await;
        let shutdown = CancellationToken::new();
        let listener = tokio::spawn(f.handler.clone().run(f.bus.clone(), "status".into(), shutdown.clone()));

        f.handler.start_run("run").await.unwrap();
        let requests = drain(&mut f.requests);
        let running = StatusEvent::new(&requests[0], ProcessorState::Running);
        f.bus.publish(Topic::RunPlanStatus, &Message::from(running)).await.unwrap();

        let mut state = RunPlanState::Starting;
        for _ in 0..100 {
            state = f.store.get_run_plan("run").await.unwrap().state;
            if state == RunPlanState::Running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(state, RunPlanState::Running);

        shutdown.cancel();
        listener.await.unwrap().unwrap();
    }
}
