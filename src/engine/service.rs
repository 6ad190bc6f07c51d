// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Operator-facing operations: dataflow CRUD and run lifecycle.
//!
//! The control plane owns no run state of its own. Starting a run compiles
//! and stores a fresh RunPlan and hands it to the [`StatusHandler`]; stopping
//! and re-dispatching are forwarded there as well.
//!
//! Starting and deleting take a per-dataflow lock, so the "no run in
//! progress" check and the write that follows cannot interleave with
//! another start on this node.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::compiler::compile;
use crate::engine::status_handler::StatusHandler;
use crate::errors::ControlError;
use crate::model::{Dataflow, DataflowListItem, Processor, RunPlan, RunPlanStatusSummary};
use crate::observability::messages::engine::RunPlanCompiled;
use crate::observability::messages::StructuredLog;
use crate::store::{DataflowStore, EnvelopeStore, RunPlanStore};

pub struct ControlPlane {
    dataflows: Arc<dyn DataflowStore>,
    run_plans: Arc<dyn RunPlanStore>,
    envelopes: Arc<dyn EnvelopeStore>,
    status: Arc<StatusHandler>,
    lifecycle: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ControlPlane {
    pub fn new(
        dataflows: Arc<dyn DataflowStore>,
        run_plans: Arc<dyn RunPlanStore>,
        envelopes: Arc<dyn EnvelopeStore>,
        status: Arc<StatusHandler>,
    ) -> Self {
        Self {
            dataflows,
            run_plans,
            envelopes,
            status,
            lifecycle: Mutex::new(HashMap::new()),
        }
    }

    /// Store a new dataflow. Processors without a `flow_id` are stamped with
    /// the dataflow's id.
    pub async fn create_dataflow(&self, mut dataflow: Dataflow) -> Result<Dataflow, ControlError> {
        stamp_flow_id(&mut dataflow);
        self.dataflows.create_dataflow(dataflow.clone()).await?;
        Ok(dataflow)
    }

    /// Replace a dataflow definition. Runs already compiled are unaffected.
    pub async fn update_dataflow(&self, mut dataflow: Dataflow) -> Result<Dataflow, ControlError> {
        stamp_flow_id(&mut dataflow);
        self.dataflows.update_dataflow(dataflow.clone()).await?;
        Ok(dataflow)
    }

    /// Delete a dataflow and its finished runs.
    ///
    /// # Errors
    /// `RunInProgress` while the dataflow's latest run has not finished.
    pub async fn delete_dataflow(&self, dataflow_id: &str) -> Result<(), ControlError> {
        let lock = self.lifecycle_lock(dataflow_id).await;
        let _guard = lock.lock().await;

        self.ensure_idle(dataflow_id).await?;
        for plan in self.run_plans.run_plans_for_dataflow(dataflow_id).await? {
            self.run_plans.delete_run_plan(&plan.id).await?;
            self.envelopes.discard_run(&plan.id).await?;
        }
        self.dataflows.delete_dataflow(dataflow_id).await?;
        self.lifecycle.lock().await.remove(dataflow_id);
        Ok(())
    }

    pub async fn get_dataflow(&self, dataflow_id: &str) -> Result<Dataflow, ControlError> {
        Ok(self.dataflows.get_dataflow(dataflow_id).await?)
    }

    /// Brief listing, optionally filtered by the enabled flag.
    pub async fn list_dataflows(&self, enabled: Option<bool>) -> Result<Vec<DataflowListItem>, ControlError> {
        Ok(self
            .dataflows
            .list_dataflows()
            .await?
            .iter()
            .filter(|d| enabled.map_or(true, |wanted| d.enabled == wanted))
            .map(Dataflow::list_item)
            .collect())
    }

    /// Processors of a dataflow, optionally only those in `phase`.
    pub async fn processors(&self, dataflow_id: &str, phase: Option<i64>) -> Result<Vec<Processor>, ControlError> {
        let dataflow = self.dataflows.get_dataflow(dataflow_id).await?;
        Ok(dataflow.processors_in_phase(phase).into_iter().cloned().collect())
    }

    /// The most recent run of a dataflow.
    pub async fn run_plan_for_dataflow(&self, dataflow_id: &str) -> Result<RunPlan, ControlError> {
        self.run_plans
            .latest_run_plan_for_dataflow(dataflow_id)
            .await?
            .ok_or_else(|| ControlError::NoRunPlan(dataflow_id.to_string()))
    }

    pub async fn run_plan(&self, run_plan_id: &str) -> Result<RunPlan, ControlError> {
        Ok(self.run_plans.get_run_plan(run_plan_id).await?)
    }

    pub async fn run_plan_status(&self, dataflow_id: &str) -> Result<RunPlanStatusSummary, ControlError> {
        Ok(self.run_plan_for_dataflow(dataflow_id).await?.summary())
    }

    /// Compile the dataflow into a new RunPlan and start it.
    ///
    /// # Errors
    /// * `DataflowDisabled` when the dataflow is switched off.
    /// * `RunInProgress` when its latest run has not finished.
    /// * `Compile` when the definition does not compile; no plan is stored.
    pub async fn start(&self, dataflow_id: &str) -> Result<RunPlan, ControlError> {
        let dataflow = self.dataflows.get_dataflow(dataflow_id).await?;
        if !dataflow.enabled {
            return Err(ControlError::DataflowDisabled(dataflow_id.to_string()));
        }

        let lock = self.lifecycle_lock(dataflow_id).await;
        let guard = lock.lock().await;
        self.ensure_idle(dataflow_id).await?;

        let plan = compile(&dataflow)?;
        RunPlanCompiled {
            run_plan_id: &plan.id,
            dataflow_id: &plan.dataflow_id,
            processor_count: plan.processors.len(),
            phase_count: plan.phases.len(),
        }
        .log();

        let plan = self.run_plans.create_run_plan(plan).await?;
        // the stored CREATED plan is what later starts see
        drop(guard);
        Ok(self.status.start_run(&plan.id).await?)
    }

    /// Stop the latest run of a dataflow.
    pub async fn stop(&self, dataflow_id: &str, reason: Option<&str>) -> Result<RunPlan, ControlError> {
        let plan = self.run_plan_for_dataflow(dataflow_id).await?;
        Ok(self.status.receive_stop(&plan.id, reason).await?)
    }

    /// Resume the latest run of a dataflow from its lowest failed phase.
    pub async fn redispatch_failed_phase(&self, dataflow_id: &str) -> Result<RunPlan, ControlError> {
        let plan = self.run_plan_for_dataflow(dataflow_id).await?;
        Ok(self.status.redispatch_failed_phase(&plan.id).await?)
    }

    async fn lifecycle_lock(&self, dataflow_id: &str) -> Arc<Mutex<()>> {
        self.lifecycle
            .lock()
            .await
            .entry(dataflow_id.to_string())
            .or_default()
            .clone()
    }

    async fn ensure_idle(&self, dataflow_id: &str) -> Result<(), ControlError> {
        match self.run_plans.latest_run_plan_for_dataflow(dataflow_id).await? {
            Some(plan) if !plan.state.is_terminal() => Err(ControlError::RunInProgress {
                dataflow_id: dataflow_id.to_string(),
                run_plan_id: plan.id,
            }),
            _ => Ok(()),
        }
    }
}

fn stamp_flow_id(dataflow: &mut Dataflow) {
    for processor in &mut dataflow.processors {
        if processor.flow_id.is_empty() {
            processor.flow_id = dataflow.id.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::engine::dispatcher::Dispatcher;
    use crate::errors::{CompileError, StoreError};
    use crate::messaging::{InMemoryBus, Message, MessageBus, Topic};
    use crate::model::{ProcessorType, RunPlanState};
    use crate::store::InMemoryStore;

    fn control() -> (Arc<InMemoryBus>, ControlPlane) {
        let bus = Arc::new(InMemoryBus::new("test"));
        let store = Arc::new(InMemoryStore::new());
        let handler = Arc::new(StatusHandler::new(
            store.clone(),
            store.clone(),
            Dispatcher::new(bus.clone(), DispatchConfig::default()),
            3,
        ));
        let control = ControlPlane::new(store.clone(), store.clone(), store, handler);
        (bus, control)
    }

    fn dataflow(id: &str) -> Dataflow {
        let mut dataflow = Dataflow::new(id, "flow");
        dataflow.processors = vec![
            Processor::new("a", "Ingest", ProcessorType::Ingest, 0)
                .with_property("type", "INLINE")
                .with_property("data", "x"),
            Processor::new("b", "Shout", ProcessorType::Transform, 1)
                .with_inputs(&["a"])
                .with_property("operation", "UPPERCASE"),
        ];
        dataflow
    }

    #[tokio::test]
    async fn create_stamps_flow_id() {
        let (_, control) = control();
        let stored = control.create_dataflow(dataflow("df")).await.unwrap();
        assert!(stored.processors.iter().all(|p| p.flow_id == "df"));
        assert_eq!(control.get_dataflow("df").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn listing_filters_by_enabled() {
        let (_, control) = control();
        control.create_dataflow(dataflow("on")).await.unwrap();
        let mut off = dataflow("off");
        off.enabled = false;
        control.create_dataflow(off).await.unwrap();

        assert_eq!(control.list_dataflows(None).await.unwrap().len(), 2);
        let enabled = control.list_dataflows(Some(true)).await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, "on");
        assert_eq!(enabled[0].processor_count, 2);
    }

    #[tokio::test]
    async fn processors_by_phase() {
        let (_, control) = control();
        control.create_dataflow(dataflow("df")).await.unwrap();
        let phase_one = control.processors("df", Some(1)).await.unwrap();
        assert_eq!(phase_one.len(), 1);
        assert_eq!(phase_one[0].id, "b");
        assert_eq!(control.processors("df", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn start_compiles_and_dispatches() {
        let (bus, control) = control();
        let mut requests = bus.subscribe(Topic::ProcessRequest, "processors").await.unwrap();
        control.create_dataflow(dataflow("df")).await.unwrap();

        let plan = control.start("df").await.unwrap();
        assert_eq!(plan.state, RunPlanState::Starting);
        assert_eq!(plan.dataflow_id, "df");
        assert!(matches!(requests.try_next(), Some(Ok(Message::ProcessRequest(r))) if r.processor.id == "a"));

        let summary = control.run_plan_status("df").await.unwrap();
        assert_eq!(summary.run_plan_id, plan.id);
    }

    #[tokio::test]
    async fn one_run_at_a_time() {
        let (_, control) = control();
        control.create_dataflow(dataflow("df")).await.unwrap();
        let first = control.start("df").await.unwrap();

        match control.start("df").await {
            Err(ControlError::RunInProgress { run_plan_id, .. }) => assert_eq!(run_plan_id, first.id),
            other => panic!("expected RunInProgress, got {:?}", other),
        }
        assert!(matches!(
            control.delete_dataflow("df").await,
            Err(ControlError::RunInProgress { .. })
        ));

        control.stop("df", None).await.unwrap();
        let second = control.start("df").await.unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(control.run_plan_for_dataflow("df").await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn concurrent_starts_create_one_run() {
        let (_, control) = control();
        control.create_dataflow(dataflow("df")).await.unwrap();

        let (first, second) = tokio::join!(control.start("df"), control.start("df"));
        let started = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(started, 1, "got {:?} and {:?}", first, second);
        assert!([first, second]
            .into_iter()
            .any(|r| matches!(r, Err(ControlError::RunInProgress { .. }))));
    }

    #[tokio::test]
    async fn disabled_dataflow_does_not_start() {
        let (_, control) = control();
        let mut df = dataflow("df");
        df.enabled = false;
        control.create_dataflow(df).await.unwrap();
        assert!(matches!(control.start("df").await, Err(ControlError::DataflowDisabled(_))));
    }

    #[tokio::test]
    async fn compile_errors_store_nothing() {
        let (_, control) = control();
        let mut df = dataflow("df");
        df.processors[1].inputs = vec!["ghost".into()];
        control.create_dataflow(df).await.unwrap();

        assert!(matches!(
            control.start("df").await,
            Err(ControlError::Compile(CompileError::InvalidTopology { .. }))
        ));
        assert!(matches!(control.run_plan_for_dataflow("df").await, Err(ControlError::NoRunPlan(_))));
    }

    #[tokio::test]
    async fn delete_removes_finished_runs() {
        let (_, control) = control();
        control.create_dataflow(dataflow("df")).await.unwrap();
        let plan = control.start("df").await.unwrap();
        control.stop("df", Some("done")).await.unwrap();

        control.delete_dataflow("df").await.unwrap();
        assert!(matches!(
            control.run_plan(&plan.id).await,
            Err(ControlError::Store(StoreError::NotFound { .. }))
        ));
        assert!(control.get_dataflow("df").await.is_err());
    }
}
