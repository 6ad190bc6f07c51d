// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A complete orchestrator in one process: in-memory bus and stores, one
//! status handler and a configurable number of workers.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backends::wasm::{ScriptResult, WasmScriptRuntime};
use crate::config::NodeConfig;
use crate::engine::dispatcher::Dispatcher;
use crate::engine::service::ControlPlane;
use crate::engine::status_handler::StatusHandler;
use crate::errors::{BusError, ControlError};
use crate::executor::ExecutorRegistry;
use crate::messaging::InMemoryBus;
use crate::model::RunPlan;
use crate::store::{InMemoryStore, RunPlanStore};
use crate::worker::Worker;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct LocalNode {
    bus: Arc<InMemoryBus>,
    store: Arc<InMemoryStore>,
    control: ControlPlane,
    workers: Vec<Arc<Worker>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<Result<(), BusError>>>,
}

impl LocalNode {
    /// Node with the built-in executors and a wasm script runtime configured
    /// from `config.script.fuel`.
    pub fn with_builtins(config: &NodeConfig) -> ScriptResult<Self> {
        let runtime = WasmScriptRuntime::from_config(&config.script.fuel)?;
        Ok(Self::start(config, ExecutorRegistry::with_builtins(Arc::new(runtime))))
    }

    /// Wire everything up and spawn the status listener and workers.
    /// Must be called from within a tokio runtime.
    pub fn start(config: &NodeConfig, registry: ExecutorRegistry) -> Self {
        let bus = Arc::new(InMemoryBus::new(config.messaging.get_namespace()));
        let store = Arc::new(InMemoryStore::new());
        let shutdown = CancellationToken::new();

        let handler = Arc::new(StatusHandler::new(
            store.clone(),
            store.clone(),
            Dispatcher::new(bus.clone(), config.dispatch.clone()),
            config.status.get_max_conflict_retries(),
        ));

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(handler.clone().run(
            bus.clone(),
            config.messaging.get_status_group().to_string(),
            shutdown.clone(),
        )));

        let workers: Vec<Arc<Worker>> = (0..config.worker.get_instances())
            .map(|_| Arc::new(Worker::new(bus.clone(), store.clone(), registry.clone(), config)))
            .collect();
        for worker in &workers {
            tasks.push(tokio::spawn(worker.clone().run(shutdown.clone())));
        }

        let control = ControlPlane::new(store.clone(), store.clone(), store.clone(), handler);

        Self {
            bus,
            store,
            control,
            workers,
            shutdown,
            tasks,
        }
    }

    pub fn control(&self) -> &ControlPlane {
        &self.control
    }

    pub fn bus(&self) -> &Arc<InMemoryBus> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Poll until the run plan is terminal or `timeout` elapses; returns the
    /// last state read either way.
    pub async fn wait_for_terminal(&self, run_plan_id: &str, timeout: Duration) -> Result<RunPlan, ControlError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let plan = self.store.get_run_plan(run_plan_id).await?;
            if plan.state.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(plan);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Stop the listener and workers and wait for them to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => tracing::warn!(error = %error, "Node task ended with a bus error"),
                Err(error) => tracing::warn!(error = %error, "Node task panicked or was aborted"),
            }
        }
    }
}
