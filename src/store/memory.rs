// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::errors::StoreError;
use crate::model::{DataEnvelope, Dataflow, RunPlan};
use crate::store::{DataflowStore, EnvelopeStore, RunPlanStore};

const DATAFLOW: &str = "Dataflow";
const RUN_PLAN: &str = "RunPlan";
const OUTPUTS: &str = "Processor output";

/// Process-local implementation of every store trait.
#[derive(Default)]
pub struct InMemoryStore {
    dataflows: RwLock<HashMap<String, Dataflow>>,
    run_plans: RwLock<HashMap<String, RunPlan>>,
    envelopes: RwLock<HashMap<(String, String), Vec<DataEnvelope>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(kind: &'static str, id: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[async_trait]
impl DataflowStore for InMemoryStore {
    async fn get_dataflow(&self, id: &str) -> Result<Dataflow, StoreError> {
        self.dataflows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(DATAFLOW, id))
    }

    async fn list_dataflows(&self) -> Result<Vec<Dataflow>, StoreError> {
        let mut all: Vec<Dataflow> = self.dataflows.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn create_dataflow(&self, dataflow: Dataflow) -> Result<(), StoreError> {
        let mut dataflows = self.dataflows.write().await;
        if dataflows.contains_key(&dataflow.id) {
            return Err(StoreError::AlreadyExists {
                kind: DATAFLOW,
                id: dataflow.id,
            });
        }
        dataflows.insert(dataflow.id.clone(), dataflow);
        Ok(())
    }

    async fn update_dataflow(&self, dataflow: Dataflow) -> Result<(), StoreError> {
        let mut dataflows = self.dataflows.write().await;
        match dataflows.get_mut(&dataflow.id) {
            Some(existing) => {
                *existing = dataflow;
                Ok(())
            }
            None => Err(not_found(DATAFLOW, &dataflow.id)),
        }
    }

    async fn delete_dataflow(&self, id: &str) -> Result<(), StoreError> {
        self.dataflows
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(DATAFLOW, id))
    }
}

#[async_trait]
impl RunPlanStore for InMemoryStore {
    async fn get_run_plan(&self, id: &str) -> Result<RunPlan, StoreError> {
        self.run_plans
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(RUN_PLAN, id))
    }

    async fn run_plans_for_dataflow(&self, dataflow_id: &str) -> Result<Vec<RunPlan>, StoreError> {
        let mut plans: Vec<RunPlan> = self
            .run_plans
            .read()
            .await
            .values()
            .filter(|p| p.dataflow_id == dataflow_id)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(plans)
    }

    async fn create_run_plan(&self, mut plan: RunPlan) -> Result<RunPlan, StoreError> {
        let mut plans = self.run_plans.write().await;
        if plans.contains_key(&plan.id) {
            return Err(StoreError::AlreadyExists {
                kind: RUN_PLAN,
                id: plan.id,
            });
        }
        plan.version = 1;
        plans.insert(plan.id.clone(), plan.clone());
        Ok(plan)
    }

    async fn update_run_plan(&self, mut plan: RunPlan) -> Result<RunPlan, StoreError> {
        let mut plans = self.run_plans.write().await;
        let stored = plans.get_mut(&plan.id).ok_or_else(|| not_found(RUN_PLAN, &plan.id))?;
        if stored.version != plan.version {
            return Err(StoreError::Conflict {
                kind: RUN_PLAN,
                id: plan.id,
                expected: plan.version,
                actual: stored.version,
            });
        }
        plan.version += 1;
        *stored = plan.clone();
        Ok(plan)
    }

    async fn delete_run_plan(&self, id: &str) -> Result<(), StoreError> {
        self.run_plans
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(RUN_PLAN, id))
    }
}

#[async_trait]
impl EnvelopeStore for InMemoryStore {
    async fn put_outputs(
        &self,
        run_plan_id: &str,
        processor_id: &str,
        envelopes: Vec<DataEnvelope>,
    ) -> Result<(), StoreError> {
        self.envelopes
            .write()
            .await
            .insert((run_plan_id.to_string(), processor_id.to_string()), envelopes);
        Ok(())
    }

    async fn outputs(&self, run_plan_id: &str, processor_id: &str) -> Result<Vec<DataEnvelope>, StoreError> {
        self.envelopes
            .read()
            .await
            .get(&(run_plan_id.to_string(), processor_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(OUTPUTS, &format!("{}/{}", run_plan_id, processor_id)))
    }

    async fn discard_run(&self, run_plan_id: &str) -> Result<(), StoreError> {
        self.envelopes
            .write()
            .await
            .retain(|(run, _), _| run != run_plan_id);
        Ok(())
    }
}
