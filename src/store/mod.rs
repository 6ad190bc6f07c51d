// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Document store collaborators.
//!
//! Three narrow traits: Dataflow definitions, RunPlans, and the output
//! envelopes workers hand to each other between processors. RunPlan updates
//! are compare-and-swap on [`RunPlan::version`](crate::model::RunPlan): a write
//! succeeds only if the stored version still equals the version the caller
//! read, and the store bumps it on success.

pub mod memory;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::model::{DataEnvelope, Dataflow, RunPlan};

pub use memory::InMemoryStore;

#[async_trait]
pub trait DataflowStore: Send + Sync {
    async fn get_dataflow(&self, id: &str) -> Result<Dataflow, StoreError>;

    async fn list_dataflows(&self) -> Result<Vec<Dataflow>, StoreError>;

    async fn create_dataflow(&self, dataflow: Dataflow) -> Result<(), StoreError>;

    async fn update_dataflow(&self, dataflow: Dataflow) -> Result<(), StoreError>;

    async fn delete_dataflow(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RunPlanStore: Send + Sync {
    async fn get_run_plan(&self, id: &str) -> Result<RunPlan, StoreError>;

    /// Every run of a dataflow, oldest first.
    async fn run_plans_for_dataflow(&self, dataflow_id: &str) -> Result<Vec<RunPlan>, StoreError>;

    /// Store a new plan; returns it as stored (version 1).
    async fn create_run_plan(&self, plan: RunPlan) -> Result<RunPlan, StoreError>;

    /// Replace a plan if nobody wrote it since `plan.version` was read.
    ///
    /// # Errors
    /// `StoreError::Conflict` when the stored version differs.
    async fn update_run_plan(&self, plan: RunPlan) -> Result<RunPlan, StoreError>;

    async fn delete_run_plan(&self, id: &str) -> Result<(), StoreError>;

    async fn latest_run_plan_for_dataflow(&self, dataflow_id: &str) -> Result<Option<RunPlan>, StoreError> {
        Ok(self.run_plans_for_dataflow(dataflow_id).await?.pop())
    }
}

#[async_trait]
pub trait EnvelopeStore: Send + Sync {
    /// Replace the outputs recorded for a processor of a run.
    async fn put_outputs(
        &self,
        run_plan_id: &str,
        processor_id: &str,
        envelopes: Vec<DataEnvelope>,
    ) -> Result<(), StoreError>;

    /// Outputs of a processor; `NotFound` if it never produced any.
    async fn outputs(&self, run_plan_id: &str, processor_id: &str) -> Result<Vec<DataEnvelope>, StoreError>;

    async fn discard_run(&self, run_plan_id: &str) -> Result<(), StoreError>;
}
