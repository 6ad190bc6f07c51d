// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Domain model: Dataflow definitions, compiled RunPlans and data envelopes.

pub mod dataflow;
pub mod envelope;
pub mod properties;
pub mod run_plan;

pub use dataflow::{Dataflow, DataflowListItem, Processor, ProcessorType};
pub use envelope::{DataEnvelope, EnvelopeTrace, HistoryEntry, Outcome};
pub use properties::{
    Destination, IngestSource, ProcessorProperties, ScriptLanguage, ScriptProperties,
    ScriptSource, TransformOperation,
};
pub use run_plan::{
    ProcessorRunModel, ProcessorState, ProcessorStatus, RunPlan, RunPlanState,
    RunPlanStatusSummary,
};
