// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! RunPlan: one compiled, executable instance of a Dataflow.
//!
//! A RunPlan owns a frozen [`ProcessorRunModel`] per processor, the phase
//! grouping derived from them and a [`ProcessorStatus`] per processor. It is
//! created by the compiler and afterwards mutated only by the status handler.
//! `version` is bumped by the store on every successful write and is what the
//! status handler compares against to detect concurrent updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::{EnvelopeTrace, ProcessorProperties, ProcessorType};

/// Aggregate state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPlanState {
    Created,
    Starting,
    Running,
    Success,
    Failed,
    Stopped,
}

impl RunPlanState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPlanState::Success | RunPlanState::Failed | RunPlanState::Stopped
        )
    }
}

impl fmt::Display for RunPlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPlanState::Created => "CREATED",
            RunPlanState::Starting => "STARTING",
            RunPlanState::Running => "RUNNING",
            RunPlanState::Success => "SUCCESS",
            RunPlanState::Failed => "FAILED",
            RunPlanState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// State of one processor within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorState {
    Pending,
    Running,
    Success,
    Failed,
    Stopped,
}

impl ProcessorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessorState::Success | ProcessorState::Failed | ProcessorState::Stopped
        )
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessorState::Pending => "PENDING",
            ProcessorState::Running => "RUNNING",
            ProcessorState::Success => "SUCCESS",
            ProcessorState::Failed => "FAILED",
            ProcessorState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Frozen snapshot of a processor definition for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorRunModel {
    pub id: String,
    pub flow_id: String,
    pub name: String,
    pub processor_type: ProcessorType,
    pub phase: u64,
    pub inputs: Vec<String>,
    pub properties: ProcessorProperties,
}

/// Status record for one processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStatus {
    pub processor_id: String,
    pub state: ProcessorState,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set once a process request for the current attempt has been published.
    #[serde(default)]
    pub dispatched: bool,
    /// Number of times work for this processor has been published.
    #[serde(default)]
    pub dispatch_count: u32,
    /// Provenance of the envelopes this processor produced or failed on.
    #[serde(default)]
    pub traces: Vec<EnvelopeTrace>,
}

impl ProcessorStatus {
    pub fn pending(processor_id: impl Into<String>) -> Self {
        Self {
            processor_id: processor_id.into(),
            state: ProcessorState::Pending,
            updated_at: Utc::now(),
            error: None,
            dispatched: false,
            dispatch_count: 0,
            traces: Vec::new(),
        }
    }

    pub fn set_state(&mut self, state: ProcessorState, error: Option<String>) {
        self.state = state;
        self.error = error;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub id: String,
    pub dataflow_id: String,
    pub state: RunPlanState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub processors: BTreeMap<String, ProcessorRunModel>,
    /// Processor ids grouped by phase, ascending.
    pub phases: BTreeMap<u64, Vec<String>>,
    pub statuses: BTreeMap<String, ProcessorStatus>,
    #[serde(default)]
    pub current_phase: Option<u64>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl RunPlan {
    pub fn first_phase(&self) -> Option<u64> {
        self.phases.keys().next().copied()
    }

    pub fn next_phase_after(&self, phase: u64) -> Option<u64> {
        self.phases
            .range(phase.saturating_add(1)..)
            .next()
            .map(|(p, _)| *p)
    }

    pub fn processor(&self, id: &str) -> Option<&ProcessorRunModel> {
        self.processors.get(id)
    }

    pub fn status(&self, id: &str) -> Option<&ProcessorStatus> {
        self.statuses.get(id)
    }

    pub fn status_mut(&mut self, id: &str) -> Option<&mut ProcessorStatus> {
        self.statuses.get_mut(id)
    }

    pub fn processor_ids_in_phase(&self, phase: u64) -> &[String] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    fn state_of(&self, id: &str) -> Option<ProcessorState> {
        self.statuses.get(id).map(|s| s.state)
    }

    /// Every processor in `phase` has reached SUCCESS.
    pub fn phase_succeeded(&self, phase: u64) -> bool {
        self.processor_ids_in_phase(phase)
            .iter()
            .all(|id| self.state_of(id) == Some(ProcessorState::Success))
    }

    /// Processors in `phase` that can be published now: PENDING, not yet
    /// dispatched, and every input that lives in the same phase has succeeded.
    /// Inputs from earlier phases are covered by phase ordering.
    pub fn runnable_in_phase(&self, phase: u64) -> Vec<String> {
        self.processor_ids_in_phase(phase)
            .iter()
            .filter(|id| {
                self.statuses
                    .get(id.as_str())
                    .map_or(false, |s| s.state == ProcessorState::Pending && !s.dispatched)
            })
            .filter(|id| {
                self.processors.get(id.as_str()).map_or(false, |model| {
                    model.inputs.iter().all(|input| {
                        let same_phase = self
                            .processors
                            .get(input)
                            .map_or(false, |upstream| upstream.phase == phase);
                        !same_phase || self.state_of(input) == Some(ProcessorState::Success)
                    })
                })
            })
            .cloned()
            .collect()
    }

    /// Aggregate state implied by the processor statuses alone.
    pub fn derived_state(&self) -> RunPlanState {
        let states: Vec<ProcessorState> = self.statuses.values().map(|s| s.state).collect();
        if states.contains(&ProcessorState::Failed) {
            RunPlanState::Failed
        } else if states.iter().all(|s| *s == ProcessorState::Success) {
            RunPlanState::Success
        } else if states.contains(&ProcessorState::Stopped) {
            RunPlanState::Stopped
        } else {
            RunPlanState::Running
        }
    }

    /// Lowest phase holding a FAILED or STOPPED processor.
    pub fn lowest_unsuccessful_phase(&self) -> Option<u64> {
        self.phases
            .iter()
            .find(|(_, ids)| {
                ids.iter().any(|id| {
                    matches!(
                        self.state_of(id),
                        Some(ProcessorState::Failed) | Some(ProcessorState::Stopped)
                    )
                })
            })
            .map(|(phase, _)| *phase)
    }

    pub fn summary(&self) -> RunPlanStatusSummary {
        let mut counts = BTreeMap::new();
        for status in self.statuses.values() {
            *counts.entry(status.state).or_insert(0usize) += 1;
        }
        RunPlanStatusSummary {
            run_plan_id: self.id.clone(),
            dataflow_id: self.dataflow_id.clone(),
            state: self.state,
            current_phase: self.current_phase,
            started_at: self.started_at,
            ended_at: self.ended_at,
            processor_counts: counts,
            error: self.error.clone(),
        }
    }
}

/// Brief status view for the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlanStatusSummary {
    pub run_plan_id: String,
    pub dataflow_id: String,
    pub state: RunPlanState,
    pub current_phase: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub processor_counts: BTreeMap<ProcessorState, usize>,
    pub error: Option<String>,
}

impl fmt::Display for RunPlanStatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run plan {} ({}): {}", self.run_plan_id, self.dataflow_id, self.state)?;
        for (state, count) in &self.processor_counts {
            write!(f, " {}={}", state, count)?;
        }
        if let Some(error) = &self.error {
            write!(f, " error=\"{}\"", error)?;
        }
        Ok(())
    }
}
