// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EnvelopeTrace, ProcessorRunModel, ProcessorState};

/// Work for one processor of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub run_plan_id: String,
    pub dataflow_id: String,
    /// Dispatch attempt this request belongs to; echoed back in status events.
    pub attempt: u32,
    pub processor: ProcessorRunModel,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRequest {
    pub run_plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Work dispatched before this instant belongs to the stopped attempt.
    pub requested_at: DateTime<Utc>,
}

impl StopRequest {
    pub fn new(run_plan_id: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            run_plan_id: run_plan_id.into(),
            reason,
            requested_at: Utc::now(),
        }
    }
}

/// The dispatch layer could not hand work to the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartFailure {
    pub run_plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_id: Option<String>,
    pub reason: String,
}

/// A processor changed state on some worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub run_plan_id: String,
    pub processor_id: String,
    pub attempt: u32,
    pub state: ProcessorState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub traces: Vec<EnvelopeTrace>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(request: &ProcessRequest, state: ProcessorState) -> Self {
        Self {
            run_plan_id: request.run_plan_id.clone(),
            processor_id: request.processor.id.clone(),
            attempt: request.attempt,
            state,
            error: None,
            traces: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_traces(mut self, traces: Vec<EnvelopeTrace>) -> Self {
        self.traces = traces;
        self
    }
}

/// Everything that travels over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    ProcessRequest(ProcessRequest),
    StopRequest(StopRequest),
    StartFailure(StartFailure),
    Status(StatusEvent),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ProcessRequest(_) => "process_request",
            Message::StopRequest(_) => "stop_request",
            Message::StartFailure(_) => "start_failure",
            Message::Status(_) => "status",
        }
    }

    pub fn run_plan_id(&self) -> &str {
        match self {
            Message::ProcessRequest(m) => &m.run_plan_id,
            Message::StopRequest(m) => &m.run_plan_id,
            Message::StartFailure(m) => &m.run_plan_id,
            Message::Status(m) => &m.run_plan_id,
        }
    }
}

impl From<ProcessRequest> for Message {
    fn from(m: ProcessRequest) -> Self {
        Message::ProcessRequest(m)
    }
}

impl From<StopRequest> for Message {
    fn from(m: StopRequest) -> Self {
        Message::StopRequest(m)
    }
}

impl From<StartFailure> for Message {
    fn from(m: StartFailure) -> Self {
        Message::StartFailure(m)
    }
}

impl From<StatusEvent> for Message {
    fn from(m: StatusEvent) -> Self {
        Message::Status(m)
    }
}
