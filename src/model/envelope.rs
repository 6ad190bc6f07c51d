// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The per-unit data carrier passed through a processor chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome recorded by a processor in an envelope's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
}

/// One provenance record: which processor touched the unit, when, and how it went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub processor_id: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Payload bytes plus an append-only processing history.
///
/// Each unit of data owns exactly one envelope, so its history is the causal
/// order in which processors touched that unit. History can only grow; there
/// is no way to remove or reorder entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope {
    id: Uuid,
    run_plan_id: String,
    #[serde(with = "crate::utils::base64_bytes")]
    payload: Vec<u8>,
    history: Vec<HistoryEntry>,
}

impl DataEnvelope {
    /// An empty envelope for a processor that has no upstream inputs.
    pub fn new(run_plan_id: impl Into<String>) -> Self {
        Self::with_payload(run_plan_id, Vec::new())
    }

    pub fn with_payload(run_plan_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_plan_id: run_plan_id.into(),
            payload,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn run_plan_id(&self) -> &str {
        &self.run_plan_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn record_success(&mut self, processor_id: &str) {
        self.push(processor_id, Outcome::Success, None);
    }

    pub fn record_failure(&mut self, processor_id: &str, diagnostic: impl Into<String>) {
        self.push(processor_id, Outcome::Failure, Some(diagnostic.into()));
    }

    /// The history of this envelope, detached from its payload.
    pub fn trace(&self) -> EnvelopeTrace {
        EnvelopeTrace {
            envelope_id: self.id,
            entries: self.history.clone(),
        }
    }

    fn push(&mut self, processor_id: &str, outcome: Outcome, diagnostic: Option<String>) {
        self.history.push(HistoryEntry {
            processor_id: processor_id.to_string(),
            timestamp: Utc::now(),
            outcome,
            diagnostic,
        });
    }
}

/// Provenance of one envelope, retained on the RunPlan after the payload is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeTrace {
    pub envelope_id: Uuid,
    pub entries: Vec<HistoryEntry>,
}

impl EnvelopeTrace {
    /// Processor ids in the order they touched the envelope.
    pub fn path(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.processor_id.as_str()).collect()
    }
}
