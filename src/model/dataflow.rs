// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! User-authored Dataflow definitions.
//!
//! A [`Dataflow`] is a document: it is created, edited and stored through the
//! control plane and only becomes executable once the compiler turns it into a
//! [`RunPlan`](crate::model::RunPlan). Nothing in here is validated; processor
//! types are kept as free text and properties as a free-form mapping so that
//! the compiler can report precise errors instead of the document failing to
//! deserialize.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A pipeline definition: processors grouped into ordered phases.
///
/// # Example
/// ```yaml
/// id: "orders"
/// name: "Orders"
/// enabled: true
/// processors:
///   - id: "ingest"
///     name: "Read orders"
///     type: INGEST
///     phase: 0
///     properties:
///       type: INLINE
///       data: "hello"
///   - id: "collect"
///     name: "Write orders"
///     type: COLLECT
///     phase: 1
///     inputs: ["ingest"]
///     properties:
///       type: FOLDER
///       location: /tmp/orders
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub processors: Vec<Processor>,
}

fn default_enabled() -> bool {
    true
}

impl Dataflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            creator: String::new(),
            group: String::new(),
            enabled: true,
            processors: Vec::new(),
        }
    }

    pub fn list_item(&self) -> DataflowListItem {
        DataflowListItem {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            group: self.group.clone(),
            enabled: self.enabled,
            processor_count: self.processors.len(),
        }
    }

    /// Processors of this dataflow, optionally restricted to one phase.
    pub fn processors_in_phase(&self, phase: Option<i64>) -> Vec<&Processor> {
        self.processors
            .iter()
            .filter(|p| phase.map_or(true, |wanted| p.phase == wanted))
            .collect()
    }
}

/// Listing view of a [`Dataflow`] without its processors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataflowListItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub group: String,
    pub enabled: bool,
    pub processor_count: usize,
}

/// One processor definition inside a [`Dataflow`].
///
/// `phase` is signed on purpose: definitions arrive from users and a negative
/// phase must survive deserialization so the compiler can reject it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    pub id: String,
    #[serde(default)]
    pub flow_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub processor_type: String,
    #[serde(default)]
    pub phase: i64,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Processor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        processor_type: ProcessorType,
        phase: i64,
    ) -> Self {
        Self {
            id: id.into(),
            flow_id: String::new(),
            name: name.into(),
            processor_type: processor_type.as_str().to_string(),
            phase,
            inputs: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties
            .insert(key.to_string(), serde_json::Value::String(value.to_string()));
        self
    }
}

/// The closed set of processor types the engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorType {
    Ingest,
    Transform,
    Script,
    Collect,
}

impl ProcessorType {
    pub const ALL: [ProcessorType; 4] = [
        ProcessorType::Ingest,
        ProcessorType::Transform,
        ProcessorType::Script,
        ProcessorType::Collect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorType::Ingest => "INGEST",
            ProcessorType::Transform => "TRANSFORM",
            ProcessorType::Script => "SCRIPT",
            ProcessorType::Collect => "COLLECT",
        }
    }
}

impl fmt::Display for ProcessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessorType {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ProcessorType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown processor type '{}'", s))
    }
}
