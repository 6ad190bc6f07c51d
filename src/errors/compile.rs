// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Reasons a Dataflow cannot be compiled into a RunPlan.
///
/// Compile errors are fatal and surface before any RunPlan exists; there is
/// nothing to retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The processor graph is not executable (cycle, forward reference, ...).
    #[error("Invalid topology: {}", join_violations(.violations))]
    InvalidTopology { violations: Vec<TopologyViolation> },

    /// A processor declares a type outside the closed set.
    #[error("Unknown processor type '{processor_type}' on processor '{processor_id}'")]
    UnknownProcessorType {
        processor_id: String,
        processor_type: String,
    },

    /// A property key is not valid for the declared type, is missing, or has
    /// an unusable value.
    #[error("Invalid property '{key}' on processor '{processor_id}': {reason}")]
    InvalidProperty {
        processor_id: String,
        key: String,
        reason: String,
    },
}

impl CompileError {
    pub fn invalid_property(processor_id: &str, key: &str, reason: impl Into<String>) -> Self {
        CompileError::InvalidProperty {
            processor_id: processor_id.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

fn join_violations(violations: &[TopologyViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single structural problem found while validating a Dataflow's topology.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyViolation {
    #[error("Duplicate processor ID: '{processor_id}'")]
    DuplicateProcessorId { processor_id: String },

    #[error("Processor '{processor_id}' has negative phase {phase}")]
    NegativePhase { processor_id: String, phase: i64 },

    #[error("Processor '{processor_id}' references input '{missing_input}' which does not exist")]
    UnresolvedInput {
        processor_id: String,
        missing_input: String,
    },

    #[error("Processor '{processor_id}' (phase {phase}) references '{input_id}' from later phase {input_phase}")]
    ForwardReference {
        processor_id: String,
        phase: i64,
        input_id: String,
        input_phase: i64,
    },

    #[error("Cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_topology_lists_every_violation() {
        let err = CompileError::InvalidTopology {
            violations: vec![
                TopologyViolation::CyclicDependency {
                    cycle: vec!["a".into(), "b".into(), "a".into()],
                },
                TopologyViolation::NegativePhase {
                    processor_id: "c".into(),
                    phase: -1,
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("a -> b -> a"));
        assert!(msg.contains("negative phase -1"));
    }

    #[test]
    fn invalid_property_names_the_key() {
        let err = CompileError::invalid_property("collect", "colour", "not valid for COLLECT");
        assert_eq!(
            err.to_string(),
            "Invalid property 'colour' on processor 'collect': not valid for COLLECT"
        );
    }
}
