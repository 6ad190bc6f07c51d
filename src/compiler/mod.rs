// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dataflow → RunPlan compilation.
//!
//! Compilation is pure: it reads a [`Dataflow`] and produces a new
//! [`RunPlan`] value or a [`CompileError`]. Nothing is stored or published.
//! The resulting plan is in `CREATED` state with every processor `PENDING`
//! and every processor frozen into a [`ProcessorRunModel`], so later edits to
//! the dataflow cannot leak into an in-flight run.
//!
//! # Example
//! ```
//! use dataflow_orchestrator::compiler::compile;
//! use dataflow_orchestrator::model::{Dataflow, Processor, ProcessorState, ProcessorType};
//!
//! let mut dataflow = Dataflow::new("df", "Example");
//! dataflow.processors = vec![
//!     Processor::new("a", "Ingest", ProcessorType::Ingest, 0)
//!         .with_property("type", "INLINE")
//!         .with_property("data", "I'm Data!"),
//!     Processor::new("b", "Shout", ProcessorType::Transform, 1)
//!         .with_inputs(&["a"])
//!         .with_property("operation", "UPPERCASE"),
//! ];
//!
//! let plan = compile(&dataflow).unwrap();
//! assert_eq!(plan.processors.len(), 2);
//! assert!(plan.statuses.values().all(|s| s.state == ProcessorState::Pending));
//! ```

pub mod validation;

use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::CompileError;
use crate::model::{
    Dataflow, ProcessorProperties, ProcessorRunModel, ProcessorStatus, ProcessorType, RunPlan,
    RunPlanState,
};

pub use validation::validate_topology;

/// Compile a dataflow into a fresh RunPlan with a generated id.
pub fn compile(dataflow: &Dataflow) -> Result<RunPlan, CompileError> {
    compile_with_id(dataflow, Uuid::new_v4().to_string())
}

/// Compile a dataflow into a RunPlan with the given id.
///
/// # Errors
/// * `InvalidTopology` with every structural violation found.
/// * `UnknownProcessorType` for the first processor whose type is outside the
///   closed set.
/// * `InvalidProperty` for the first processor whose properties do not fit its
///   type.
pub fn compile_with_id(dataflow: &Dataflow, run_plan_id: String) -> Result<RunPlan, CompileError> {
    validate_topology(dataflow).map_err(|violations| CompileError::InvalidTopology { violations })?;

    let mut processors = BTreeMap::new();
    let mut phases: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    let mut statuses = BTreeMap::new();

    for processor in &dataflow.processors {
        let processor_type: ProcessorType =
            processor
                .processor_type
                .parse()
                .map_err(|_| CompileError::UnknownProcessorType {
                    processor_id: processor.id.clone(),
                    processor_type: processor.processor_type.clone(),
                })?;

        let properties =
            ProcessorProperties::parse(&processor.id, processor_type, &processor.properties)?;

        // validated non-negative above
        let phase = processor.phase.unsigned_abs();

        let flow_id = if processor.flow_id.is_empty() {
            dataflow.id.clone()
        } else {
            processor.flow_id.clone()
        };

        phases.entry(phase).or_default().push(processor.id.clone());
        statuses.insert(processor.id.clone(), ProcessorStatus::pending(processor.id.clone()));
        processors.insert(
            processor.id.clone(),
            ProcessorRunModel {
                id: processor.id.clone(),
                flow_id,
                name: processor.name.clone(),
                processor_type,
                phase,
                inputs: processor.inputs.clone(),
                properties,
            },
        );
    }

    Ok(RunPlan {
        id: run_plan_id,
        dataflow_id: dataflow.id.clone(),
        state: RunPlanState::Created,
        created_at: Utc::now(),
        started_at: None,
        ended_at: None,
        processors,
        phases,
        statuses,
        current_phase: None,
        version: 0,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TopologyViolation;
    use crate::model::{Processor, ProcessorState};

    fn ingest(id: &str, phase: i64) -> Processor {
        Processor::new(id, id, ProcessorType::Ingest, phase)
            .with_property("type", "INLINE")
            .with_property("data", "x")
    }

    fn collect(id: &str, phase: i64, inputs: &[&str]) -> Processor {
        Processor::new(id, id, ProcessorType::Collect, phase)
            .with_inputs(inputs)
            .with_property("type", "FOLDER")
            .with_property("location", "/tmp/testoutput")
    }

    #[test]
    fn one_run_model_per_processor_all_pending() {
        let mut dataflow = Dataflow::new("df", "flow");
        dataflow.processors = vec![ingest("a", 0), ingest("b", 0), collect("c", 2, &["a", "b"])];

        let plan = compile_with_id(&dataflow, "run-1".into()).unwrap();
        assert_eq!(plan.id, "run-1");
        assert_eq!(plan.state, RunPlanState::Created);
        assert_eq!(plan.processors.len(), 3);
        assert_eq!(plan.statuses.len(), 3);
        assert!(plan.statuses.values().all(|s| s.state == ProcessorState::Pending && !s.dispatched));
        assert_eq!(plan.phases.get(&0), Some(&vec!["a".to_string(), "b".to_string()]));
        assert_eq!(plan.phases.get(&2), Some(&vec!["c".to_string()]));
        assert_eq!(plan.processor("c").unwrap().flow_id, "df");
    }

    #[test]
    fn run_models_are_snapshots() {
        let mut dataflow = Dataflow::new("df", "flow");
        dataflow.processors = vec![ingest("a", 0)];
        let plan = compile(&dataflow).unwrap();

        dataflow.processors[0].name = "renamed".into();
        dataflow.processors.push(collect("c", 1, &["a"]));

        assert_eq!(plan.processor("a").unwrap().name, "a");
        assert_eq!(plan.processors.len(), 1);
    }

    #[test]
    fn forward_reference_fails_without_plan() {
        let mut dataflow = Dataflow::new("df", "flow");
        dataflow.processors = vec![collect("c", 0, &["a"]), ingest("a", 1)];
        match compile(&dataflow) {
            Err(CompileError::InvalidTopology { violations }) => {
                assert!(matches!(violations[0], TopologyViolation::ForwardReference { .. }));
            }
            other => panic!("expected InvalidTopology, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_reported() {
        let mut dataflow = Dataflow::new("df", "flow");
        let mut odd = ingest("a", 0);
        odd.processor_type = "AGGREGATE".into();
        dataflow.processors = vec![odd];
        assert_eq!(
            compile(&dataflow).unwrap_err(),
            CompileError::UnknownProcessorType {
                processor_id: "a".into(),
                processor_type: "AGGREGATE".into()
            }
        );
    }

    #[test]
    fn invalid_property_names_key() {
        let mut dataflow = Dataflow::new("df", "flow");
        dataflow.processors = vec![ingest("a", 0).with_property("bucket", "s3://x")];
        match compile(&dataflow) {
            Err(CompileError::InvalidProperty { processor_id, key, .. }) => {
                assert_eq!(processor_id, "a");
                assert_eq!(key, "bucket");
            }
            other => panic!("expected InvalidProperty, got {:?}", other),
        }
    }

    #[test]
    fn empty_dataflow_compiles_to_empty_plan() {
        let plan = compile(&Dataflow::new("df", "flow")).unwrap();
        assert!(plan.phases.is_empty());
        assert_eq!(plan.first_phase(), None);
    }
}
