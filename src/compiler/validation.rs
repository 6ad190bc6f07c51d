// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Topology validation for Dataflow definitions.
//!
//! Checks run in a fixed order and accumulate every violation they find so a
//! user sees all structural problems at once:
//!
//! 1. **Uniqueness**: processor ids are unique within the dataflow.
//! 2. **Phases**: every phase is non-negative.
//! 3. **References**: every input resolves to a processor in the same dataflow.
//! 4. **Ordering**: no input comes from a later phase.
//! 5. **Cycles**: DFS with a recursion stack over the input graph.
//!
//! Cycle detection needs a structurally sound graph, so it is skipped when
//! uniqueness or reference checks already failed.

use std::collections::{BTreeMap, HashSet};

use crate::errors::TopologyViolation;
use crate::model::{Dataflow, Processor};

/// Validate the processor graph of a dataflow.
///
/// # Returns
/// * `Ok(())` when the graph can be compiled into phases.
/// * `Err(violations)` with every problem found, in check order.
pub fn validate_topology(dataflow: &Dataflow) -> Result<(), Vec<TopologyViolation>> {
    let mut violations = Vec::new();

    violations.extend(unique_processor_ids(dataflow));
    let structurally_sound = violations.is_empty();

    violations.extend(non_negative_phases(dataflow));

    let unresolved = unresolved_inputs(dataflow);
    let references_resolve = unresolved.is_empty();
    violations.extend(unresolved);

    if structurally_sound {
        violations.extend(forward_references(dataflow));
        if references_resolve {
            violations.extend(cycles(dataflow));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn unique_processor_ids(dataflow: &Dataflow) -> Vec<TopologyViolation> {
    let mut seen = HashSet::new();
    dataflow
        .processors
        .iter()
        .filter(|p| !seen.insert(p.id.as_str()))
        .map(|p| TopologyViolation::DuplicateProcessorId {
            processor_id: p.id.clone(),
        })
        .collect()
}

fn non_negative_phases(dataflow: &Dataflow) -> Vec<TopologyViolation> {
    dataflow
        .processors
        .iter()
        .filter(|p| p.phase < 0)
        .map(|p| TopologyViolation::NegativePhase {
            processor_id: p.id.clone(),
            phase: p.phase,
        })
        .collect()
}

fn unresolved_inputs(dataflow: &Dataflow) -> Vec<TopologyViolation> {
    let ids: HashSet<&str> = dataflow.processors.iter().map(|p| p.id.as_str()).collect();
    let mut violations = Vec::new();
    for processor in &dataflow.processors {
        for input in &processor.inputs {
            if !ids.contains(input.as_str()) {
                violations.push(TopologyViolation::UnresolvedInput {
                    processor_id: processor.id.clone(),
                    missing_input: input.clone(),
                });
            }
        }
    }
    violations
}

fn forward_references(dataflow: &Dataflow) -> Vec<TopologyViolation> {
    let by_id: BTreeMap<&str, &Processor> = dataflow
        .processors
        .iter()
        .map(|p| (p.id.as_str(), p))
        .collect();

    let mut violations = Vec::new();
    for processor in &dataflow.processors {
        for input in &processor.inputs {
            if let Some(upstream) = by_id.get(input.as_str()) {
                if upstream.phase > processor.phase {
                    violations.push(TopologyViolation::ForwardReference {
                        processor_id: processor.id.clone(),
                        phase: processor.phase,
                        input_id: input.clone(),
                        input_phase: upstream.phase,
                    });
                }
            }
        }
    }
    violations
}

/// Report the first cycle found, walking processors in declaration order.
fn cycles(dataflow: &Dataflow) -> Vec<TopologyViolation> {
    // input -> processors consuming it
    let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for processor in &dataflow.processors {
        graph.entry(processor.id.as_str()).or_default();
    }
    for processor in &dataflow.processors {
        for input in &processor.inputs {
            graph
                .entry(input.as_str())
                .or_default()
                .push(processor.id.as_str());
        }
    }

    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut path = Vec::new();

    for processor in &dataflow.processors {
        let id = processor.id.as_str();
        if visited.contains(id) {
            continue;
        }
        if let Some(cycle) = dfs(id, &graph, &mut visited, &mut on_stack, &mut path) {
            return vec![TopologyViolation::CyclicDependency { cycle }];
        }
    }
    Vec::new()
}

fn dfs<'a>(
    node: &'a str,
    graph: &BTreeMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    on_stack.insert(node);
    path.push(node);

    for &next in graph.get(node).map(Vec::as_slice).unwrap_or(&[]) {
        if on_stack.contains(next) {
            let start = path.iter().position(|n| *n == next).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(next.to_string());
            return Some(cycle);
        }
        if !visited.contains(next) {
            if let Some(cycle) = dfs(next, graph, visited, on_stack, path) {
                return Some(cycle);
            }
        }
    }

    on_stack.remove(node);
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessorType;

    fn flow(processors: Vec<Processor>) -> Dataflow {
        let mut dataflow = Dataflow::new("df", "test");
        dataflow.processors = processors;
        dataflow
    }

    fn p(id: &str, phase: i64, inputs: &[&str]) -> Processor {
        Processor::new(id, id, ProcessorType::Transform, phase).with_inputs(inputs)
    }

    #[test]
    fn valid_phased_graph() {
        let dataflow = flow(vec![p("a", 0, &[]), p("b", 0, &["a"]), p("c", 3, &["a", "b"])]);
        assert!(validate_topology(&dataflow).is_ok());
    }

    #[test]
    fn duplicate_ids() {
        let errors = validate_topology(&flow(vec![p("a", 0, &[]), p("a", 1, &[])])).unwrap_err();
        assert_eq!(
            errors,
            vec![TopologyViolation::DuplicateProcessorId {
                processor_id: "a".into()
            }]
        );
    }

    #[test]
    fn accumulates_negative_phase_and_missing_input() {
        let errors = validate_topology(&flow(vec![p("a", -1, &[]), p("b", 0, &["ghost"])])).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], TopologyViolation::NegativePhase { phase: -1, .. }));
        assert!(matches!(
            &errors[1],
            TopologyViolation::UnresolvedInput { missing_input, .. } if missing_input == "ghost"
        ));
    }

    #[test]
    fn forward_reference_across_phases() {
        let errors = validate_topology(&flow(vec![p("a", 0, &["b"]), p("b", 1, &[])])).unwrap_err();
        assert_eq!(
            errors,
            vec![TopologyViolation::ForwardReference {
                processor_id: "a".into(),
                phase: 0,
                input_id: "b".into(),
                input_phase: 1,
            }]
        );
    }

    #[test]
    fn cycle_within_a_phase() {
        let errors =
            validate_topology(&flow(vec![p("a", 0, &["c"]), p("b", 0, &["a"]), p("c", 0, &["b"])])).unwrap_err();
        match &errors[..] {
            [TopologyViolation::CyclicDependency { cycle }] => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected a single cycle, got {:?}", other),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let errors = validate_topology(&flow(vec![p("a", 0, &["a"])])).unwrap_err();
        assert_eq!(
            errors,
            vec![TopologyViolation::CyclicDependency {
                cycle: vec!["a".into(), "a".into()]
            }]
        );
    }
}
