// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! RunPlan state machine.
//!
//! Every function here mutates a [`RunPlan`] in memory and reports what the
//! caller has to do once the new version is durably written ([`Effects`]).
//! Nothing here touches a store or the bus, which keeps the transition rules
//! testable on plain values and lets the status handler re-apply them after a
//! version conflict.
//!
//! ```text
//!   CREATED ──begin──▶ STARTING ──first status──▶ RUNNING ──last phase done──▶ SUCCESS
//!                         │                          │
//!                   start failure              processor FAILED ─────────────▶ FAILED
//!                         ▼                          │
//!                       FAILED                 stop request ─────────────────▶ STOPPED
//! ```

use chrono::Utc;

use crate::errors::StatusError;
use crate::messaging::{StartFailure, StatusEvent};
use crate::model::{ProcessorState, RunPlan, RunPlanState};

/// Work to perform after a successful write.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effects {
    /// Processors whose dispatch was recorded and must now be published.
    pub dispatch: Vec<String>,
    /// Workers must abandon whatever they still run for this plan.
    pub broadcast_stop: bool,
    /// Why the run left its previous state, for the transition log.
    pub reason: Option<String>,
}

/// Outcome of applying an input to a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The plan was changed and must be written.
    Changed(Effects),
    /// Nothing changed; the input was stale, duplicated or too late.
    Ignored(&'static str),
}

/// Inputs the state machine understands.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    Begin,
    Status(&'a StatusEvent),
    StartFailure(&'a StartFailure),
    Stop(Option<&'a str>),
    DispatchFailure { processor_id: &'a str, error: &'a str },
    Redispatch,
}

pub fn apply(plan: &mut RunPlan, action: Action<'_>) -> Result<Applied, StatusError> {
    match action {
        Action::Begin => begin(plan).map(Applied::Changed),
        Action::Status(event) => apply_status(plan, event),
        Action::StartFailure(failure) => Ok(apply_start_failure(plan, failure)),
        Action::Stop(reason) => Ok(apply_stop(plan, reason)),
        Action::DispatchFailure { processor_id, error } => Ok(apply_dispatch_failure(plan, processor_id, error)),
        Action::Redispatch => redispatch_failed_phase(plan).map(Applied::Changed),
    }
}

/// CREATED → STARTING and record dispatch of the first phase's runnable
/// processors. A plan without processors completes immediately.
pub fn begin(plan: &mut RunPlan) -> Result<Effects, StatusError> {
    if plan.state != RunPlanState::Created {
        return Err(invalid(plan, "start"));
    }

    let now = Utc::now();
    plan.started_at = Some(now);

    let Some(first) = plan.first_phase() else {
        plan.state = RunPlanState::Success;
        plan.ended_at = Some(now);
        return Ok(Effects {
            reason: Some("run plan has no processors".to_string()),
            ..Effects::default()
        });
    };

    plan.state = RunPlanState::Starting;
    plan.current_phase = Some(first);
    Ok(Effects {
        dispatch: mark_dispatched(plan, first),
        ..Effects::default()
    })
}

/// Apply a processor status event.
///
/// Events are ignored when the run already finished, when they belong to an
/// earlier dispatch attempt or when the processor already reached a terminal
/// state; this is what makes redelivered events harmless.
pub fn apply_status(plan: &mut RunPlan, event: &StatusEvent) -> Result<Applied, StatusError> {
    let (phase, current) = match (plan.processor(&event.processor_id), plan.status(&event.processor_id)) {
        (Some(model), Some(status)) => (model.phase, status.clone()),
        _ => {
            return Err(StatusError::UnknownProcessor {
                run_plan_id: plan.id.clone(),
                processor_id: event.processor_id.clone(),
            })
        }
    };

    if plan.state.is_terminal() {
        return Ok(Applied::Ignored("run plan already finished"));
    }
    if plan.state == RunPlanState::Created {
        return Ok(Applied::Ignored("run plan not started"));
    }
    if event.attempt != current.dispatch_count {
        return Ok(Applied::Ignored("event belongs to an earlier dispatch"));
    }
    if current.state.is_terminal() {
        return Ok(Applied::Ignored("processor already finished"));
    }

    match event.state {
        ProcessorState::Pending => Ok(Applied::Ignored("pending is not a reportable state")),
        ProcessorState::Running => {
            if current.state == ProcessorState::Running {
                return Ok(Applied::Ignored("processor already running"));
            }
            set_processor(plan, &event.processor_id, ProcessorState::Running, None);
            mark_running(plan);
            Ok(Applied::Changed(Effects::default()))
        }
        ProcessorState::Success => {
            set_processor(plan, &event.processor_id, ProcessorState::Success, None);
            record_traces(plan, event);
            mark_running(plan);
            Ok(Applied::Changed(advance(plan, phase)))
        }
        ProcessorState::Failed => {
            let error = event
                .error
                .clone()
                .unwrap_or_else(|| "processor failed without a reason".to_string());
            set_processor(plan, &event.processor_id, ProcessorState::Failed, Some(error.clone()));
            record_traces(plan, event);
            let reason = format!("processor '{}' failed: {}", event.processor_id, error);
            Ok(Applied::Changed(finish(plan, RunPlanState::Failed, reason)))
        }
        ProcessorState::Stopped => {
            set_processor(plan, &event.processor_id, ProcessorState::Stopped, event.error.clone());
            record_traces(plan, event);
            let reason = format!("processor '{}' stopped", event.processor_id);
            Ok(Applied::Changed(finish(plan, RunPlanState::Stopped, reason)))
        }
    }
}

/// A dispatch could not be handed to the fleet. Only a run that never got
/// going is failed by this; once any processor reported, the run continues.
pub fn apply_start_failure(plan: &mut RunPlan, failure: &StartFailure) -> Applied {
    match plan.state {
        RunPlanState::Starting => {
            if let Some(processor_id) = &failure.processor_id {
                if plan.status(processor_id).is_some() {
                    set_processor(plan, processor_id, ProcessorState::Failed, Some(failure.reason.clone()));
                }
            }
            Applied::Changed(finish(plan, RunPlanState::Failed, failure.reason.clone()))
        }
        RunPlanState::Created => Applied::Ignored("run plan not started"),
        RunPlanState::Running => Applied::Ignored("run plan already running"),
        _ => Applied::Ignored("run plan already finished"),
    }
}

/// Publishing a process request failed after all retries.
pub fn apply_dispatch_failure(plan: &mut RunPlan, processor_id: &str, error: &str) -> Applied {
    if plan.state.is_terminal() {
        return Applied::Ignored("run plan already finished");
    }
    if plan.status(processor_id).is_some() {
        set_processor(plan, processor_id, ProcessorState::Failed, Some(error.to_string()));
    }
    let reason = format!("dispatch of processor '{}' failed: {}", processor_id, error);
    Applied::Changed(finish(plan, RunPlanState::Failed, reason))
}

pub fn apply_stop(plan: &mut RunPlan, reason: Option<&str>) -> Applied {
    if plan.state.is_terminal() {
        return Applied::Ignored("run plan already finished");
    }
    let reason = reason.unwrap_or("stop requested").to_string();
    Applied::Changed(finish(plan, RunPlanState::Stopped, reason))
}

/// Reset the lowest phase holding a FAILED or STOPPED processor, and every
/// unsuccessful processor after it, back to PENDING and dispatch again.
///
/// Successful processors keep their state and outputs. Dispatch counts are
/// kept so late events from the abandoned attempt stay stale.
pub fn redispatch_failed_phase(plan: &mut RunPlan) -> Result<Effects, StatusError> {
    if !matches!(plan.state, RunPlanState::Failed | RunPlanState::Stopped) {
        return Err(invalid(plan, "re-dispatch"));
    }
    let Some(phase) = plan.lowest_unsuccessful_phase() else {
        return Err(invalid(plan, "re-dispatch without an unsuccessful phase"));
    };

    let reset: Vec<String> = plan
        .phases
        .range(phase..)
        .flat_map(|(_, ids)| ids.iter().cloned())
        .collect();
    let mut reset_count = 0;
    for id in &reset {
        if let Some(status) = plan.status_mut(id) {
            if status.state != ProcessorState::Success {
                status.set_state(ProcessorState::Pending, None);
                status.dispatched = false;
                status.traces.clear();
                reset_count += 1;
            }
        }
    }

    plan.state = RunPlanState::Running;
    plan.ended_at = None;
    plan.error = None;
    plan.current_phase = Some(phase);

    Ok(Effects {
        dispatch: mark_dispatched(plan, phase),
        broadcast_stop: false,
        reason: Some(format!("re-dispatched phase {} ({} processors reset)", phase, reset_count)),
    })
}

/// After a success in `phase`: release same-phase dependents, open the next
/// phase, or finish the run.
fn advance(plan: &mut RunPlan, phase: u64) -> Effects {
    if !plan.phase_succeeded(phase) {
        return Effects {
            dispatch: mark_dispatched(plan, phase),
            ..Effects::default()
        };
    }

    match plan.next_phase_after(phase) {
        Some(next) => {
            plan.current_phase = Some(next);
            Effects {
                dispatch: mark_dispatched(plan, next),
                ..Effects::default()
            }
        }
        None => {
            plan.state = RunPlanState::Success;
            plan.ended_at = Some(Utc::now());
            Effects {
                reason: Some("all phases succeeded".to_string()),
                ..Effects::default()
            }
        }
    }
}

/// Move the run to a terminal failure state and stop every unfinished processor.
fn finish(plan: &mut RunPlan, state: RunPlanState, reason: String) -> Effects {
    let unfinished: Vec<String> = plan
        .statuses
        .values()
        .filter(|s| !s.state.is_terminal())
        .map(|s| s.processor_id.clone())
        .collect();
    for id in &unfinished {
        set_processor(plan, id, ProcessorState::Stopped, None);
    }

    plan.state = state;
    plan.ended_at = Some(Utc::now());
    if state == RunPlanState::Failed {
        plan.error = Some(reason.clone());
    }
    Effects {
        dispatch: Vec::new(),
        broadcast_stop: true,
        reason: Some(reason),
    }
}

fn mark_running(plan: &mut RunPlan) {
    if plan.state == RunPlanState::Starting {
        plan.state = RunPlanState::Running;
    }
}

fn mark_dispatched(plan: &mut RunPlan, phase: u64) -> Vec<String> {
    let runnable = plan.runnable_in_phase(phase);
    for id in &runnable {
        if let Some(status) = plan.status_mut(id) {
            status.dispatched = true;
            status.dispatch_count += 1;
        }
    }
    runnable
}

fn set_processor(plan: &mut RunPlan, id: &str, state: ProcessorState, error: Option<String>) {
    if let Some(status) = plan.status_mut(id) {
        status.set_state(state, error);
    }
}

fn record_traces(plan: &mut RunPlan, event: &StatusEvent) {
    if let Some(status) = plan.status_mut(&event.processor_id) {
        status.traces = event.traces.clone();
    }
}

fn invalid(plan: &RunPlan, action: &'static str) -> StatusError {
    StatusError::InvalidTransition {
        run_plan_id: plan.id.clone(),
        action,
        state: plan.state.to_string(),
    }
}
