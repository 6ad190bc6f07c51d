// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{BusError, CompileError, StatusError, StoreError};

/// Errors returned by the control-plane facade.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Dataflow '{0}' is disabled")]
    DataflowDisabled(String),

    #[error("Dataflow '{dataflow_id}' already has run plan '{run_plan_id}' in progress")]
    RunInProgress {
        dataflow_id: String,
        run_plan_id: String,
    },

    #[error("Dataflow '{0}' has never been run")]
    NoRunPlan(String),
}
