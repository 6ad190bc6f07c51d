// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{BusError, StoreError};

/// Errors raised by the status handler while applying events to a RunPlan.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Processor '{processor_id}' is not part of run plan '{run_plan_id}'")]
    UnknownProcessor {
        run_plan_id: String,
        processor_id: String,
    },

    #[error("Run plan '{run_plan_id}' cannot {action} while {state}")]
    InvalidTransition {
        run_plan_id: String,
        action: &'static str,
        state: String,
    },

    /// The losing side of a concurrent update kept losing.
    #[error("Run plan '{run_plan_id}' update still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { run_plan_id: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bus(#[from] BusError),
}
