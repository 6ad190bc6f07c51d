// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Running an ordered chain of processors over one data envelope.
//!
//! Cancellation is cooperative. The token is checked before each step and
//! again after it; a step that is already running is allowed to finish, but
//! its result is discarded if a stop was observed meanwhile, so nothing is
//! appended to the history after the stop.

use tokio_util::sync::CancellationToken;

use crate::errors::ExecutionError;
use crate::executor::ExecutorRegistry;
use crate::model::{DataEnvelope, ProcessorRunModel};

#[derive(Debug)]
pub enum ChainOutcome {
    /// Every step succeeded.
    Completed(DataEnvelope),
    /// A step failed; the envelope carries a FAILURE entry for it.
    Failed {
        envelope: DataEnvelope,
        error: ExecutionError,
    },
    /// A stop was observed; the envelope is as of the last committed step.
    Stopped(DataEnvelope),
}

impl ChainOutcome {
    pub fn envelope(&self) -> &DataEnvelope {
        match self {
            ChainOutcome::Completed(envelope)
            | ChainOutcome::Failed { envelope, .. }
            | ChainOutcome::Stopped(envelope) => envelope,
        }
    }
}

pub async fn run_chain(
    registry: &ExecutorRegistry,
    processors: &[ProcessorRunModel],
    mut envelope: DataEnvelope,
    cancel: &CancellationToken,
) -> ChainOutcome {
    for processor in processors {
        if cancel.is_cancelled() {
            return ChainOutcome::Stopped(envelope);
        }

        let result = registry.execute(processor, envelope.clone()).await;

        if cancel.is_cancelled() {
            return ChainOutcome::Stopped(envelope);
        }

        match result {
            Ok(next) => envelope = next,
            Err(error) => {
                envelope.record_failure(&processor.id, error.to_string());
                return ChainOutcome::Failed { envelope, error };
            }
        }
    }
    ChainOutcome::Completed(envelope)
}
