// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors surfaced by a message bus client.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Message bus unavailable: {0}")]
    Unavailable(String),

    #[error("Subscription '{subscription}' on topic '{topic}' is already held by another instance")]
    SubscriptionTaken { topic: String, subscription: String },

    #[error("Failed to encode message for topic '{topic}': {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode message from topic '{topic}': {source}")]
    Decode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected message on topic '{topic}': expected {expected}")]
    UnexpectedMessage { topic: String, expected: &'static str },
}

/// Publishing work for a RunPlan failed after every retry.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatch of processor '{processor_id}' for run plan '{run_plan_id}' failed after {attempts} attempts: {source}")]
    Exhausted {
        run_plan_id: String,
        processor_id: String,
        attempts: u32,
        #[source]
        source: BusError,
    },

    #[error("Processor '{processor_id}' is not part of run plan '{run_plan_id}'")]
    UnknownProcessor {
        run_plan_id: String,
        processor_id: String,
    },
}

impl DispatchError {
    pub fn processor_id(&self) -> &str {
        match self {
            DispatchError::Exhausted { processor_id, .. } | DispatchError::UnknownProcessor { processor_id, .. } => {
                processor_id
            }
        }
    }
}
