// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// How a topic hands messages to its subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Each message goes to one member of a subscription.
    Competing,
    /// Every instance holds its own subscription and sees every message.
    Broadcast,
}

/// The named topics of the orchestration protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ProcessRequest,
    RunPlanStopRequest,
    RunPlanStartFailure,
    RunPlanStatus,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::ProcessRequest,
        Topic::RunPlanStopRequest,
        Topic::RunPlanStartFailure,
        Topic::RunPlanStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Topic::ProcessRequest => "process_request",
            Topic::RunPlanStopRequest => "runplan_stop_request",
            Topic::RunPlanStartFailure => "runplan_start_failure",
            Topic::RunPlanStatus => "runplan_status",
        }
    }

    pub fn delivery(self) -> Delivery {
        match self {
            Topic::RunPlanStopRequest => Delivery::Broadcast,
            Topic::ProcessRequest | Topic::RunPlanStartFailure | Topic::RunPlanStatus => {
                Delivery::Competing
            }
        }
    }

    /// Fully-qualified endpoint, e.g. `persistent://public/default/process_request`.
    pub fn endpoint(self, namespace: &str) -> String {
        format!("persistent://{}/{}", namespace.trim_matches('/'), self.name())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unique broadcast subscription name for one worker instance.
pub fn instance_subscription() -> String {
    format!("processor-{}", uuid::Uuid::new_v4())
}
