// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Messaging: named topics, wire messages and the bus abstraction.
//!
//! | Topic                   | Publisher          | Consumer       | Delivery  |
//! |-------------------------|--------------------|----------------|-----------|
//! | `process_request`       | dispatcher         | workers        | competing |
//! | `runplan_stop_request`  | control plane      | every worker   | broadcast |
//! | `runplan_start_failure` | dispatcher         | status handler | competing |
//! | `runplan_status`        | workers            | status handler | competing |

pub mod bus;
pub mod codec;
pub mod memory;
pub mod message;
pub mod topic;

pub use bus::{MessageBus, Subscription};
pub use memory::InMemoryBus;
pub use message::{Message, ProcessRequest, StartFailure, StatusEvent, StopRequest};
pub use topic::{instance_subscription, Delivery, Topic};
