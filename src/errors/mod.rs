// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod compile;
mod config;
mod control;
mod execution;
mod messaging;
mod status;
mod store;

pub use compile::{CompileError, TopologyViolation};
pub use config::ConfigError;
pub use control::ControlError;
pub use execution::ExecutionError;
pub use messaging::{BusError, DispatchError};
pub use status::StatusError;
pub use store::StoreError;
