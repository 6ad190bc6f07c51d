// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod node;

pub mod consts;

pub use loader::{load_dataflow, load_node_config, parse_dataflow, parse_node_config};
pub use node::{
    DispatchConfig, FuelConfig, LoggingConfig, MessagingConfig, NodeConfig, ScriptConfig,
    StatusConfig, WorkerConfig,
};
