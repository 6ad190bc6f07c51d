// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;      // processor executors + wasm interpreter
pub mod compiler;      // dataflow -> run plan
pub mod config;        // node config + dataflow loading
pub mod engine;        // status handler, dispatch, control plane
pub mod errors;        // error handling
pub mod executor;      // executor registry + envelope chains
pub mod messaging;     // topics, wire messages, bus
pub mod model;         // dataflow, run plan, envelope types
pub mod observability;
pub mod store;         // persistence seams
pub mod traits;        // unified abstractions
pub mod utils;
pub mod worker;        // processor fleet
