// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Processor execution: executor lookup by type and chained execution over
//! one data envelope.

pub mod pipeline;
pub mod registry;

pub use pipeline::{run_chain, ChainOutcome};
pub use registry::ExecutorRegistry;
