// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Processor fleet: stateless workers consuming process requests.

pub mod runtime;

pub use runtime::Worker;
