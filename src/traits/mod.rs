// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod processor;
pub mod script;

pub use processor::ProcessorExecutor;
pub use script::ScriptRuntime;
