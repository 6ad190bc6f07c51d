// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! WebAssembly interpreter behind the SCRIPT processor type.

pub mod error;
pub mod runtime;

pub use error::{ScriptError, ScriptResult};
pub use runtime::WasmScriptRuntime;
