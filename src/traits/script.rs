// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::backends::wasm::ScriptError;
use crate::model::ScriptSource;

/// An embedded interpreter: bytes in, bytes out.
///
/// Calls are synchronous and may block; async callers run them on the
/// blocking pool.
pub trait ScriptRuntime: Send + Sync {
    fn run(&self, source: &ScriptSource, input: &[u8]) -> Result<Vec<u8>, ScriptError>;
}
