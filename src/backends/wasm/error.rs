// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for the embedded script interpreter.
//!
//! Every failure of a SCRIPT processor that originates inside the interpreter
//! boundary (loading, compiling, ABI mismatches, traps, fuel exhaustion) is a
//! [`ScriptError`]. The executor wraps it into an `ExecutionError::Script`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    /// Module file could not be read.
    #[error("Failed to read script module '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Module text or binary did not compile.
    #[error("Script module failed to compile: {0}")]
    Compile(String),

    /// Wasmtime engine creation or store configuration failed.
    #[error("Script engine error: {0}")]
    Engine(String),

    /// The module does not implement the expected ABI.
    #[error("Script module must export {0}")]
    MissingExport(String),

    /// The module trapped or an ABI call failed.
    #[error("Script execution failed: {0}")]
    Trap(String),

    /// The configured instruction budget ran out.
    #[error("Script exhausted its fuel budget of {fuel}")]
    FuelExhausted { fuel: u64 },

    /// Reading or writing linear memory failed, or the module returned a bad pointer.
    #[error("Script memory error: {0}")]
    Memory(String),

    #[error("Script input of {0} bytes exceeds the 32-bit ABI")]
    InputTooLarge(usize),
}

pub type ScriptResult<T> = Result<T, ScriptError>;
