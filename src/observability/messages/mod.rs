// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `engine` - RunPlan lifecycle and status handling
//! * `processor` - worker and processor execution
//! * `messaging` - bus interaction

pub mod engine;
pub mod messaging;
pub mod processor;

use tracing::Span;

/// A log event that knows its own level and fields.
pub trait StructuredLog {
    /// Emit the event at its level with structured fields.
    fn log(&self);

    /// Open a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
