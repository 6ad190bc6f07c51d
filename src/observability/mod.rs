// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Log events are message structs rather than format strings scattered
//! through the code. Each message implements `Display` for the human-readable
//! line, and most implement [`StructuredLog`](messages::StructuredLog) so the
//! same event carries typed fields for a JSON or key/value subscriber.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - RunPlan lifecycle, phase dispatch and status handling
//! * `messages::processor` - worker and processor execution events
//! * `messages::messaging` - publish retries, subscriptions and dropped messages
//!
//! # Usage
//!
//! ```rust
//! use dataflow_orchestrator::observability::messages::StructuredLog;
//! use dataflow_orchestrator::observability::messages::engine::PhaseDispatched;
//!
//! let processors = vec!["ingest".to_string()];
//! PhaseDispatched {
//!     run_plan_id: "run-1",
//!     phase: 0,
//!     processor_ids: &processors,
//! }
//! .log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `fallback_filter` is used. Installing
/// twice is harmless and returns `false` the second time.
pub fn init_tracing(fallback_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter))
        .unwrap_or_else(|_| EnvFilter::new(crate::config::consts::DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
