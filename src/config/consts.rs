// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default fuel level for WASM execution (100 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 100_000_000;
/// Minimum allowed fuel level (1 million instructions)
pub const MIN_FUEL_LEVEL: u64 = 1_000_000;
/// Maximum allowed fuel level (500 million instructions) - security limit
pub const MAX_FUEL_LEVEL: u64 = 500_000_000;

/// Message bus namespace topics live under
pub const DEFAULT_NAMESPACE: &str = "public/default";
/// Competing-consumer subscription shared by workers on `process_request`
pub const DEFAULT_WORKER_GROUP: &str = "processors";
/// Competing-consumer subscription shared by status handlers
pub const DEFAULT_STATUS_GROUP: &str = "runplan-status";

/// Publish attempts before a dispatch is declared failed
pub const DEFAULT_DISPATCH_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_DISPATCH_INITIAL_BACKOFF_MS: u64 = 100;
pub const DEFAULT_DISPATCH_MAX_BACKOFF_MS: u64 = 2_000;

/// In-process worker instances started by the binary
pub const DEFAULT_WORKER_INSTANCES: usize = 2;

/// How long a worker remembers a stop request for a run
pub const DEFAULT_STOP_RETENTION_SECS: u64 = 3_600;

/// Re-reads of a RunPlan after losing a concurrent update
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;

pub const DEFAULT_LOG_FILTER: &str = "info";
