// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Node configuration: how one orchestrator process talks to the bus, retries
//! dispatch, sizes its worker pool and budgets script execution.
//!
//! Every field is optional; getters fall back to the defaults in
//! [`consts`](crate::config::consts).
//!
//! # Example
//! ```toml
//! [messaging]
//! namespace = "tenant/dataflows"
//!
//! [dispatch]
//! max_attempts = 5
//! initial_backoff_ms = 50
//!
//! [worker]
//! pool_size = 8
//!
//! [script.fuel]
//! default = 200000000
//!
//! [logging]
//! filter = "dataflow_orchestrator=debug"
//! ```

use serde::Deserialize;
use std::time::Duration;

use crate::config::consts::*;

#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagingConfig {
    pub namespace: Option<String>,
    pub worker_group: Option<String>,
    pub status_group: Option<String>,
}

impl MessagingConfig {
    pub fn get_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn get_worker_group(&self) -> &str {
        self.worker_group.as_deref().unwrap_or(DEFAULT_WORKER_GROUP)
    }

    pub fn get_status_group(&self) -> &str {
        self.status_group.as_deref().unwrap_or(DEFAULT_STATUS_GROUP)
    }
}

/// Publish retry policy: exponential backoff, doubling from
/// `initial_backoff_ms` up to `max_backoff_ms`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DispatchConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

impl DispatchConfig {
    /// At least one attempt is always made.
    pub fn get_max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_DISPATCH_MAX_ATTEMPTS).max(1)
    }

    pub fn get_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms.unwrap_or(DEFAULT_DISPATCH_INITIAL_BACKOFF_MS))
    }

    pub fn get_max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.unwrap_or(DEFAULT_DISPATCH_MAX_BACKOFF_MS))
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.get_initial_backoff()
            .saturating_mul(factor)
            .min(self.get_max_backoff())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkerConfig {
    pub pool_size: Option<usize>,
    pub instances: Option<usize>,
    pub stop_retention_secs: Option<u64>,
}

impl WorkerConfig {
    /// Concurrent process requests per worker; defaults to available parallelism.
    pub fn get_pool_size(&self) -> usize {
        self.pool_size
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn get_instances(&self) -> usize {
        self.instances.unwrap_or(DEFAULT_WORKER_INSTANCES).max(1)
    }

    /// Stop records older than this are forgotten.
    pub fn get_stop_retention(&self) -> Duration {
        Duration::from_secs(self.stop_retention_secs.unwrap_or(DEFAULT_STOP_RETENTION_SECS))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusConfig {
    pub max_conflict_retries: Option<u32>,
}

impl StatusConfig {
    pub fn get_max_conflict_retries(&self) -> u32 {
        self.max_conflict_retries.unwrap_or(DEFAULT_MAX_CONFLICT_RETRIES)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScriptConfig {
    #[serde(default)]
    pub fuel: FuelConfig,
}

/// Fuel consumption limits for the script interpreter.
///
/// The maximum is a hard limit; a configured default outside
/// `[minimum, maximum]` is clamped.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FuelConfig {
    pub default: Option<u64>,
    pub minimum: Option<u64>,
    pub maximum: Option<u64>,
}

impl FuelConfig {
    pub fn get_default(&self) -> u64 {
        self.default.unwrap_or(DEFAULT_FUEL_LEVEL)
    }

    pub fn get_minimum(&self) -> u64 {
        self.minimum.unwrap_or(MIN_FUEL_LEVEL)
    }

    pub fn get_maximum(&self) -> u64 {
        self.maximum.unwrap_or(MAX_FUEL_LEVEL)
    }

    /// Clamp a requested fuel level to `[minimum, maximum]`.
    ///
    /// # Example
    /// ```
    /// use dataflow_orchestrator::config::FuelConfig;
    ///
    /// let config = FuelConfig::default();
    /// assert_eq!(config.validate_and_clamp(1_000_000_000), 500_000_000);
    /// ```
    pub fn validate_and_clamp(&self, requested: u64) -> u64 {
        let min = self.get_minimum();
        let max = self.get_maximum().max(min);
        if requested < min || requested > max {
            tracing::warn!(requested, min, max, "Fuel level out of bounds, clamping");
        }
        requested.clamp(min, max)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn get_filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let dispatch = DispatchConfig {
            max_attempts: None,
            initial_backoff_ms: Some(100),
            max_backoff_ms: Some(350),
        };
        assert_eq!(dispatch.backoff_for(1), Duration::from_millis(100));
        assert_eq!(dispatch.backoff_for(2), Duration::from_millis(200));
        assert_eq!(dispatch.backoff_for(3), Duration::from_millis(350));
        assert_eq!(dispatch.backoff_for(40), Duration::from_millis(350));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let dispatch = DispatchConfig {
            max_attempts: Some(0),
            ..Default::default()
        };
        assert_eq!(dispatch.get_max_attempts(), 1);
    }

    #[test]
    fn fuel_defaults_and_clamping() {
        let fuel = FuelConfig::default();
        assert_eq!(fuel.get_default(), 100_000_000);
        assert_eq!(fuel.get_minimum(), 1_000_000);
        assert_eq!(fuel.get_maximum(), 500_000_000);
        assert_eq!(fuel.validate_and_clamp(10), 1_000_000);
    }
}
