// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for message bus interaction.

use crate::errors::BusError;
use crate::messaging::Topic;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A publish failed and will be retried after a backoff.
///
/// # Log Level
/// `warn!` - Transient failure
pub struct PublishRetry<'a> {
    pub topic: Topic,
    pub run_plan_id: &'a str,
    pub attempt: u32,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub error: &'a BusError,
}

impl Display for PublishRetry<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Publish to '{}' for run plan '{}' failed (attempt {}/{}), retrying in {:?}: {}",
            self.topic, self.run_plan_id, self.attempt, self.max_attempts, self.backoff, self.error
        )
    }
}

impl StructuredLog for PublishRetry<'_> {
    fn log(&self) {
        tracing::warn!(
            topic = self.topic.name(),
            run_plan_id = self.run_plan_id,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
            backoff_ms = self.backoff.as_millis() as u64,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("publish_retry", span_name = name, topic = self.topic.name())
    }
}

/// Every publish attempt for a processor's work failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct DispatchExhausted<'a> {
    pub run_plan_id: &'a str,
    pub processor_id: &'a str,
    pub attempts: u32,
    pub error: &'a BusError,
}

impl Display for DispatchExhausted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Giving up dispatching processor '{}' of run plan '{}' after {} attempts: {}",
            self.processor_id, self.run_plan_id, self.attempts, self.error
        )
    }
}

impl StructuredLog for DispatchExhausted<'_> {
    fn log(&self) {
        tracing::error!(
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
            attempts = self.attempts,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "dispatch_exhausted",
            span_name = name,
            run_plan_id = self.run_plan_id,
            processor_id = self.processor_id,
        )
    }
}

/// A subscription was opened.
///
/// # Log Level
/// `debug!` - Wiring detail
pub struct SubscriptionOpened<'a> {
    pub topic: Topic,
    pub subscription: &'a str,
}

impl Display for SubscriptionOpened<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Subscribed to '{}' as '{}' ({:?})",
            self.topic,
            self.subscription,
            self.topic.delivery()
        )
    }
}

impl StructuredLog for SubscriptionOpened<'_> {
    fn log(&self) {
        tracing::debug!(
            topic = self.topic.name(),
            subscription = self.subscription,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "subscription",
            span_name = name,
            topic = self.topic.name(),
            subscription = self.subscription,
        )
    }
}

/// A received message was unusable and skipped.
///
/// # Log Level
/// `warn!` - Malformed or misrouted message
pub struct MessageDropped<'a> {
    pub topic: Topic,
    pub reason: &'a dyn std::error::Error,
}

impl Display for MessageDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Dropping message from '{}': {}", self.topic, self.reason)
    }
}
