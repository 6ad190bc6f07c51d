// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::BusError;
use crate::messaging::{codec, Message, Topic};

/// Topic-based pub/sub with at-least-once delivery.
///
/// The delivery mode of a subscription follows its topic: on a competing
/// topic every subscriber using the same subscription name shares the
/// messages; on a broadcast topic each instance subscribes under its own name.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: Topic, message: &Message) -> Result<(), BusError>;

    async fn subscribe(&self, topic: Topic, subscription: &str) -> Result<Subscription, BusError>;
}

/// A stream of encoded messages from one subscription.
#[derive(Debug)]
pub struct Subscription {
    topic: Topic,
    name: String,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(topic: Topic, name: impl Into<String>, receiver: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            topic,
            name: name.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The next message, or `None` once the bus has dropped the subscription.
    pub async fn next(&mut self) -> Option<Result<Message, BusError>> {
        let bytes = self.receiver.recv().await?;
        Some(codec::decode(self.topic, &bytes))
    }

    /// A message that is already waiting, without blocking.
    pub fn try_next(&mut self) -> Option<Result<Message, BusError>> {
        let bytes = self.receiver.try_recv().ok()?;
        Some(codec::decode(self.topic, &bytes))
    }
}
