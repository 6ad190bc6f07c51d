// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process message bus.
//!
//! Each topic keeps its subscription groups in creation order. A published
//! message goes to one live member of every group, round robin within the
//! group. Broadcast topics admit one member per group, so each instance must
//! subscribe under its own name. Competing topics keep a backlog of messages
//! published while nobody was subscribed and hand it to the first group.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{mpsc, Mutex};

use crate::errors::BusError;
use crate::messaging::{codec, Delivery, Message, MessageBus, Subscription, Topic};

pub struct InMemoryBus {
    namespace: String,
    topics: Mutex<HashMap<Topic, TopicState>>,
    available: AtomicBool,
    failures_remaining: AtomicU32,
}

#[derive(Default)]
struct TopicState {
    groups: Vec<Group>,
    backlog: VecDeque<Vec<u8>>,
}

struct Group {
    name: String,
    members: Vec<mpsc::UnboundedSender<Vec<u8>>>,
    next: usize,
}

impl Group {
    fn new(name: &str, member: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            members: vec![member],
            next: 0,
        }
    }

    fn is_live(&mut self) -> bool {
        self.members.retain(|m| !m.is_closed());
        !self.members.is_empty()
    }

    /// Hand the message to the next live member; gives it back if none is left.
    fn deliver(&mut self, mut bytes: Vec<u8>) -> Result<(), Vec<u8>> {
        while self.is_live() {
            let index = self.next % self.members.len();
            self.next = index + 1;
            match self.members[index].send(bytes) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => bytes = returned,
            }
        }
        Err(bytes)
    }
}

impl InMemoryBus {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            topics: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            failures_remaining: AtomicU32::new(0),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Reject every publish while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Reject the next `count` publishes, then recover.
    pub fn fail_next_publishes(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Messages waiting for a first subscriber.
    pub async fn backlog_len(&self, topic: Topic) -> usize {
        self.topics
            .lock()
            .await
            .get(&topic)
            .map_or(0, |state| state.backlog.len())
    }

    fn check_available(&self, topic: Topic) -> Result<(), BusError> {
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected || !self.available.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable(format!(
                "{} is not accepting messages",
                topic.endpoint(&self.namespace)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: Topic, message: &Message) -> Result<(), BusError> {
        self.check_available(topic)?;
        let bytes = codec::encode(topic, message)?;

        let mut topics = self.topics.lock().await;
        let state = topics.entry(topic).or_default();

        let mut delivered = false;
        for group in state.groups.iter_mut() {
            if group.deliver(bytes.clone()).is_ok() {
                delivered = true;
            }
        }
        state.groups.retain_mut(Group::is_live);

        if !delivered && topic.delivery() == Delivery::Competing {
            state.backlog.push_back(bytes);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: Topic, subscription: &str) -> Result<Subscription, BusError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut topics = self.topics.lock().await;
        let state = topics.entry(topic).or_default();
        state.groups.retain_mut(Group::is_live);

        let existing = state.groups.iter().position(|g| g.name == subscription);
        match (topic.delivery(), existing) {
            (Delivery::Broadcast, Some(_)) => {
                return Err(BusError::SubscriptionTaken {
                    topic: topic.endpoint(&self.namespace),
                    subscription: subscription.to_string(),
                });
            }
            (Delivery::Competing, Some(index)) => state.groups[index].members.push(sender),
            (_, None) => {
                if state.groups.is_empty() {
                    for bytes in state.backlog.drain(..) {
                        // receiver is alive in this scope
                        let _ = sender.send(bytes);
                    }
                }
                state.groups.push(Group::new(subscription, sender));
            }
        }

        Ok(Subscription::new(topic, subscription, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{StartFailure, StopRequest};
    use std::time::Duration;

    fn stop(run: &str) -> Message {
        Message::from(StopRequest::new(run, None))
    }

    fn failure(run: &str) -> Message {
        Message::from(StartFailure {
            run_plan_id: run.into(),
            processor_id: None,
            reason: "test".into(),
        })
    }

    async fn next_run_id(sub: &mut Subscription) -> String {
        tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .expect("timed out")
            .expect("closed")
            .unwrap()
            .run_plan_id()
            .to_string()
    }

    fn is_empty(sub: &mut Subscription) -> bool {
        sub.try_next().is_none()
    }

    #[tokio::test]
    async fn competing_members_share_messages() {
        let bus = InMemoryBus::new("public/default");
        let mut a = bus.subscribe(Topic::RunPlanStartFailure, "handlers").await.unwrap();
        let mut b = bus.subscribe(Topic::RunPlanStartFailure, "handlers").await.unwrap();

        bus.publish(Topic::RunPlanStartFailure, &failure("1")).await.unwrap();
        bus.publish(Topic::RunPlanStartFailure, &failure("2")).await.unwrap();

        assert_eq!(next_run_id(&mut a).await, "1");
        assert_eq!(next_run_id(&mut b).await, "2");
        assert!(is_empty(&mut a));
        assert!(is_empty(&mut b));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_instance() {
        let bus = InMemoryBus::new("public/default");
        let mut a = bus.subscribe(Topic::RunPlanStopRequest, "processor-a").await.unwrap();
        let mut b = bus.subscribe(Topic::RunPlanStopRequest, "processor-b").await.unwrap();

        bus.publish(Topic::RunPlanStopRequest, &stop("run")).await.unwrap();

        assert_eq!(next_run_id(&mut a).await, "run");
        assert_eq!(next_run_id(&mut b).await, "run");
    }

    #[tokio::test]
    async fn broadcast_names_are_exclusive_while_held() {
        let bus = InMemoryBus::new("public/default");
        let held = bus.subscribe(Topic::RunPlanStopRequest, "processor-a").await.unwrap();
        let err = bus
            .subscribe(Topic::RunPlanStopRequest, "processor-a")
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::SubscriptionTaken { .. }));

        drop(held);
        assert!(bus.subscribe(Topic::RunPlanStopRequest, "processor-a").await.is_ok());
    }

    #[tokio::test]
    async fn competing_backlog_goes_to_first_subscriber() {
        let bus = InMemoryBus::new("public/default");
        bus.publish(Topic::RunPlanStartFailure, &failure("early")).await.unwrap();
        bus.publish(Topic::RunPlanStopRequest, &stop("dropped")).await.unwrap();
        assert_eq!(bus.backlog_len(Topic::RunPlanStartFailure).await, 1);
        assert_eq!(bus.backlog_len(Topic::RunPlanStopRequest).await, 0);

        let mut sub = bus.subscribe(Topic::RunPlanStartFailure, "handlers").await.unwrap();
        assert_eq!(next_run_id(&mut sub).await, "early");
        assert_eq!(bus.backlog_len(Topic::RunPlanStartFailure).await, 0);
    }

    #[tokio::test]
    async fn dropped_member_does_not_lose_messages() {
        let bus = InMemoryBus::new("public/default");
        let gone = bus.subscribe(Topic::RunPlanStartFailure, "handlers").await.unwrap();
        let mut alive = bus.subscribe(Topic::RunPlanStartFailure, "handlers").await.unwrap();
        drop(gone);

        bus.publish(Topic::RunPlanStartFailure, &failure("1")).await.unwrap();
        bus.publish(Topic::RunPlanStartFailure, &failure("2")).await.unwrap();
        assert_eq!(next_run_id(&mut alive).await, "1");
        assert_eq!(next_run_id(&mut alive).await, "2");
    }

    #[tokio::test]
    async fn injected_failures_then_recovery() {
        let bus = InMemoryBus::new("public/default");
        bus.fail_next_publishes(2);
        assert!(bus.publish(Topic::RunPlanStatus, &stop("x")).await.is_err());
        assert!(bus.publish(Topic::RunPlanStatus, &stop("x")).await.is_err());
        assert!(bus.publish(Topic::RunPlanStatus, &stop("x")).await.is_ok());

        bus.set_available(false);
        let err = bus.publish(Topic::RunPlanStatus, &stop("x")).await.unwrap_err();
        assert!(matches!(err, BusError::Unavailable(ref m) if m.contains("persistent://public/default/runplan_status")));
    }
}
