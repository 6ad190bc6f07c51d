// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! JSON wire encoding for bus messages.

use crate::errors::BusError;
use crate::messaging::{Message, Topic};

pub fn encode(topic: Topic, message: &Message) -> Result<Vec<u8>, BusError> {
    serde_json::to_vec(message).map_err(|source| BusError::Encode {
        topic: topic.name().to_string(),
        source,
    })
}

pub fn decode(topic: Topic, bytes: &[u8]) -> Result<Message, BusError> {
    serde_json::from_slice(bytes).map_err(|source| BusError::Decode {
        topic: topic.name().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::StopRequest;

    #[test]
    fn messages_are_tagged_by_kind() {
        let message = Message::from(StopRequest::new("run-1", None));
        let bytes = encode(Topic::RunPlanStopRequest, &message).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "stop_request");
        assert_eq!(decode(Topic::RunPlanStopRequest, &bytes).unwrap(), message);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode(Topic::RunPlanStatus, b"{not json").unwrap_err();
        assert!(matches!(err, BusError::Decode { ref topic, .. } if topic == "runplan_status"));
    }
}
