// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Serde adapter that stores byte payloads as standard base64 strings.
//!
//! Payloads are opaque bytes, but every document and message in this crate is
//! JSON. Use with `#[serde(with = "crate::utils::base64_bytes")]`.
//!
//! # Example
//! ```rust
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Blob {
//!     #[serde(with = "dataflow_orchestrator::utils::base64_bytes")]
//!     data: Vec<u8>,
//! }
//!
//! let json = serde_json::to_string(&Blob { data: b"hi".to_vec() }).unwrap();
//! assert_eq!(json, r#"{"data":"aGk="}"#);
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}

/// Decode a base64 string, as used by inline ingest data.
pub fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded.trim())
}
