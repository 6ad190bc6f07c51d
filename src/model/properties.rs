// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed processor properties.
//!
//! Dataflow documents carry properties as a free-form string mapping whose
//! valid keys depend on the processor type. The compiler converts that mapping
//! once into a [`ProcessorProperties`] value; executors only ever see the typed
//! form and never re-validate keys.
//!
//! | Type        | Keys                                              |
//! |-------------|---------------------------------------------------|
//! | `INGEST`    | `type` (FILE, INLINE), `location`, `data`, `encoding` |
//! | `TRANSFORM` | `operation`, `value`                              |
//! | `SCRIPT`    | `language` (WASM), `code`, `location`             |
//! | `COLLECT`   | `type` (FOLDER), `location`                       |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::errors::CompileError;
use crate::model::ProcessorType;

/// Validated, per-type processor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorProperties {
    Ingest(IngestSource),
    Transform(TransformOperation),
    Script(ScriptProperties),
    Collect(Destination),
}

/// Where an INGEST processor reads its payload from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestSource {
    File {
        location: PathBuf,
    },
    Inline {
        #[serde(with = "crate::utils::base64_bytes")]
        data: Vec<u8>,
    },
}

/// The operation a TRANSFORM processor applies to a UTF-8 payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformOperation {
    Uppercase,
    Lowercase,
    Reverse,
    Trim,
    Prefix(String),
    Suffix(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptLanguage {
    Wasm,
}

/// Script source handed to the embedded interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptSource {
    /// Inline module text.
    Code(String),
    /// Path to a compiled module.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptProperties {
    pub language: ScriptLanguage,
    pub source: ScriptSource,
}

/// Where a COLLECT processor writes its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Destination {
    Folder { location: PathBuf },
}

impl ProcessorProperties {
    /// Keys accepted for each processor type.
    pub fn valid_keys(processor_type: ProcessorType) -> &'static [&'static str] {
        match processor_type {
            ProcessorType::Ingest => &["type", "location", "data", "encoding"],
            ProcessorType::Transform => &["operation", "value"],
            ProcessorType::Script => &["language", "code", "location"],
            ProcessorType::Collect => &["type", "location"],
        }
    }

    /// Validate a free-form property mapping against the declared type.
    ///
    /// # Errors
    /// `CompileError::InvalidProperty` naming the first offending key: a key
    /// that is not valid for the type, a missing required key, a non-string
    /// value, or a value outside the accepted set.
    pub fn parse(
        processor_id: &str,
        processor_type: ProcessorType,
        raw: &BTreeMap<String, Value>,
    ) -> Result<Self, CompileError> {
        let props = RawProperties::new(processor_id, processor_type, raw)?;

        match processor_type {
            ProcessorType::Ingest => props.ingest().map(ProcessorProperties::Ingest),
            ProcessorType::Transform => props.transform().map(ProcessorProperties::Transform),
            ProcessorType::Script => props.script().map(ProcessorProperties::Script),
            ProcessorType::Collect => props.collect().map(ProcessorProperties::Collect),
        }
    }

    pub fn processor_type(&self) -> ProcessorType {
        match self {
            ProcessorProperties::Ingest(_) => ProcessorType::Ingest,
            ProcessorProperties::Transform(_) => ProcessorType::Transform,
            ProcessorProperties::Script(_) => ProcessorType::Script,
            ProcessorProperties::Collect(_) => ProcessorType::Collect,
        }
    }
}

/// String view over a raw property map, with the key check already done.
struct RawProperties<'a> {
    processor_id: &'a str,
    values: BTreeMap<&'a str, &'a str>,
}

impl<'a> RawProperties<'a> {
    fn new(
        processor_id: &'a str,
        processor_type: ProcessorType,
        raw: &'a BTreeMap<String, Value>,
    ) -> Result<Self, CompileError> {
        let allowed = ProcessorProperties::valid_keys(processor_type);
        let mut values = BTreeMap::new();

        for (key, value) in raw {
            if !allowed.contains(&key.as_str()) {
                return Err(CompileError::invalid_property(
                    processor_id,
                    key,
                    format!("not a valid key for {} processors", processor_type),
                ));
            }
            let text = value.as_str().ok_or_else(|| {
                CompileError::invalid_property(processor_id, key, "expected a string value")
            })?;
            values.insert(key.as_str(), text);
        }

        Ok(Self { processor_id, values })
    }

    fn optional(&self, key: &str) -> Option<&'a str> {
        self.values.get(key).copied()
    }

    fn required(&self, key: &str) -> Result<&'a str, CompileError> {
        match self.optional(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(self.invalid(key, "must not be empty")),
            None => Err(self.invalid(key, "required but missing")),
        }
    }

    /// A required key whose value must be one of `choices` (case-insensitive).
    fn required_choice(&self, key: &str, choices: &[&'static str]) -> Result<&'static str, CompileError> {
        let value = self.required(key)?;
        self.choice(key, value, choices)
    }

    fn choice(&self, key: &str, value: &str, choices: &[&'static str]) -> Result<&'static str, CompileError> {
        choices
            .iter()
            .copied()
            .find(|c| c.eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                self.invalid(
                    key,
                    format!("'{}' is not one of {}", value, choices.join(", ")),
                )
            })
    }

    /// Keys that must be absent for the chosen variant.
    fn reject(&self, keys: &[&str], reason: &str) -> Result<(), CompileError> {
        match keys.iter().find(|k| self.values.contains_key(**k)) {
            Some(key) => Err(self.invalid(key, reason)),
            None => Ok(()),
        }
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> CompileError {
        CompileError::invalid_property(self.processor_id, key, reason)
    }

    fn ingest(&self) -> Result<IngestSource, CompileError> {
        match self.required_choice("type", &["FILE", "INLINE"])? {
            "FILE" => {
                self.reject(&["data", "encoding"], "only valid for INLINE sources")?;
                Ok(IngestSource::File {
                    location: PathBuf::from(self.required("location")?),
                })
            }
            _ => {
                self.reject(&["location"], "only valid for FILE sources")?;
                let data = self.optional("data").ok_or_else(|| self.invalid("data", "required but missing"))?;
                let encoding = match self.optional("encoding") {
                    Some(value) => self.choice("encoding", value, &["TEXT", "BASE64"])?,
                    None => "TEXT",
                };
                let bytes = if encoding == "BASE64" {
                    crate::utils::base64_bytes::decode(data)
                        .map_err(|e| self.invalid("data", format!("invalid base64: {}", e)))?
                } else {
                    data.as_bytes().to_vec()
                };
                Ok(IngestSource::Inline { data: bytes })
            }
        }
    }

    fn transform(&self) -> Result<TransformOperation, CompileError> {
        let operation = self.required_choice(
            "operation",
            &["UPPERCASE", "LOWERCASE", "REVERSE", "TRIM", "PREFIX", "SUFFIX"],
        )?;
        let needs_value = matches!(operation, "PREFIX" | "SUFFIX");
        if !needs_value {
            self.reject(&["value"], "only valid for PREFIX and SUFFIX operations")?;
        }

        Ok(match operation {
            "UPPERCASE" => TransformOperation::Uppercase,
            "LOWERCASE" => TransformOperation::Lowercase,
            "REVERSE" => TransformOperation::Reverse,
            "TRIM" => TransformOperation::Trim,
            // empty affixes are allowed, only presence is checked
            "PREFIX" => TransformOperation::Prefix(self.affix()?),
            _ => TransformOperation::Suffix(self.affix()?),
        })
    }

    fn affix(&self) -> Result<String, CompileError> {
        self.optional("value")
            .map(str::to_string)
            .ok_or_else(|| self.invalid("value", "required but missing"))
    }

    fn script(&self) -> Result<ScriptProperties, CompileError> {
        self.required_choice("language", &["WASM"])?;
        let source = match (self.optional("code"), self.optional("location")) {
            (Some(_), Some(_)) => {
                return Err(self.invalid("location", "use either 'code' or 'location', not both"))
            }
            (Some(_), None) => ScriptSource::Code(self.required("code")?.to_string()),
            (None, Some(_)) => ScriptSource::File(PathBuf::from(self.required("location")?)),
            (None, None) => return Err(self.invalid("code", "required but missing")),
        };
        Ok(ScriptProperties {
            language: ScriptLanguage::Wasm,
            source,
        })
    }

    fn collect(&self) -> Result<Destination, CompileError> {
        self.required_choice("type", &["FOLDER"])?;
        Ok(Destination::Folder {
            location: PathBuf::from(self.required("location")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn invalid_key(result: Result<ProcessorProperties, CompileError>) -> String {
        match result {
            Err(CompileError::InvalidProperty { key, .. }) => key,
            other => panic!("expected InvalidProperty, got {:?}", other),
        }
    }

    #[test]
    fn collect_folder() {
        let props = ProcessorProperties::parse(
            "c",
            ProcessorType::Collect,
            &raw(&[("type", "FOLDER"), ("location", "/tmp/testoutput")]),
        )
        .unwrap();
        assert_eq!(
            props,
            ProcessorProperties::Collect(Destination::Folder {
                location: PathBuf::from("/tmp/testoutput")
            })
        );
        assert_eq!(props.processor_type(), ProcessorType::Collect);
    }

    #[test]
    fn unknown_key_is_named() {
        let result = ProcessorProperties::parse(
            "c",
            ProcessorType::Collect,
            &raw(&[("type", "FOLDER"), ("location", "/tmp"), ("bucket", "x")]),
        );
        assert_eq!(invalid_key(result), "bucket");
    }

    #[test]
    fn missing_required_key() {
        let result = ProcessorProperties::parse("c", ProcessorType::Collect, &raw(&[("type", "FOLDER")]));
        assert_eq!(invalid_key(result), "location");
    }

    #[test]
    fn unsupported_choice() {
        let result = ProcessorProperties::parse(
            "c",
            ProcessorType::Collect,
            &raw(&[("type", "S3"), ("location", "bucket")]),
        );
        assert_eq!(invalid_key(result), "type");
    }

    #[test]
    fn non_string_value_rejected() {
        let mut map = raw(&[("operation", "PREFIX")]);
        map.insert("value".into(), Value::from(42));
        let result = ProcessorProperties::parse("t", ProcessorType::Transform, &map);
        assert_eq!(invalid_key(result), "value");
    }

    #[test]
    fn transform_prefix_requires_value() {
        let result = ProcessorProperties::parse("t", ProcessorType::Transform, &raw(&[("operation", "prefix")]));
        assert_eq!(invalid_key(result), "value");

        let props = ProcessorProperties::parse(
            "t",
            ProcessorType::Transform,
            &raw(&[("operation", "prefix"), ("value", ">> ")]),
        )
        .unwrap();
        assert_eq!(props, ProcessorProperties::Transform(TransformOperation::Prefix(">> ".into())));
    }

    #[test]
    fn transform_value_rejected_for_plain_operations() {
        let result = ProcessorProperties::parse(
            "t",
            ProcessorType::Transform,
            &raw(&[("operation", "UPPERCASE"), ("value", "x")]),
        );
        assert_eq!(invalid_key(result), "value");
    }

    #[test]
    fn ingest_inline_base64_is_decoded_once() {
        let props = ProcessorProperties::parse(
            "i",
            ProcessorType::Ingest,
            &raw(&[("type", "INLINE"), ("data", "SSdtIERhdGEh"), ("encoding", "BASE64")]),
        )
        .unwrap();
        assert_eq!(
            props,
            ProcessorProperties::Ingest(IngestSource::Inline {
                data: b"I'm Data!".to_vec()
            })
        );
    }

    #[test]
    fn ingest_bad_base64_names_data() {
        let result = ProcessorProperties::parse(
            "i",
            ProcessorType::Ingest,
            &raw(&[("type", "INLINE"), ("data", "***"), ("encoding", "BASE64")]),
        );
        assert_eq!(invalid_key(result), "data");
    }

    #[test]
    fn ingest_file_rejects_inline_keys() {
        let result = ProcessorProperties::parse(
            "i",
            ProcessorType::Ingest,
            &raw(&[("type", "FILE"), ("location", "/data/in.txt"), ("data", "x")]),
        );
        assert_eq!(invalid_key(result), "data");
    }

    #[test]
    fn script_requires_exactly_one_source() {
        let both = ProcessorProperties::parse(
            "s",
            ProcessorType::Script,
            &raw(&[("language", "WASM"), ("code", "(module)"), ("location", "m.wasm")]),
        );
        assert_eq!(invalid_key(both), "location");

        let neither = ProcessorProperties::parse("s", ProcessorType::Script, &raw(&[("language", "WASM")]));
        assert_eq!(invalid_key(neither), "code");

        let ok = ProcessorProperties::parse(
            "s",
            ProcessorType::Script,
            &raw(&[("language", "wasm"), ("location", "m.wasm")]),
        )
        .unwrap();
        assert_eq!(
            ok,
            ProcessorProperties::Script(ScriptProperties {
                language: ScriptLanguage::Wasm,
                source: ScriptSource::File(PathBuf::from("m.wasm")),
            })
        );
    }

    #[test]
    fn typed_properties_survive_json() {
        let props = ProcessorProperties::Ingest(IngestSource::Inline { data: vec![0, 159, 255] });
        let json = serde_json::to_string(&props).unwrap();
        let back: ProcessorProperties = serde_json::from_str(&json).unwrap();
        assert_eq!(back, props);
    }
}
