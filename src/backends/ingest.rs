// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::ExecutionError;
use crate::model::{DataEnvelope, IngestSource, ProcessorProperties, ProcessorRunModel, ProcessorType};
use crate::traits::ProcessorExecutor;

/// INGEST: replaces the envelope payload with data from a file or inline bytes.
pub struct IngestExecutor;

#[async_trait]
impl ProcessorExecutor for IngestExecutor {
    async fn execute(
        &self,
        processor: &ProcessorRunModel,
        mut envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError> {
        let payload = match &processor.properties {
            ProcessorProperties::Ingest(IngestSource::Inline { data }) => data.clone(),
            ProcessorProperties::Ingest(IngestSource::File { location }) => {
                tokio::fs::read(location)
                    .await
                    .map_err(|source| ExecutionError::Io {
                        processor_id: processor.id.clone(),
                        path: location.display().to_string(),
                        source,
                    })?
            }
            other => return Err(super::mismatched(processor, other)),
        };

        envelope.set_payload(payload);
        envelope.record_success(&processor.id);
        Ok(envelope)
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Ingest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::tests::run_model;
    use std::path::PathBuf;

    #[tokio::test]
    async fn inline_data_becomes_payload() {
        let model = run_model(
            "in",
            ProcessorProperties::Ingest(IngestSource::Inline {
                data: b"I'm Data!".to_vec(),
            }),
        );
        let out = IngestExecutor.execute(&model, DataEnvelope::new("run")).await.unwrap();
        assert_eq!(out.payload(), b"I'm Data!");
        assert_eq!(out.history().len(), 1);
        assert_eq!(out.history()[0].processor_id, "in");
    }

    #[tokio::test]
    async fn file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "from disk").unwrap();

        let model = run_model("in", ProcessorProperties::Ingest(IngestSource::File { location: path }));
        let out = IngestExecutor.execute(&model, DataEnvelope::new("run")).await.unwrap();
        assert_eq!(out.payload(), b"from disk");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let model = run_model(
            "in",
            ProcessorProperties::Ingest(IngestSource::File {
                location: PathBuf::from("/no/such/input.txt"),
            }),
        );
        let err = IngestExecutor.execute(&model, DataEnvelope::new("run")).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Io { .. }));
        assert_eq!(err.processor_id(), Some("in"));
    }
}
