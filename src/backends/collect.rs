// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::errors::ExecutionError;
use crate::model::{DataEnvelope, Destination, ProcessorProperties, ProcessorRunModel, ProcessorType};
use crate::traits::ProcessorExecutor;

/// COLLECT: writes the payload to a destination, leaving it unchanged.
///
/// Folder destinations get one file per envelope,
/// `<location>/<run_plan_id>-<envelope_id>.dat`, so redelivered work for the
/// same unit overwrites instead of duplicating.
pub struct CollectExecutor;

impl CollectExecutor {
    pub fn file_name(envelope: &DataEnvelope) -> String {
        format!("{}-{}.dat", envelope.run_plan_id(), envelope.id())
    }

    async fn write_folder(
        processor: &ProcessorRunModel,
        location: &Path,
        envelope: &DataEnvelope,
    ) -> Result<PathBuf, ExecutionError> {
        let io_error = |path: &Path, source| ExecutionError::Io {
            processor_id: processor.id.clone(),
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(location)
            .await
            .map_err(|e| io_error(location, e))?;
        let target = location.join(Self::file_name(envelope));
        tokio::fs::write(&target, envelope.payload())
            .await
            .map_err(|e| io_error(&target, e))?;
        Ok(target)
    }
}

#[async_trait]
impl ProcessorExecutor for CollectExecutor {
    async fn execute(
        &self,
        processor: &ProcessorRunModel,
        mut envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError> {
        match &processor.properties {
            ProcessorProperties::Collect(Destination::Folder { location }) => {
                let target = Self::write_folder(processor, location, &envelope).await?;
                tracing::debug!(
                    processor_id = processor.id.as_str(),
                    path = %target.display(),
                    bytes = envelope.payload().len(),
                    "Collected payload"
                );
            }
            other => return Err(super::mismatched(processor, other)),
        }

        envelope.record_success(&processor.id);
        Ok(envelope)
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Collect
    }
}
