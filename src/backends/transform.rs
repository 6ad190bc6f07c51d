// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::ExecutionError;
use crate::model::{DataEnvelope, ProcessorProperties, ProcessorRunModel, ProcessorType, TransformOperation};
use crate::traits::ProcessorExecutor;

/// TRANSFORM: text operations over a UTF-8 payload.
pub struct TransformExecutor;

impl TransformExecutor {
    fn apply(operation: &TransformOperation, input: &str) -> String {
        match operation {
            TransformOperation::Uppercase => input.to_uppercase(),
            TransformOperation::Lowercase => input.to_lowercase(),
            TransformOperation::Reverse => input.chars().rev().collect(),
            TransformOperation::Trim => input.trim().to_string(),
            TransformOperation::Prefix(prefix) => format!("{}{}", prefix, input),
            TransformOperation::Suffix(suffix) => format!("{}{}", input, suffix),
        }
    }
}

#[async_trait]
impl ProcessorExecutor for TransformExecutor {
    async fn execute(
        &self,
        processor: &ProcessorRunModel,
        mut envelope: DataEnvelope,
    ) -> Result<DataEnvelope, ExecutionError> {
        let operation = match &processor.properties {
            ProcessorProperties::Transform(operation) => operation,
            other => return Err(super::mismatched(processor, other)),
        };

        let input = std::str::from_utf8(envelope.payload())
            .map_err(|e| ExecutionError::failed(&processor.id, format!("Invalid UTF-8 input: {}", e)))?;
        let output = Self::apply(operation, input);

        envelope.set_payload(output.into_bytes());
        envelope.record_success(&processor.id);
        Ok(envelope)
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::tests::run_model;

    async fn transform(operation: TransformOperation, input: &[u8]) -> Result<DataEnvelope, ExecutionError> {
        let model = run_model("t", ProcessorProperties::Transform(operation));
        TransformExecutor
            .execute(&model, DataEnvelope::with_payload("run", input.to_vec()))
            .await
    }

    #[tokio::test]
    async fn operations() {
        let cases = [
            (TransformOperation::Uppercase, "I'm Data!", "I'M DATA!"),
            (TransformOperation::Lowercase, "I'm Data!", "i'm data!"),
            (TransformOperation::Reverse, "héllo", "olléh"),
            (TransformOperation::Trim, "  padded \n", "padded"),
            (TransformOperation::Prefix(">> ".into()), "x", ">> x"),
            (TransformOperation::Suffix("::done".into()), "x", "x::done"),
        ];
        for (operation, input, expected) in cases {
            let out = transform(operation.clone(), input.as_bytes()).await.unwrap();
            assert_eq!(out.payload(), expected.as_bytes(), "{:?}", operation);
            assert_eq!(out.history().len(), 1);
        }
    }

    #[tokio::test]
    async fn binary_payload_fails() {
        let err = transform(TransformOperation::Uppercase, &[0xff, 0xfe]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::ProcessorFailed { .. }));
    }

    #[tokio::test]
    async fn mismatched_properties_fail() {
        let model = run_model(
            "t",
            ProcessorProperties::Collect(crate::model::Destination::Folder {
                location: "/tmp".into(),
            }),
        );
        let err = TransformExecutor.execute(&model, DataEnvelope::new("run")).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InternalError { .. }));
    }
}
