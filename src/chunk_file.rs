//! Chunk file: the batch container carrying operation deltas.
//!
//! A chunk file is canonical JSON, DEFLATE-compressed (gzip), with the shape
//! `{"deltas": [ ... ]}`. Deltas are kept as raw JSON values here; each is
//! only validated once it is paired with its operation, so one malformed
//! delta cannot take down the whole batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, SidetreeError};
use crate::map_file::{compress, decompress};

/// A parsed chunk file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChunkFile {
    deltas: Vec<Value>,
}

impl ChunkFile {
    /// Decompress and validate a chunk file.
    pub fn parse(compressed: &[u8]) -> Result<Self, SidetreeError> {
        let decompressed = decompress(compressed).map_err(|e| {
            SidetreeError::with_message(ErrorCode::ChunkFileDecompressionFailure, e.to_string())
        })?;
        let value: Value = serde_json::from_slice(&decompressed)
            .map_err(|e| SidetreeError::with_message(ErrorCode::ChunkFileNotJson, e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| SidetreeError::new(ErrorCode::ChunkFileNotJson))?;
        for key in object.keys() {
            if key != "deltas" {
                return Err(SidetreeError::with_message(
                    ErrorCode::ChunkFileHasUnknownProperty,
                    format!("unexpected property '{key}'"),
                ));
            }
        }
        let deltas = object
            .get("deltas")
            .and_then(Value::as_array)
            .ok_or_else(|| SidetreeError::new(ErrorCode::ChunkFileDeltasPropertyNotArray))?;
        Ok(Self {
            deltas: deltas.clone(),
        })
    }

    /// Build a compressed chunk file from raw deltas.
    pub fn build(deltas: Vec<Value>) -> Result<Vec<u8>, SidetreeError> {
        let model = Self { deltas };
        let canonical = serde_jcs::to_string(&model)
            .map_err(|e| SidetreeError::with_message(ErrorCode::ChunkFileNotJson, e.to_string()))?;
        compress(canonical.as_bytes()).map_err(|e| {
            SidetreeError::with_message(ErrorCode::ChunkFileDecompressionFailure, e.to_string())
        })
    }

    /// Deltas in batch order.
    pub fn deltas(&self) -> &[Value] {
        &self.deltas
    }
}
