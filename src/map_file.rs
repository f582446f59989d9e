//! Map file: the batch container anchoring update operations.
//!
//! A map file is canonical JSON, DEFLATE-compressed (gzip), with the shape
//!
//! ```json
//! {
//!   "chunks": [{ "chunkFileUri": "..." }],
//!   "operations": { "update": [{ "didSuffix": "...", "signedData": "..." }] }
//! }
//! ```
//!
//! Its parsing rules govern which update operations ever reach the operation
//! store, so validation is strict: the property set of every object is
//! checked exactly, and each violation has its own [ErrorCode].

use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::did::DIDSuffix;
use crate::error::{ErrorCode, SidetreeError};

/// Reference to the chunk file carrying this batch's deltas.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct ChunkReference {
    pub chunk_file_uri: String,
}

/// An update operation skeleton as anchored in a map file.
///
/// The delta is not here; it lives in the chunk file at the matching index.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct UpdateReference {
    pub did_suffix: DIDSuffix,
    pub signed_data: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
struct MapFileOperations {
    update: Vec<UpdateReference>,
}

/// A parsed map file.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MapFile {
    chunks: Vec<ChunkReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operations: Option<MapFileOperations>,
}

pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub(crate) fn decompress(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    use flate2::bufread::GzDecoder;
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

impl MapFile {
    /// Decompress and validate a map file.
    pub fn parse(compressed: &[u8]) -> Result<Self, SidetreeError> {
        let decompressed = decompress(compressed).map_err(|e| {
            SidetreeError::with_message(ErrorCode::MapFileDecompressionFailure, e.to_string())
        })?;
        let value: Value = serde_json::from_slice(&decompressed)
            .map_err(|e| SidetreeError::with_message(ErrorCode::MapFileNotJson, e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| SidetreeError::new(ErrorCode::MapFileNotJson))?;

        for key in object.keys() {
            if key != "chunks" && key != "operations" {
                return Err(SidetreeError::with_message(
                    ErrorCode::MapFileHasUnknownProperty,
                    format!("unexpected property '{key}'"),
                ));
            }
        }

        let chunks_value = object.get("chunks").and_then(Value::as_array).ok_or_else(|| {
            SidetreeError::new(ErrorCode::MapFileChunksPropertyMissingOrIncorrectType)
        })?;
        if chunks_value.len() != 1 {
            return Err(SidetreeError::new(
                ErrorCode::MapFileChunksPropertyDoesNotHaveExactlyOneElement,
            ));
        }
        let chunk: ChunkReference = serde_json::from_value(chunks_value[0].clone())
            .map_err(|e| {
                SidetreeError::with_message(
                    ErrorCode::MapFileChunkHasMissingOrUnknownProperty,
                    e.to_string(),
                )
            })?;

        let operations = match object.get("operations") {
            None => None,
            Some(operations_value) => {
                let operations_object = operations_value.as_object().ok_or_else(|| {
                    SidetreeError::new(ErrorCode::MapFileOperationsPropertyHasMissingOrUnknownProperty)
                })?;
                for key in operations_object.keys() {
                    if key != "update" {
                        return Err(SidetreeError::with_message(
                            ErrorCode::MapFileOperationsPropertyHasMissingOrUnknownProperty,
                            format!("unexpected property '{key}'"),
                        ));
                    }
                }
                let update_value = operations_object.get("update").ok_or_else(|| {
                    SidetreeError::new(ErrorCode::MapFileOperationsPropertyHasMissingOrUnknownProperty)
                })?;
                let update_array = update_value.as_array().ok_or_else(|| {
                    SidetreeError::new(ErrorCode::MapFileUpdateOperationsNotArray)
                })?;
                let mut update = Vec::with_capacity(update_array.len());
                for entry in update_array {
                    let reference: UpdateReference = serde_json::from_value(entry.clone())
                        .map_err(|e| {
                            SidetreeError::with_message(
                                ErrorCode::UpdateOperationMissingOrUnknownProperty,
                                e.to_string(),
                            )
                        })?;
                    update.push(reference);
                }
                let mut seen = std::collections::HashSet::new();
                for reference in &update {
                    if !seen.insert(reference.did_suffix.0.as_str()) {
                        return Err(SidetreeError::with_message(
                            ErrorCode::MapFileMultipleOperationsForTheSameDid,
                            format!("multiple update operations for '{}'", reference.did_suffix),
                        ));
                    }
                }
                Some(MapFileOperations { update })
            }
        };

        Ok(Self {
            chunks: vec![chunk],
            operations,
        })
    }

    /// Build a compressed map file from its parts.
    ///
    /// The `operations` property is omitted entirely when there are no
    /// updates, so building then parsing round-trips.
    pub fn build(
        chunk_file_uri: &str,
        updates: Vec<UpdateReference>,
    ) -> Result<Vec<u8>, SidetreeError> {
        let mut seen = std::collections::HashSet::new();
        for reference in &updates {
            if !seen.insert(reference.did_suffix.0.as_str()) {
                return Err(SidetreeError::with_message(
                    ErrorCode::MapFileMultipleOperationsForTheSameDid,
                    format!("multiple update operations for '{}'", reference.did_suffix),
                ));
            }
        }
        let model = Self {
            chunks: vec![ChunkReference {
                chunk_file_uri: chunk_file_uri.to_string(),
            }],
            operations: if updates.is_empty() {
                None
            } else {
                Some(MapFileOperations { update: updates })
            },
        };
        let canonical = serde_jcs::to_string(&model)
            .map_err(|e| SidetreeError::with_message(ErrorCode::MapFileNotJson, e.to_string()))?;
        compress(canonical.as_bytes()).map_err(|e| {
            SidetreeError::with_message(ErrorCode::MapFileDecompressionFailure, e.to_string())
        })
    }

    /// URI of the chunk file carrying this batch's deltas.
    pub fn chunk_file_uri(&self) -> &str {
        &self.chunks[0].chunk_file_uri
    }

    /// The anchored update operation skeletons, in batch order.
    pub fn updates(&self) -> &[UpdateReference] {
        match &self.operations {
            Some(operations) => &operations.update,
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressed_json(value: &Value) -> Vec<u8> {
        compress(serde_json::to_vec(value).unwrap().as_slice()).unwrap()
    }

    fn update_reference(suffix: &str) -> UpdateReference {
        UpdateReference {
            did_suffix: DIDSuffix(suffix.to_string()),
            signed_data: "e30.e30.c2ln".to_string(),
        }
    }

    #[test]
    fn round_trips_through_build_and_parse() {
        let updates = vec![update_reference("EiA-one"), update_reference("EiA-two")];
        let compressed = MapFile::build("QmChunkUri", updates.clone()).unwrap();
        let parsed = MapFile::parse(&compressed).unwrap();
        assert_eq!(parsed.chunk_file_uri(), "QmChunkUri");
        assert_eq!(parsed.updates(), updates.as_slice());
    }

    #[test]
    fn build_omits_operations_when_empty() {
        let compressed = MapFile::build("QmChunkUri", vec![]).unwrap();
        let json = decompress(&compressed).unwrap();
        let value: Value = serde_json::from_slice(&json).unwrap();
        assert!(value.get("operations").is_none());
        let parsed = MapFile::parse(&compressed).unwrap();
        assert!(parsed.updates().is_empty());
    }

    #[test]
    fn rejects_garbage_compression() {
        let err = MapFile::parse(b"definitely not deflate").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MapFileDecompressionFailure);
    }

    #[test]
    fn rejects_non_json_content() {
        let compressed = compress(b"not json").unwrap();
        let err = MapFile::parse(&compressed).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MapFileNotJson);
    }

    #[test]
    fn rejects_unknown_top_level_property() {
        let bytes = compressed_json(&serde_json::json!({
            "chunks": [{"chunkFileUri": "uri"}],
            "extra": 1,
        }));
        let err = MapFile::parse(&bytes).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MapFileHasUnknownProperty);
    }

    #[test]
    fn rejects_bad_chunks_shapes() {
        let bytes = compressed_json(&serde_json::json!({ "chunks": "nope" }));
        assert_eq!(
            MapFile::parse(&bytes).unwrap_err().code(),
            ErrorCode::MapFileChunksPropertyMissingOrIncorrectType
        );

        let bytes = compressed_json(&serde_json::json!({
            "chunks": [{"chunkFileUri": "a"}, {"chunkFileUri": "b"}],
        }));
        assert_eq!(
            MapFile::parse(&bytes).unwrap_err().code(),
            ErrorCode::MapFileChunksPropertyDoesNotHaveExactlyOneElement
        );

        let bytes = compressed_json(&serde_json::json!({
            "chunks": [{"chunkFileUri": "a", "extra": true}],
        }));
        assert_eq!(
            MapFile::parse(&bytes).unwrap_err().code(),
            ErrorCode::MapFileChunkHasMissingOrUnknownProperty
        );
    }

    #[test]
    fn rejects_bad_operations_shapes() {
        let bytes = compressed_json(&serde_json::json!({
            "chunks": [{"chunkFileUri": "uri"}],
            "operations": {"create": []},
        }));
        assert_eq!(
            MapFile::parse(&bytes).unwrap_err().code(),
            ErrorCode::MapFileOperationsPropertyHasMissingOrUnknownProperty
        );

        let bytes = compressed_json(&serde_json::json!({
            "chunks": [{"chunkFileUri": "uri"}],
            "operations": {"update": "nope"},
        }));
        assert_eq!(
            MapFile::parse(&bytes).unwrap_err().code(),
            ErrorCode::MapFileUpdateOperationsNotArray
        );
    }

    #[test]
    fn rejects_multiple_operations_for_the_same_did() {
        let bytes = compressed_json(&serde_json::json!({
            "chunks": [{"chunkFileUri": "uri"}],
            "operations": {"update": [
                {"didSuffix": "EiA-one", "signedData": "a.b.c"},
                {"didSuffix": "EiA-one", "signedData": "d.e.f"},
            ]},
        }));
        assert_eq!(
            MapFile::parse(&bytes).unwrap_err().code(),
            ErrorCode::MapFileMultipleOperationsForTheSameDid
        );

        let err = MapFile::build(
            "uri",
            vec![update_reference("EiA-one"), update_reference("EiA-one")],
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MapFileMultipleOperationsForTheSameDid);
    }
}
