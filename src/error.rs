//! Typed errors raised while parsing and ingesting Sidetree data.
//!
//! Every structural rejection carries a machine-readable [`ErrorCode`]. The
//! code, not the message text, is the stable public surface: callers (and the
//! REST layer of a full node) match on codes, while messages exist only to
//! help a human reading logs.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable rejection code.
///
/// The enumeration is fixed: a new rejection reason requires a new code.
/// Variant names are the wire representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Anchored data (transaction anchor string).
    AnchoredDataIncorrectFormat,
    AnchoredDataNumberOfOperationsNotPositiveInteger,

    // Content-addressable store.
    CasFileNotFound,
    CasFileTooLarge,
    CasFileHashInvalid,
    CasNotReachable,
    CasWriteFailure,

    // Chunk file.
    ChunkFileDecompressionFailure,
    ChunkFileNotJson,
    ChunkFileHasUnknownProperty,
    ChunkFileDeltasPropertyNotArray,
    ChunkFileDeltaCountIncorrect,

    // DID strings.
    DidIncorrectPrefix,
    DidNoUniqueSuffix,
    DidSuffixIncorrectLength,
    DidSuffixIncorrectEncoding,
    DidLongFormTrailingData,

    // Document composer.
    DocumentComposerIdNotUsingBase64UrlCharacterSet,
    DocumentComposerIdTooLong,
    DocumentComposerPublicKeyIdDuplicated,
    DocumentComposerServiceEndpointIdDuplicated,

    // JWS / JWK.
    JwsCompactJwsMalformed,
    JwsSignatureInvalid,
    JwsUnexpectedSignatureAlgorithm,
    JwkInvalid,

    // Map file.
    MapFileDecompressionFailure,
    MapFileNotJson,
    MapFileHasUnknownProperty,
    MapFileChunksPropertyMissingOrIncorrectType,
    MapFileChunksPropertyDoesNotHaveExactlyOneElement,
    MapFileChunkHasMissingOrUnknownProperty,
    MapFileOperationsPropertyHasMissingOrUnknownProperty,
    MapFileUpdateOperationsNotArray,
    MapFileMultipleOperationsForTheSameDid,

    // Multihash.
    MultihashNotLatestSupportedHashAlgorithm,
    MultihashStringNotAMultihash,

    // Operation parsing.
    OperationNotJson,
    OperationTypeMissingOrUnknown,
    OperationExceedsMaximumSize,
    CreateOperationMissingOrUnknownProperty,
    CreateOperationSuffixDataMissingOrUnknownProperty,
    CreateOperationDeltaHashMismatch,
    UpdateOperationMissingOrUnknownProperty,
    UpdateOperationSignedDataMissingOrUnknownProperty,
    UpdateOperationDeltaHashMismatch,
    RecoverOperationMissingOrUnknownProperty,
    RecoverOperationSignedDataMissingOrUnknownProperty,
    RecoverOperationDeltaHashMismatch,
    DeactivateOperationMissingOrUnknownProperty,
    DeactivateOperationSignedDataMissingOrUnknownProperty,
    DeactivateOperationSignedDidSuffixMismatch,
    DeltaMissingOrUnknownProperty,

    // Operation store. Never raised by the in-memory store; reserved for
    // persistence-backed implementations of the contract.
    OperationStoreReadFailure,
    OperationStoreWriteFailure,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// An error having to do with Sidetree operation or file processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidetreeError {
    /// The machine-readable code for this rejection.
    pub code: ErrorCode,
    /// Optional human-readable context. Not part of the stable surface.
    pub message: Option<String>,
}

impl SidetreeError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl fmt::Display for SidetreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sidetree error {}", self.code)?;
        if let Some(ref message) = self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SidetreeError {}

impl From<ErrorCode> for SidetreeError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}
