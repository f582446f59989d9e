//! Sidetree DID URI composition.
//!
//! Reference: [Sidetree §9. DID URI Composition][duc]
//!
//! [duc]: https://identity.foundation/sidetree/spec/v1.0.0/#did-uri-composition

use core::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use anyhow::{Context, Result as AResult};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, SidetreeError};
use crate::operation::CreateOperation;
use crate::protocol::Sidetree;

/// [DID Suffix](https://identity.foundation/sidetree/spec/v1.0.0/#did-suffix)
///
/// Unique identifier string within a Sidetree DID (short or long-form): the
/// encoded multihash of the create operation's canonicalized suffix data.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DIDSuffix(pub String);

impl fmt::Display for DIDSuffix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DIDSuffix {
    fn from(suffix: &str) -> Self {
        Self(suffix.to_string())
    }
}

/// A Sidetree-based DID
///
/// Reference: [Sidetree §9. DID URI Composition][duc]
///
/// [duc]: https://identity.foundation/sidetree/spec/v1.0.0/#did-uri-composition
pub enum SidetreeDID<S: Sidetree> {
    /// Short-form Sidetree DID
    ///
    /// Reference: [§9. DID URI Composition](https://identity.foundation/sidetree/spec/v1.0.0/#short-form-did)
    Short { did_suffix: DIDSuffix },

    /// Long-form Sidetree DID
    ///
    /// Reference: [§9.1 Long-Form DID URIs](https://identity.foundation/sidetree/spec/v1.0.0/#long-form-did-uris)
    Long {
        did_suffix: DIDSuffix,
        create_operation_data: String,
        _marker: PhantomData<S>,
    },
}

impl<S: Sidetree> FromStr for SidetreeDID<S> {
    type Err = SidetreeError;

    fn from_str(did: &str) -> Result<Self, Self::Err> {
        let mut parts = did.split(':');
        if parts.next() != Some("did") {
            return Err(SidetreeError::with_message(
                ErrorCode::DidIncorrectPrefix,
                "expected DID URI scheme",
            ));
        }
        if parts.next() != Some(S::METHOD) {
            return Err(SidetreeError::with_message(
                ErrorCode::DidIncorrectPrefix,
                format!("expected DID method '{}'", S::METHOD),
            ));
        }
        if let Some(network) = S::NETWORK {
            if parts.next() != Some(network) {
                return Err(SidetreeError::with_message(
                    ErrorCode::DidIncorrectPrefix,
                    format!("expected network instance '{network}'"),
                ));
            }
        }
        let did_suffix_str = parts
            .next()
            .ok_or_else(|| SidetreeError::new(ErrorCode::DidNoUniqueSuffix))?;
        let did_suffix = DIDSuffix(did_suffix_str.to_string());
        S::validate_did_suffix(&did_suffix)?;
        let create_operation_data_opt = parts.next();
        if parts.next().is_some() {
            return Err(SidetreeError::with_message(
                ErrorCode::DidLongFormTrailingData,
                "unexpected data after long-form DID",
            ));
        }
        Ok(match create_operation_data_opt {
            None => Self::Short { did_suffix },
            Some(data) => Self::Long {
                did_suffix,
                create_operation_data: data.to_string(),
                _marker: PhantomData,
            },
        })
    }
}

impl<S: Sidetree> fmt::Display for SidetreeDID<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "did:{}:", S::METHOD)?;
        if let Some(network) = S::NETWORK {
            write!(f, "{network}:")?;
        }
        match self {
            Self::Short { did_suffix } => f.write_str(&did_suffix.0),
            Self::Long {
                did_suffix,
                create_operation_data,
                _marker,
            } => write!(f, "{}:{}", did_suffix.0, create_operation_data),
        }
    }
}

impl<S: Sidetree> SidetreeDID<S> {
    /// Construct a [Long-Form Sidetree DID][lfdu] from a [Create Operation][CreateOperation]
    ///
    /// [lfdu]: https://identity.foundation/sidetree/spec/v1.0.0/#long-form-did-uris
    pub fn from_create_operation(create_operation: &CreateOperation) -> AResult<Self> {
        let op_json = S::json_canonicalization_scheme(&create_operation)
            .context("Canonicalize Create Operation")?;
        let op_string = S::data_encoding_scheme(op_json.as_bytes());

        let did_suffix = S::serialize_suffix_data(&create_operation.suffix_data)
            .context("Serialize DID Suffix Data")?;
        Ok(Self::Long {
            did_suffix,
            create_operation_data: op_string,
            _marker: PhantomData,
        })
    }

    pub fn did_suffix(&self) -> &DIDSuffix {
        match self {
            Self::Short { did_suffix } => did_suffix,
            Self::Long { did_suffix, .. } => did_suffix,
        }
    }
}

impl<S: Sidetree> From<SidetreeDID<S>> for DIDSuffix {
    fn from(did: SidetreeDID<S>) -> DIDSuffix {
        match did {
            SidetreeDID::Short { did_suffix } => did_suffix,
            SidetreeDID::Long { did_suffix, .. } => did_suffix,
        }
    }
}
