//! DID document state and state patches.
//!
//! A DID's document is the pair of public key entries and service endpoint
//! entries; operations carry ordered [patch actions][spa] that transform it.
//!
//! [spa]: https://identity.foundation/sidetree/spec/v1.0.0/#standard-patch-actions

use anyhow::{Context, Error as AError};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, SidetreeError};
use crate::jwk::{PublicKeyJwk, JWK};

/// Verification method type used when converting a JWK to a
/// [public key entry][PublicKeyEntry].
///
/// Reference: [Sidetree §12.1.1 `add-public-keys`][apk] Step 3.2
///
/// [apk]: https://identity.foundation/sidetree/spec/v1.0.0/#add-public-keys
pub const VERIFICATION_METHOD_TYPE: &str = "JsonWebSignature2020";

/// Maximum length of an entry `id` property, in Base64url characters.
const MAX_ID_LENGTH: usize = 50;

/// Public key as JWK or Multibase
///
/// Property of a public key / verification method containing public key data,
/// as part of a [PublicKeyEntry][].
///
/// per [Sidetree §12.1.1 `add-public-keys`: Step 4][apk].
///
/// [apk]: https://identity.foundation/sidetree/spec/v1.0.0/#add-public-keys
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum PublicKey {
    /// [`publicKeyJwk`](https://www.w3.org/TR/did-core/#dfn-publickeyjwk) as defined in DID Core.
    PublicKeyJwk(PublicKeyJwk),

    /// [`publicKeyMultibase`](https://www.w3.org/TR/did-core/#dfn-publickeymultibase) as defined in DID Core.
    PublicKeyMultibase(String),
}

/// Verification relationship
///
/// Defined in [DID Core](https://www.w3.org/TR/did-core/#verification-relationships).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Purpose {
    Authentication,
    AssertionMethod,
    KeyAgreement,
    CapabilityInvocation,
    CapabilityDelegation,
}

/// Public Key Entry
///
/// Used by the [`add-public-keys`](DIDStatePatch::AddPublicKeys) and
/// [`replace`](DIDStatePatch::Replace) DID state patch actions.
///
/// Specified in [Sidetree §12.1.1 `add-public-keys`][apk].
///
/// [apk]: https://identity.foundation/sidetree/spec/v1.0.0/#add-public-keys
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEntry {
    /// `id` property
    ///
    /// Maximum length: 50 in Base64url
    pub id: String,

    /// Verification method type
    pub r#type: String,

    /// Verification method controller (DID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// `publicKeyJwk` or `publicKeyMultibase` property
    #[serde(flatten)]
    pub public_key: PublicKey,

    /// Verification relationships
    ///
    /// Corresponds to [`proofPurpose`](https://www.w3.org/TR/did-core/#verification-relationships) in VC Data Model.
    pub purposes: Vec<Purpose>,
}

impl TryFrom<JWK> for PublicKeyEntry {
    type Error = AError;
    fn try_from(jwk: JWK) -> Result<Self, Self::Error> {
        let id = jwk.thumbprint().context("Compute JWK thumbprint")?;
        let pkjwk = PublicKeyJwk::try_from(jwk.to_public()).context("Convert key")?;
        let public_key = PublicKey::PublicKeyJwk(pkjwk);
        Ok(PublicKeyEntry {
            id,
            r#type: VERIFICATION_METHOD_TYPE.to_owned(),
            controller: None,
            public_key,
            purposes: vec![
                Purpose::AssertionMethod,
                Purpose::Authentication,
                Purpose::KeyAgreement,
                Purpose::CapabilityInvocation,
                Purpose::CapabilityDelegation,
            ],
        })
    }
}

/// Service Endpoint Entry
///
/// Used by the [`add-service-endpoints`](DIDStatePatch::AddServiceEndpoints)
/// and [`replace`](DIDStatePatch::Replace) DID state patch actions.
///
/// Specified in [Sidetree §12.1.3 `add-services`][as].
///
/// [as]: https://identity.foundation/sidetree/spec/v1.0.0/#add-services
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpointEntry {
    /// `id` property
    ///
    /// Maximum length: 50 in Base64Url
    pub id: String,

    /// Service type
    pub r#type: String,

    /// Service endpoint URL or object
    pub service_endpoint: serde_json::Value,
}

/// DID PKI metadata state
///
/// The state computed by applying patches; carried by [DidState][crate::processor::DidState].
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    /// Public key entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_keys: Vec<PublicKeyEntry>,

    /// Service endpoints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_endpoints: Vec<ServiceEndpointEntry>,
}

/// [DID State Patch][dsp] using a [Sidetree Standard Patch action][spa]
///
/// [dsp]: https://identity.foundation/sidetree/spec/v1.0.0/#did-state-patches
/// [spa]: https://identity.foundation/sidetree/spec/v1.0.0/#standard-patch-actions
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "action")]
#[serde(rename_all = "kebab-case")]
pub enum DIDStatePatch {
    /// [`add-public-keys`][apk] Patch Action
    ///
    /// [apk]: https://identity.foundation/sidetree/spec/v1.0.0/#add-public-keys
    AddPublicKeys {
        /// Keys to add or overwrite
        #[serde(rename = "publicKeys")]
        public_keys: Vec<PublicKeyEntry>,
    },

    /// [`remove-public-keys`][rpk] Patch Action
    ///
    /// [rpk]: https://identity.foundation/sidetree/spec/v1.0.0/#remove-public-keys
    RemovePublicKeys {
        /// IDs of keys to remove
        ids: Vec<String>,
    },

    /// `add-service-endpoints` Patch Action
    ///
    /// Reference: [Sidetree §12.1.3 `add-services`](https://identity.foundation/sidetree/spec/v1.0.0/#add-services)
    AddServiceEndpoints {
        /// Service endpoint entries to add
        #[serde(rename = "serviceEndpoints")]
        service_endpoints: Vec<ServiceEndpointEntry>,
    },

    /// `remove-service-endpoints` Patch Action
    ///
    /// Reference: [Sidetree §12.1.4 `remove-services`](https://identity.foundation/sidetree/spec/v1.0.0/#remove-services)
    RemoveServiceEndpoints {
        /// IDs of service endpoints to remove
        ids: Vec<String>,
    },

    /// [`replace`][r] Patch Action
    ///
    /// [r]: https://identity.foundation/sidetree/spec/v1.0.0/#replace
    Replace {
        /// Reset DID state
        document: DocumentState,
    },
}

fn validate_id(id: &str) -> Result<(), SidetreeError> {
    if id.len() > MAX_ID_LENGTH {
        return Err(SidetreeError::with_message(
            ErrorCode::DocumentComposerIdTooLong,
            format!("id '{id}' exceeds {MAX_ID_LENGTH} characters"),
        ));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(SidetreeError::with_message(
            ErrorCode::DocumentComposerIdNotUsingBase64UrlCharacterSet,
            format!("id '{id}' is not in the Base64url character set"),
        ));
    }
    Ok(())
}

fn ensure_unique_key_ids(entries: &[PublicKeyEntry]) -> Result<(), SidetreeError> {
    let mut seen = std::collections::HashSet::new();
    for entry in entries {
        validate_id(&entry.id)?;
        if !seen.insert(entry.id.as_str()) {
            return Err(SidetreeError::with_message(
                ErrorCode::DocumentComposerPublicKeyIdDuplicated,
                format!("duplicate public key id '{}'", entry.id),
            ));
        }
    }
    Ok(())
}

fn ensure_unique_service_ids(entries: &[ServiceEndpointEntry]) -> Result<(), SidetreeError> {
    let mut seen = std::collections::HashSet::new();
    for entry in entries {
        validate_id(&entry.id)?;
        if !seen.insert(entry.id.as_str()) {
            return Err(SidetreeError::with_message(
                ErrorCode::DocumentComposerServiceEndpointIdDuplicated,
                format!("duplicate service endpoint id '{}'", entry.id),
            ));
        }
    }
    Ok(())
}

impl DocumentState {
    fn validate(&self) -> Result<(), SidetreeError> {
        ensure_unique_key_ids(&self.public_keys)?;
        ensure_unique_service_ids(&self.service_endpoints)?;
        Ok(())
    }

    /// Apply an ordered sequence of patches, producing the next document.
    ///
    /// Any invalid patch aborts the whole delta: the error is returned and
    /// the input document is left untouched. Callers on the resolution path
    /// treat that as a no-op on document state while still advancing
    /// commitments.
    pub fn with_patches(&self, patches: &[DIDStatePatch]) -> Result<Self, SidetreeError> {
        let mut next = self.clone();
        for patch in patches {
            next = next.with_patch(patch)?;
        }
        Ok(next)
    }

    fn with_patch(&self, patch: &DIDStatePatch) -> Result<Self, SidetreeError> {
        let mut next = self.clone();
        match patch {
            DIDStatePatch::AddPublicKeys { public_keys } => {
                ensure_unique_key_ids(public_keys)?;
                for entry in public_keys {
                    // Adding an id that already exists overwrites the entry.
                    next.public_keys.retain(|existing| existing.id != entry.id);
                    next.public_keys.push(entry.clone());
                }
            }
            DIDStatePatch::RemovePublicKeys { ids } => {
                for id in ids {
                    validate_id(id)?;
                }
                next.public_keys
                    .retain(|existing| !ids.contains(&existing.id));
            }
            DIDStatePatch::AddServiceEndpoints { service_endpoints } => {
                ensure_unique_service_ids(service_endpoints)?;
                for entry in service_endpoints {
                    next.service_endpoints
                        .retain(|existing| existing.id != entry.id);
                    next.service_endpoints.push(entry.clone());
                }
            }
            DIDStatePatch::RemoveServiceEndpoints { ids } => {
                for id in ids {
                    validate_id(id)?;
                }
                next.service_endpoints
                    .retain(|existing| !ids.contains(&existing.id));
            }
            DIDStatePatch::Replace { document } => {
                document.validate()?;
                next = document.clone();
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_entry(id: &str) -> PublicKeyEntry {
        let jwk = JWK::generate_secp256k1().unwrap();
        let mut entry = PublicKeyEntry::try_from(jwk).unwrap();
        entry.id = id.to_string();
        entry
    }

    fn service_entry(id: &str) -> ServiceEndpointEntry {
        ServiceEndpointEntry {
            id: id.to_string(),
            r#type: "IdentityHub".to_string(),
            service_endpoint: serde_json::json!("https://hub.example.com/"),
        }
    }

    #[test]
    fn add_and_remove_public_keys() {
        let doc = DocumentState::default();
        let doc = doc
            .with_patches(&[DIDStatePatch::AddPublicKeys {
                public_keys: vec![key_entry("signingKey"), key_entry("otherKey")],
            }])
            .unwrap();
        assert_eq!(doc.public_keys.len(), 2);

        let doc = doc
            .with_patches(&[DIDStatePatch::RemovePublicKeys {
                ids: vec!["otherKey".to_string()],
            }])
            .unwrap();
        assert_eq!(doc.public_keys.len(), 1);
        assert_eq!(doc.public_keys[0].id, "signingKey");
    }

    #[test]
    fn adding_existing_id_overwrites() {
        let doc = DocumentState::default()
            .with_patches(&[DIDStatePatch::AddPublicKeys {
                public_keys: vec![key_entry("signingKey")],
            }])
            .unwrap();
        let replacement = key_entry("signingKey");
        let doc = doc
            .with_patches(&[DIDStatePatch::AddPublicKeys {
                public_keys: vec![replacement.clone()],
            }])
            .unwrap();
        assert_eq!(doc.public_keys.len(), 1);
        assert_eq!(doc.public_keys[0], replacement);
    }

    #[test]
    fn duplicate_ids_within_a_patch_are_rejected() {
        let err = DocumentState::default()
            .with_patches(&[DIDStatePatch::AddPublicKeys {
                public_keys: vec![key_entry("signingKey"), key_entry("signingKey")],
            }])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DocumentComposerPublicKeyIdDuplicated);

        let err = DocumentState::default()
            .with_patches(&[DIDStatePatch::AddServiceEndpoints {
                service_endpoints: vec![service_entry("hub"), service_entry("hub")],
            }])
            .unwrap_err();
        assert_eq!(
            err.code(),
            ErrorCode::DocumentComposerServiceEndpointIdDuplicated
        );
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let err = DocumentState::default()
            .with_patches(&[DIDStatePatch::AddServiceEndpoints {
                service_endpoints: vec![service_entry("not base64url!")],
            }])
            .unwrap_err();
        assert_eq!(
            err.code(),
            ErrorCode::DocumentComposerIdNotUsingBase64UrlCharacterSet
        );

        let long_id = "a".repeat(51);
        let err = DocumentState::default()
            .with_patches(&[DIDStatePatch::AddPublicKeys {
                public_keys: vec![key_entry(&long_id)],
            }])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DocumentComposerIdTooLong);
    }

    #[test]
    fn replace_resets_the_document() {
        let doc = DocumentState::default()
            .with_patches(&[
                DIDStatePatch::AddPublicKeys {
                    public_keys: vec![key_entry("signingKey")],
                },
                DIDStatePatch::AddServiceEndpoints {
                    service_endpoints: vec![service_entry("hub")],
                },
            ])
            .unwrap();

        let doc = doc
            .with_patches(&[DIDStatePatch::Replace {
                document: DocumentState {
                    public_keys: vec![key_entry("newKey")],
                    service_endpoints: vec![],
                },
            }])
            .unwrap();
        assert_eq!(doc.public_keys.len(), 1);
        assert_eq!(doc.public_keys[0].id, "newKey");
        assert!(doc.service_endpoints.is_empty());
    }

    #[test]
    fn invalid_patch_leaves_input_untouched() {
        let original = DocumentState::default()
            .with_patches(&[DIDStatePatch::AddPublicKeys {
                public_keys: vec![key_entry("signingKey")],
            }])
            .unwrap();
        let result = original.with_patches(&[
            DIDStatePatch::RemovePublicKeys {
                ids: vec!["signingKey".to_string()],
            },
            DIDStatePatch::AddPublicKeys {
                public_keys: vec![key_entry("bad id!")],
            },
        ]);
        assert!(result.is_err());
        assert_eq!(original.public_keys.len(), 1);
    }

    #[test]
    fn patch_actions_serialize_with_kebab_case_tags() {
        let patch = DIDStatePatch::RemoveServiceEndpoints {
            ids: vec!["hub".to_string()],
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value["action"], "remove-service-endpoints");

        let parsed: DIDStatePatch = serde_json::from_value(serde_json::json!({
            "action": "add-public-keys",
            "publicKeys": [],
        }))
        .unwrap();
        assert_eq!(
            parsed,
            DIDStatePatch::AddPublicKeys {
                public_keys: vec![]
            }
        );
    }
}
