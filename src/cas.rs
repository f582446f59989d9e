//! Content-addressable store interface and adapters.
//!
//! Batch files are fetched by multihash-derived address. The engine only
//! depends on the [ContentAddressableStore] trait; an in-memory adapter backs
//! tests and an HTTP adapter talks to an IPFS-style gateway.

use async_trait::async_trait;
use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::{ErrorCode, SidetreeError};
use crate::protocol::{Core, Sidetree};

/// Outcome kind of a CAS read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchResultCode {
    Success,
    NotFound,
    InvalidHash,
    MaxSizeExceeded,
    CasNotReachable,
}

/// Outcome of a CAS read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub code: FetchResultCode,
    pub content: Option<Vec<u8>>,
}

impl FetchResult {
    fn success(content: Vec<u8>) -> Self {
        Self {
            code: FetchResultCode::Success,
            content: Some(content),
        }
    }

    fn failure(code: FetchResultCode) -> Self {
        Self {
            code,
            content: None,
        }
    }
}

/// Content-addressable store.
///
/// Addresses are multihash-encoded base64url strings.
#[async_trait]
pub trait ContentAddressableStore: Send + Sync {
    /// Store content, returning its address.
    async fn write(&self, content: &[u8]) -> Result<String, SidetreeError>;

    /// Fetch content by address.
    ///
    /// `max_size_bytes` bounds the accepted content length; larger content
    /// yields [FetchResultCode::MaxSizeExceeded].
    async fn read(&self, address: &str, max_size_bytes: usize) -> FetchResult;
}

/// In-memory CAS, content keyed by its encoded multihash.
#[derive(Default)]
pub struct InMemoryCas {
    content: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryCas {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentAddressableStore for InMemoryCas {
    async fn write(&self, content: &[u8]) -> Result<String, SidetreeError> {
        let address = Core::hash(content);
        self.content
            .write()
            .await
            .insert(address.clone(), content.to_vec());
        Ok(address)
    }

    async fn read(&self, address: &str, max_size_bytes: usize) -> FetchResult {
        if Core::validate_encoded_multihash(address).is_err() {
            return FetchResult::failure(FetchResultCode::InvalidHash);
        }
        match self.content.read().await.get(address) {
            None => FetchResult::failure(FetchResultCode::NotFound),
            Some(content) if content.len() > max_size_bytes => {
                FetchResult::failure(FetchResultCode::MaxSizeExceeded)
            }
            Some(content) => FetchResult::success(content.clone()),
        }
    }
}

/// CAS adapter speaking to an HTTP gateway.
///
/// Reads `GET {base_url}/{address}`, writes `POST {base_url}`.
#[derive(Debug, Clone)]
pub struct HttpCas {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCas {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ContentAddressableStore for HttpCas {
    async fn write(&self, content: &[u8]) -> Result<String, SidetreeError> {
        let resp = self
            .client
            .post(&self.base_url)
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| SidetreeError::with_message(ErrorCode::CasNotReachable, e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SidetreeError::with_message(
                ErrorCode::CasWriteFailure,
                format!("CAS returned {}", resp.status()),
            ));
        }
        let address = resp
            .text()
            .await
            .map_err(|e| SidetreeError::with_message(ErrorCode::CasWriteFailure, e.to_string()))?;
        Ok(address.trim().to_string())
    }

    async fn read(&self, address: &str, max_size_bytes: usize) -> FetchResult {
        let url = format!("{}/{}", self.base_url, address);
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(_) => return FetchResult::failure(FetchResultCode::CasNotReachable),
        };
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return FetchResult::failure(FetchResultCode::NotFound);
        }
        if !resp.status().is_success() {
            return FetchResult::failure(FetchResultCode::CasNotReachable);
        }
        if let Some(length) = resp.content_length() {
            if length as usize > max_size_bytes {
                return FetchResult::failure(FetchResultCode::MaxSizeExceeded);
            }
        }
        match resp.bytes().await {
            Ok(bytes) if bytes.len() > max_size_bytes => {
                FetchResult::failure(FetchResultCode::MaxSizeExceeded)
            }
            Ok(bytes) => FetchResult::success(bytes.to_vec()),
            Err(_) => FetchResult::failure(FetchResultCode::CasNotReachable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_cas_round_trips_by_hash() {
        let cas = InMemoryCas::new();
        let address = cas.write(b"some batch file").await.unwrap();
        Core::validate_encoded_multihash(&address).unwrap();
        let result = cas.read(&address, 1024).await;
        assert_eq!(result.code, FetchResultCode::Success);
        assert_eq!(result.content.unwrap(), b"some batch file");
    }

    #[tokio::test]
    async fn in_memory_cas_reports_missing_and_oversized_content() {
        let cas = InMemoryCas::new();
        let missing = Core::hash(b"never written");
        assert_eq!(
            cas.read(&missing, 1024).await.code,
            FetchResultCode::NotFound
        );
        assert_eq!(
            cas.read("not-a-multihash", 1024).await.code,
            FetchResultCode::InvalidHash
        );

        let address = cas.write(&[0u8; 64]).await.unwrap();
        assert_eq!(
            cas.read(&address, 16).await.code,
            FetchResultCode::MaxSizeExceeded
        );
    }
}
