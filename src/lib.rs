//! Core resolution engine for Sidetree-based DID methods.
//!
//! Given a stream of anchored operations (Create, Update, Recover,
//! Deactivate) observed on a linearizable ledger, this crate computes the
//! current authoritative state of each DID: it parses and partially verifies
//! operations, enforces the commit-reveal discipline over recovery and
//! update key commitments, and replays operations in the canonical order so
//! the result is deterministic no matter how (or how adversarially) the
//! operations were inserted.
//!
//! The main pieces:
//!
//! - [operation]: operation data model, strict parsers, partial verification
//! - [processor]: the per-operation state transition ([processor::DidState])
//! - [resolver]: per-DID state reconstruction over an [operation store](store)
//! - [map_file] / [chunk_file] / [anchor]: the batch containers and anchor
//!   string that carry operations from the ledger into the store
//! - [protocol]: hashing, canonicalization, commitments, and operation
//!   construction for a protocol parameter set ([protocol::Core])
//!
//! External collaborators are consumed through traits only: the
//! [content-addressable store](cas), the [operation store](store), and the
//! [version manager](version) that yields the processor for a transaction's
//! epoch.

pub mod anchor;
pub mod cas;
pub mod chunk_file;
pub mod did;
pub mod document;
pub mod error;
pub mod ingest;
pub mod jwk;
pub mod jws;
pub mod map_file;
pub mod operation;
pub mod processor;
pub mod protocol;
pub mod resolver;
pub mod store;
pub mod version;

pub use anchor::{AnchoredData, TransactionModel};
pub use did::{DIDSuffix, SidetreeDID};
pub use document::{DIDStatePatch, DocumentState, PublicKeyEntry, ServiceEndpointEntry};
pub use error::{ErrorCode, SidetreeError};
pub use ingest::TransactionProcessor;
pub use jwk::{PublicKeyJwk, JWK};
pub use map_file::MapFile;
pub use operation::{AnchoredOperation, Operation, OperationType, SidetreeOperation};
pub use processor::{DidState, OperationProcessor, VersionedOperationProcessor};
pub use protocol::{Core, Sidetree};
pub use resolver::Resolver;
pub use store::{InMemoryOperationStore, OperationStore};
pub use version::{VersionManager, VersionTable};
