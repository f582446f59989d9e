//! Anchored data: the string a ledger transaction carries.
//!
//! The anchor string is `"<operation-count>.<map-file-uri>"`: the number of
//! operations in the batch and the CAS address of its map file.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, SidetreeError};

/// Data anchored in a single ledger transaction.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AnchoredData {
    pub number_of_operations: u32,
    pub map_file_uri: String,
}

impl AnchoredData {
    /// Parse an anchor string.
    pub fn parse(anchor_string: &str) -> Result<Self, SidetreeError> {
        let (count, uri) = anchor_string.split_once('.').ok_or_else(|| {
            SidetreeError::with_message(
                ErrorCode::AnchoredDataIncorrectFormat,
                format!("expected '<count>.<uri>', got '{anchor_string}'"),
            )
        })?;
        if uri.is_empty() || uri.contains('.') {
            return Err(SidetreeError::new(ErrorCode::AnchoredDataIncorrectFormat));
        }
        // Leading zeros and signs would make the encoding ambiguous.
        if count != "0" && (count.starts_with('0') || count.starts_with('+') || count.starts_with('-')) {
            return Err(SidetreeError::new(
                ErrorCode::AnchoredDataNumberOfOperationsNotPositiveInteger,
            ));
        }
        let number_of_operations: u32 = count.parse().map_err(|_| {
            SidetreeError::new(ErrorCode::AnchoredDataNumberOfOperationsNotPositiveInteger)
        })?;
        if number_of_operations == 0 {
            return Err(SidetreeError::new(
                ErrorCode::AnchoredDataNumberOfOperationsNotPositiveInteger,
            ));
        }
        Ok(Self {
            number_of_operations,
            map_file_uri: uri.to_string(),
        })
    }

    /// Serialize into the anchor string form.
    pub fn serialize(&self) -> String {
        format!("{}.{}", self.number_of_operations, self.map_file_uri)
    }
}

/// A ledger transaction as seen by the ingestion path.
///
/// Produced by the ledger adapter; `transaction_time` and
/// `transaction_number` become the leading components of every contained
/// operation's anchor key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TransactionModel {
    pub anchor_string: String,
    pub transaction_time: u64,
    pub transaction_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let data = AnchoredData {
            number_of_operations: 42,
            map_file_uri: "QmMapFileUri".to_string(),
        };
        assert_eq!(data.serialize(), "42.QmMapFileUri");
        assert_eq!(AnchoredData::parse(&data.serialize()).unwrap(), data);
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["QmNoDot", "1.two.parts", "1.", "x.QmUri", "0.QmUri", "01.QmUri", "-1.QmUri"] {
            let err = AnchoredData::parse(bad).unwrap_err();
            assert!(
                matches!(
                    err.code(),
                    ErrorCode::AnchoredDataIncorrectFormat
                        | ErrorCode::AnchoredDataNumberOfOperationsNotPositiveInteger
                ),
                "expected rejection for '{bad}'"
            );
        }
    }
}
