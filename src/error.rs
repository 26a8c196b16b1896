// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error types for ledger operations.

use crate::base::AccountId;
use std::fmt;
use thiserror::Error;

/// Errors returned by account-facing operations.
///
/// Every variant leaves the service untouched: no balance change, no block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Account identifier is empty or whitespace only
    #[error("account id must not be empty")]
    EmptyAccountId,

    /// Action or reward label is empty
    #[error("label must not be empty")]
    EmptyLabel,

    /// Amount or cost is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Redemption cost exceeds the current balance
    #[error("insufficient balance: {balance} available, {requested} requested")]
    InsufficientBalance { balance: i64, requested: i64 },

    /// The backing block store rejected the append
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl LedgerError {
    /// Returns `true` for expected business rejections, as opposed to bad
    /// input or a storage fault.
    pub fn is_business_rejection(&self) -> bool {
        matches!(self, Self::InsufficientBalance { .. })
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }
}

/// Which check failed during chain verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityFault {
    /// Stored hash differs from the hash recomputed over the block's fields.
    HashMismatch,
    /// `previous_hash` does not match the preceding block's stored hash.
    BrokenLink,
}

impl fmt::Display for IntegrityFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch => write!(f, "hash mismatch"),
            Self::BrokenLink => write!(f, "broken link"),
        }
    }
}

/// Result of a failed chain audit: the first offending block.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("chain integrity violation at block {index}: {fault}")]
pub struct ChainIntegrityViolation {
    pub index: u64,
    pub fault: IntegrityFault,
}

/// Errors raised by a [`BlockStore`](crate::store::BlockStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("journal i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed journal entry on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("journal failed verification: {0}")]
    Integrity(#[from] ChainIntegrityViolation),

    #[error("journal block {index} overdraws account {account_id}")]
    Overdraft { index: u64, account_id: AccountId },

    #[error("cannot encode block: {0}")]
    Encode(#[source] serde_json::Error),
}
