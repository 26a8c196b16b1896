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

//! Immutable ledger blocks and the canonical hashing rule.
//!
//! A block's `hash` is the lowercase hex SHA-256 of its canonical encoding:
//! a compact JSON object holding every other field, keys sorted
//! lexicographically, integers in decimal and the timestamp as an RFC 3339
//! UTC string with microsecond precision.
//!
//! ```text
//! {"account_id":"H1","action_label":"segregation verified","delta":3,
//!  "previous_hash":"0","sequence_index":0,"timestamp":"2026-10-16T09:30:00.000000Z"}
//! ```

use crate::base::AccountId;
use chrono::{DateTime, SecondsFormat, SubsecRound, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// `previous_hash` of the first block in a chain.
pub const GENESIS_HASH: &str = "0";

/// Digits of sub-second precision kept in block timestamps.
const TIMESTAMP_PRECISION: u16 = 6;

/// One hash-sealed record of a single credit-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, 0-based.
    pub sequence_index: u64,
    /// Creation time, never earlier than the preceding block's.
    pub timestamp: DateTime<Utc>,
    pub account_id: AccountId,
    pub action_label: String,
    /// Signed credit change: positive for grants, negative for redemptions.
    pub delta: i64,
    pub previous_hash: String,
    /// Digest over all the fields above. Never recomputed after sealing.
    pub hash: String,
}

impl Block {
    /// Builds a block and seals it with its canonical hash.
    pub fn seal(
        sequence_index: u64,
        timestamp: DateTime<Utc>,
        account_id: AccountId,
        action_label: impl Into<String>,
        delta: i64,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            sequence_index,
            timestamp: timestamp.trunc_subsecs(TIMESTAMP_PRECISION),
            account_id,
            action_label: action_label.into(),
            delta,
            previous_hash: previous_hash.into(),
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Current wall-clock time at block precision.
    pub fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(TIMESTAMP_PRECISION)
    }

    /// Deterministic, key-ordered encoding of every field except `hash`.
    pub fn canonical_encoding(&self) -> String {
        // serde_json's default map is a BTreeMap, so keys come out sorted.
        json!({
            "account_id": self.account_id.as_str(),
            "action_label": self.action_label,
            "delta": self.delta,
            "previous_hash": self.previous_hash,
            "sequence_index": self.sequence_index,
            "timestamp": canonical_timestamp(&self.timestamp),
        })
        .to_string()
    }

    /// Recomputes the hash from the block's current field values.
    pub fn compute_hash(&self) -> String {
        hex::encode(Sha256::digest(self.canonical_encoding().as_bytes()))
    }

    /// Returns `true` if the stored hash still matches the fields.
    ///
    /// Sealed timestamps carry no digits below the microsecond, which the
    /// canonical encoding cannot see, so any such digits count as tampering.
    pub fn is_intact(&self) -> bool {
        self.timestamp.nanosecond() % 1_000 == 0 && self.compute_hash() == self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.sequence_index == 0 && self.previous_hash == GENESIS_HASH
    }

    /// Human-readable one-line description, used for account history.
    pub fn summary(&self) -> String {
        format!(
            "#{} {} {:+} credits: {}",
            self.sequence_index,
            canonical_timestamp(&self.timestamp),
            self.delta,
            self.action_label
        )
    }
}

/// Fixed-format timestamp used both for hashing and for export.
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
