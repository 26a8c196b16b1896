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

//! Append-only, hash-linked chain of blocks.
//!
//! The ledger knows nothing about accounts beyond the identifier carried by
//! each block; validation of requests belongs to the
//! [`CreditService`](crate::CreditService), which is its only writer.

use crate::base::AccountId;
use crate::block::{Block, GENESIS_HASH};
use crate::error::{ChainIntegrityViolation, IntegrityFault};
use tracing::debug;

/// Ordered, tamper-evident sequence of [`Block`]s.
///
/// # Invariants
///
/// - `blocks[i].sequence_index == i`.
/// - `blocks[i].previous_hash == blocks[i - 1].hash` for every `i > 0`, and
///   the first block links to [`GENESIS_HASH`].
/// - Timestamps never decrease along the chain.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Wraps an existing sequence of blocks without checking it.
    ///
    /// Call [`verify_chain`](Self::verify_chain) before trusting the result.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Seals and appends a block describing one event. Never fails.
    pub fn append(
        &mut self,
        account_id: AccountId,
        action_label: impl Into<String>,
        delta: i64,
    ) -> Block {
        let block = self.next_block(account_id, action_label, delta);
        self.push(block.clone());
        block
    }

    /// Seals the block that [`append`](Self::append) would add next, without
    /// adding it.
    pub(crate) fn next_block(
        &self,
        account_id: AccountId,
        action_label: impl Into<String>,
        delta: i64,
    ) -> Block {
        let mut timestamp = Block::now();
        if let Some(last) = self.blocks.last() {
            // Wall clocks can step backwards; the chain must not.
            timestamp = timestamp.max(last.timestamp);
        }
        Block::seal(
            self.blocks.len() as u64,
            timestamp,
            account_id,
            action_label,
            delta,
            self.last_hash(),
        )
    }

    /// Adds a block sealed by [`next_block`](Self::next_block).
    pub(crate) fn push(&mut self, block: Block) {
        debug_assert_eq!(
            block.sequence_index,
            self.blocks.len() as u64,
            "Invariant violated: block sealed for a different chain position"
        );
        debug_assert_eq!(
            block.previous_hash,
            self.last_hash(),
            "Invariant violated: block does not link to the chain tip"
        );
        debug!(
            index = block.sequence_index,
            account = %block.account_id,
            delta = block.delta,
            hash = %block.hash,
            "block appended"
        );
        self.blocks.push(block);
    }

    /// Hash of the last block, or the genesis sentinel for an empty chain.
    pub fn last_hash(&self) -> String {
        self.blocks
            .last()
            .map_or_else(|| GENESIS_HASH.to_string(), |b| b.hash.clone())
    }

    /// Walks the chain in order, recomputing each block's hash and checking
    /// its link to the predecessor.
    ///
    /// Returns the first offending block. An empty chain is valid.
    pub fn verify_chain(&self) -> Result<(), ChainIntegrityViolation> {
        let mut expected_previous = GENESIS_HASH;
        for (index, block) in self.blocks.iter().enumerate() {
            let index = index as u64;
            if !block.is_intact() {
                return Err(ChainIntegrityViolation {
                    index,
                    fault: IntegrityFault::HashMismatch,
                });
            }
            if block.previous_hash != expected_previous {
                return Err(ChainIntegrityViolation {
                    index,
                    fault: IntegrityFault::BrokenLink,
                });
            }
            expected_previous = block.hash.as_str();
        }
        Ok(())
    }

    /// Blocks affecting `account_id`, in chain order.
    ///
    /// The iterator is lazy and can be cloned to restart it.
    pub fn entries_for<'a>(
        &'a self,
        account_id: &'a AccountId,
    ) -> impl Iterator<Item = &'a Block> + Clone + 'a {
        self.blocks
            .iter()
            .filter(move |block| &block.account_id == account_id)
    }

    /// Sum of all deltas recorded for `account_id`.
    pub fn replay_balance(&self, account_id: &AccountId) -> i64 {
        self.entries_for(account_id).map(|block| block.delta).sum()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, sequence_index: u64) -> Option<&Block> {
        usize::try_from(sequence_index)
            .ok()
            .and_then(|index| self.blocks.get(index))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
