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

//! CSV rendering of the ledger and of account standings.

use crate::base::AccountId;
use crate::block::{Block, canonical_timestamp};
use crate::service::CreditService;
use crate::store::BlockStore;
use csv::Writer;
use serde::Serialize;
use std::io::Write;

/// One exported block, columns in audit-tool order.
#[derive(Debug, Serialize)]
struct LedgerRecord<'a> {
    timestamp: String,
    account_id: &'a str,
    action_label: &'a str,
    delta: i64,
    previous_hash: &'a str,
    hash: &'a str,
}

impl<'a> From<&'a Block> for LedgerRecord<'a> {
    fn from(block: &'a Block) -> Self {
        Self {
            timestamp: canonical_timestamp(&block.timestamp),
            account_id: block.account_id.as_str(),
            action_label: &block.action_label,
            delta: block.delta,
            previous_hash: &block.previous_hash,
            hash: &block.hash,
        }
    }
}

#[derive(Debug, Serialize)]
struct StandingRecord<'a> {
    rank: usize,
    account_id: &'a str,
    balance: i64,
}

/// Writes blocks as CSV.
///
/// # CSV Format
///
/// Columns: `timestamp, account_id, action_label, delta, previous_hash, hash`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_ledger<W: Write>(blocks: &[Block], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for block in blocks {
        wtr.serialize(LedgerRecord::from(block))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes a ranking as CSV with columns `rank, account_id, balance`.
///
/// Rank is 1-based and follows the input order.
pub fn write_leaderboard<W: Write>(
    ranking: &[(AccountId, i64)],
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for (position, (account_id, balance)) in ranking.iter().enumerate() {
        wtr.serialize(StandingRecord {
            rank: position + 1,
            account_id: account_id.as_str(),
            balance: *balance,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes every account as CSV with columns `account_id, balance, entries`,
/// ordered by account id.
pub fn write_balances<S: BlockStore, W: Write>(
    service: &CreditService<S>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    let mut accounts: Vec<_> = service.accounts().collect();
    accounts.sort_by(|a, b| a.key().cmp(b.key()));
    for account in &accounts {
        wtr.serialize(account.value())?;
    }
    wtr.flush()?;
    Ok(())
}
