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

//! Account records.
//!
//! An account caches the balance derived from its ledger entries and keeps a
//! human-readable line per entry. Both only change together with a block
//! being appended, under the account's lock.
//!
//! # Example
//!
//! ```
//! use credit_ledger_rs::{Account, AccountId};
//!
//! let account = Account::new(AccountId::from("H1"));
//! assert_eq!(account.balance(), 0);
//! assert!(account.history().is_empty());
//! ```

use crate::base::AccountId;
use crate::block::Block;
use crate::error::LedgerError;
use parking_lot::{Mutex, MutexGuard};
use serde::ser::{Serialize, SerializeStruct, Serializer};

#[derive(Debug)]
pub(crate) struct AccountData {
    account_id: AccountId,
    balance: i64,
    /// One summary line per block, oldest first.
    history: Vec<String>,
}

impl AccountData {
    fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            balance: 0,
            history: Vec::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= 0,
            "Invariant violated: balance of {} went negative: {}",
            self.account_id,
            self.balance
        );
    }

    /// Checks that `delta` can be applied without driving the balance negative.
    pub(crate) fn check(&self, delta: i64) -> Result<(), LedgerError> {
        match self.balance.checked_add(delta) {
            Some(next) if next >= 0 => Ok(()),
            Some(_) => Err(LedgerError::InsufficientBalance {
                balance: self.balance,
                requested: delta.saturating_neg(),
            }),
            None => Err(LedgerError::InvalidAmount),
        }
    }

    /// Applies a block that has already been appended to the ledger.
    pub(crate) fn apply(&mut self, block: &Block) {
        debug_assert_eq!(
            block.account_id, self.account_id,
            "Invariant violated: block applied to the wrong account"
        );
        self.balance += block.delta;
        self.history.push(block.summary());
        self.assert_invariants();
    }

    pub(crate) fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub(crate) fn balance(&self) -> i64 {
        self.balance
    }
}

/// Balance and history of one account holder.
#[derive(Debug)]
pub struct Account {
    inner: Mutex<AccountData>,
}

impl Account {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            inner: Mutex::new(AccountData::new(account_id)),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.inner.lock().account_id.clone()
    }

    /// Cached balance; always equals the sum of this account's ledger deltas.
    pub fn balance(&self) -> i64 {
        self.inner.lock().balance
    }

    /// Snapshot of the history lines, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().history.clone()
    }

    /// Holds the account lock for a check-then-act sequence.
    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Account", 3)?;
        state.serialize_field("account_id", &data.account_id)?;
        state.serialize_field("balance", &data.balance)?;
        state.serialize_field("entries", &data.history.len())?;
        state.end()
    }
}
