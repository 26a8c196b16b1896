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

//! Account ledger service.
//!
//! The [`CreditService`] is the only writer to the [`Ledger`]. It validates
//! requests, enforces the non-negative balance rule and keeps one
//! [`Account`] record per holder in step with the chain.
//!
//! # Operations
//!
//! - **Grants**: credit an account, creating it if needed.
//! - **Rewards**: grant an amount drawn from the injected [`RewardPolicy`].
//! - **Redemptions**: debit an account; rejected if the balance would go negative.
//! - **Queries**: balance, history, leaderboard, chain audit and export.
//!
//! # Thread Safety
//!
//! Accounts live in a [`DashMap`], each behind its own mutex, so operations on
//! different accounts only meet at the ledger's write lock, which gives the
//! chain its single total order. Locks are always taken in the order
//! account, ledger, store: the balance check, the append and the balance
//! update form one critical section.

use crate::account::Account;
use crate::base::AccountId;
use crate::block::Block;
use crate::error::{ChainIntegrityViolation, LedgerError, StoreError};
use crate::ledger::Ledger;
use crate::policy::{RandomReward, RewardPolicy};
use crate::store::{BlockStore, MemoryStore};
use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Action label of blocks appended by [`CreditService::grant`].
pub const GRANT_LABEL: &str = "credits granted";

/// Action label of blocks appended by [`CreditService::seed`].
pub const OPENING_LABEL: &str = "opening balance";

/// An account whose cached balance disagrees with its ledger entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub account_id: AccountId,
    pub cached: i64,
    pub replayed: i64,
}

/// Account-facing front of the ledger.
///
/// # Invariants
///
/// - Every balance equals the sum of `delta` over the account's blocks.
/// - No balance is ever negative; a rejected operation appends nothing.
/// - Each successful grant or redemption appends exactly one block.
pub struct CreditService<S: BlockStore = MemoryStore> {
    /// Account records indexed by holder.
    accounts: DashMap<AccountId, Account>,
    /// The chain; its write lock is the global serialization point.
    ledger: RwLock<Ledger>,
    store: S,
    policy: Box<dyn RewardPolicy>,
}

impl CreditService<MemoryStore> {
    /// Creates an in-memory service with the default reward policy.
    pub fn new() -> Self {
        Self::with_store(MemoryStore)
    }
}

impl Default for CreditService<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BlockStore> CreditService<S> {
    /// Creates an empty service writing through to `store`.
    ///
    /// Anything already in the store is ignored; use [`open`](Self::open)
    /// to resume a persisted chain.
    pub fn with_store(store: S) -> Self {
        Self {
            accounts: DashMap::new(),
            ledger: RwLock::new(Ledger::new()),
            store,
            policy: Box::new(RandomReward::default()),
        }
    }

    /// Resumes the chain persisted in `store`.
    ///
    /// The chain is verified first, then replayed to rebuild balances and
    /// histories.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Integrity`] - The persisted chain fails verification.
    /// - [`StoreError::Overdraft`] - A block would drive a balance negative.
    /// - Any error raised by [`BlockStore::load`].
    pub fn open(store: S) -> Result<Self, StoreError> {
        let ledger = Ledger::from_blocks(store.load()?);
        ledger.verify_chain()?;

        let accounts: DashMap<AccountId, Account> = DashMap::new();
        for block in ledger.blocks() {
            let account = accounts
                .entry(block.account_id.clone())
                .or_insert_with(|| Account::new(block.account_id.clone()));
            let mut data = account.lock();
            if data.check(block.delta).is_err() {
                return Err(StoreError::Overdraft {
                    index: block.sequence_index,
                    account_id: block.account_id.clone(),
                });
            }
            data.apply(block);
        }
        info!(
            blocks = ledger.len(),
            accounts = accounts.len(),
            "resumed ledger from store"
        );

        Ok(Self {
            accounts,
            ledger: RwLock::new(ledger),
            store,
            policy: Box::new(RandomReward::default()),
        })
    }

    /// Replaces the reward policy used by [`reward`](Self::reward).
    pub fn with_policy(mut self, policy: impl RewardPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Registers an account with a zero balance. Idempotent; appends nothing.
    ///
    /// Queries never create accounts, so this is the only way for a holder
    /// without ledger entries to appear on the leaderboard.
    pub fn ensure_account(&self, account_id: impl Into<AccountId>) -> Result<(), LedgerError> {
        let account_id = validated_id(account_id)?;
        self.account(&account_id);
        Ok(())
    }

    /// Credits `amount` to the account, creating it if needed.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::EmptyAccountId`] - Blank account identifier.
    /// - [`LedgerError::InvalidAmount`] - `amount` is not positive, or would overflow.
    /// - [`LedgerError::Storage`] - The block store rejected the append.
    pub fn grant(
        &self,
        account_id: impl Into<AccountId>,
        amount: i64,
    ) -> Result<Block, LedgerError> {
        self.credit(account_id, amount, GRANT_LABEL.to_string())
    }

    /// Grants an amount drawn from the reward policy for a credit-worthy
    /// event, recording `event_label` as the block's action.
    pub fn reward(
        &self,
        account_id: impl Into<AccountId>,
        event_label: &str,
    ) -> Result<Block, LedgerError> {
        if event_label.trim().is_empty() {
            return Err(LedgerError::EmptyLabel);
        }
        self.credit(account_id, self.policy.draw(), event_label.to_string())
    }

    /// Pre-seeds an account with a starting balance.
    ///
    /// The opening balance is recorded as a block like any other grant.
    pub fn seed(
        &self,
        account_id: impl Into<AccountId>,
        opening_balance: i64,
    ) -> Result<Block, LedgerError> {
        self.credit(account_id, opening_balance, OPENING_LABEL.to_string())
    }

    /// Debits `cost` from the account in exchange for `reward_label`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientBalance`] - `cost` exceeds the balance. This
    ///   is a normal business outcome; nothing is changed.
    /// - [`LedgerError::EmptyAccountId`], [`LedgerError::EmptyLabel`],
    ///   [`LedgerError::InvalidAmount`] - Malformed request.
    /// - [`LedgerError::Storage`] - The block store rejected the append.
    pub fn redeem(
        &self,
        account_id: impl Into<AccountId>,
        cost: i64,
        reward_label: &str,
    ) -> Result<Block, LedgerError> {
        let account_id = validated_id(account_id)?;
        if reward_label.trim().is_empty() {
            return Err(LedgerError::EmptyLabel);
        }
        if cost <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        // Redeeming against an unknown account never creates it.
        let Some(account) = self.accounts.get(&account_id) else {
            warn!(account = %account_id, cost, "redemption rejected: unknown account");
            return Err(LedgerError::InsufficientBalance {
                balance: 0,
                requested: cost,
            });
        };
        self.commit(&account, -cost, format!("redeemed: {reward_label}"))
            .inspect_err(|e| {
                if e.is_business_rejection() {
                    warn!(account = %account_id, cost, reward = reward_label, "redemption rejected: {e}");
                }
            })
    }

    /// Current balance; 0 for an unknown account, which is not created.
    pub fn balance_of(&self, account_id: &AccountId) -> i64 {
        self.accounts
            .get(account_id)
            .map_or(0, |account| account.balance())
    }

    /// History lines of the account, oldest first. Empty for unknown accounts.
    pub fn history_of(&self, account_id: &AccountId) -> Vec<String> {
        self.accounts
            .get(account_id)
            .map(|account| account.history())
            .unwrap_or_default()
    }

    /// All known accounts by balance, highest first; ties by account id
    /// ascending.
    pub fn leaderboard(&self) -> Vec<(AccountId, i64)> {
        let mut ranking: Vec<(AccountId, i64)> = self
            .accounts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().balance()))
            .collect();
        ranking.sort_by(|(a_id, a_balance), (b_id, b_balance)| {
            b_balance.cmp(a_balance).then_with(|| a_id.cmp(b_id))
        });
        ranking
    }

    /// Audits the whole chain. Read-only.
    pub fn verify_chain(&self) -> Result<(), ChainIntegrityViolation> {
        let result = self.ledger.read().verify_chain();
        if let Err(violation) = &result {
            warn!(index = violation.index, fault = %violation.fault, "chain integrity violation");
        }
        result
    }

    /// Copy of every block, in append order.
    pub fn export_ledger(&self) -> Vec<Block> {
        self.ledger.read().blocks().to_vec()
    }

    /// Read access to the chain, e.g. for [`Ledger::entries_for`].
    ///
    /// Writers wait while the guard is held.
    pub fn ledger(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read()
    }

    /// Recomputes the balance from the ledger instead of the cache.
    pub fn replay_balance(&self, account_id: &AccountId) -> i64 {
        self.ledger.read().replay_balance(account_id)
    }

    /// Compares every cached balance with its ledger replay.
    ///
    /// Returns the accounts that disagree; empty when consistent.
    pub fn audit_balances(&self) -> Vec<BalanceMismatch> {
        let mut mismatches: Vec<BalanceMismatch> = self
            .accounts
            .iter()
            .filter_map(|entry| {
                // Account before ledger, as on the write path.
                let data = entry.value().lock();
                let replayed = self.ledger.read().replay_balance(entry.key());
                (data.balance() != replayed).then(|| BalanceMismatch {
                    account_id: entry.key().clone(),
                    cached: data.balance(),
                    replayed,
                })
            })
            .collect();
        mismatches.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        mismatches
    }

    /// Returns an iterator over all accounts.
    pub fn accounts(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, AccountId, Account>> {
        self.accounts.iter()
    }

    /// Retrieves an account by id, or `None` if it was never referenced.
    pub fn get_account(&self, account_id: &AccountId) -> Option<Ref<'_, AccountId, Account>> {
        self.accounts.get(account_id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn credit(
        &self,
        account_id: impl Into<AccountId>,
        amount: i64,
        label: String,
    ) -> Result<Block, LedgerError> {
        let account_id = validated_id(account_id)?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let account = self.account(&account_id);
        self.commit(&account, amount, label)
    }

    /// Existing account or a freshly registered one.
    fn account(&self, account_id: &AccountId) -> Ref<'_, AccountId, Account> {
        if let Some(account) = self.accounts.get(account_id) {
            return account;
        }
        self.accounts
            .entry(account_id.clone())
            .or_insert_with(|| {
                info!(account = %account_id, "account created");
                Account::new(account_id.clone())
            })
            .downgrade()
    }

    /// Checks, appends and applies one delta as a single critical section.
    fn commit(&self, account: &Account, delta: i64, label: String) -> Result<Block, LedgerError> {
        let mut data = account.lock();
        data.check(delta)?;

        let mut ledger = self.ledger.write();
        let block = ledger.next_block(data.account_id().clone(), label, delta);
        // Persist first: a store failure must leave the chain untouched.
        self.store.append(&block)?;
        ledger.push(block.clone());
        data.apply(&block);

        debug!(
            account = %block.account_id,
            delta,
            balance = data.balance(),
            "balance updated"
        );
        Ok(block)
    }
}

fn validated_id(account_id: impl Into<AccountId>) -> Result<AccountId, LedgerError> {
    let account_id = account_id.into();
    if account_id.is_blank() {
        return Err(LedgerError::EmptyAccountId);
    }
    Ok(account_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FixedReward;
    use crate::store::JsonLinesStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(s: &str) -> AccountId {
        AccountId::from(s)
    }

    /// Store that fails every append after the first `limit`.
    struct FlakyStore {
        limit: usize,
        appended: AtomicUsize,
    }

    impl BlockStore for FlakyStore {
        fn append(&self, _block: &Block) -> Result<(), StoreError> {
            if self.appended.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Err(std::io::Error::other("disk full").into());
            }
            Ok(())
        }

        fn load(&self) -> Result<Vec<Block>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn store_failure_leaves_state_untouched() {
        let service = CreditService::with_store(FlakyStore {
            limit: 1,
            appended: AtomicUsize::new(0),
        });
        service.grant("H1", 3).unwrap();

        let result = service.grant("H1", 5);
        assert!(matches!(result, Err(LedgerError::Storage { .. })));
        assert_eq!(service.balance_of(&id("H1")), 3);
        assert_eq!(service.history_of(&id("H1")).len(), 1);
        assert_eq!(service.export_ledger().len(), 1);
    }

    #[test]
    fn reward_uses_injected_policy() {
        let service = CreditService::new().with_policy(FixedReward(4));
        let block = service.reward("H1", "segregation verified").unwrap();
        assert_eq!(block.delta, 4);
        assert_eq!(block.action_label, "segregation verified");
        assert_eq!(service.balance_of(&id("H1")), 4);
    }

    #[test]
    fn reward_rejects_non_positive_policy_output() {
        let service = CreditService::new().with_policy(FixedReward(0));
        assert_eq!(
            service.reward("H1", "segregation verified"),
            Err(LedgerError::InvalidAmount)
        );
        assert!(service.get_account(&id("H1")).is_none());
    }

    #[test]
    fn open_rebuilds_balances_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.jsonl");

        {
            let service = CreditService::with_store(JsonLinesStore::open(&path).unwrap());
            service.grant("H1", 3).unwrap();
            service.grant("H2", 4).unwrap();
            service.redeem("H1", 2, "mug").unwrap();
        }

        let service = CreditService::open(JsonLinesStore::open(&path).unwrap()).unwrap();
        assert_eq!(service.store().load().unwrap().len(), 3);
        assert_eq!(service.balance_of(&id("H1")), 1);
        assert_eq!(service.balance_of(&id("H2")), 4);
        assert_eq!(service.history_of(&id("H1")).len(), 2);
        assert!(service.verify_chain().is_ok());

        let block = service.grant("H2", 1).unwrap();
        assert_eq!(block.sequence_index, 3);
    }

    #[test]
    fn open_rejects_tampered_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.jsonl");

        {
            let service = CreditService::with_store(JsonLinesStore::open(&path).unwrap());
            service.grant("H1", 3).unwrap();
            service.grant("H1", 4).unwrap();
        }
        let journal = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, journal.replace("\"delta\":4", "\"delta\":40")).unwrap();

        let result = CreditService::open(JsonLinesStore::open(&path).unwrap());
        match result {
            Err(StoreError::Integrity(violation)) => assert_eq!(violation.index, 1),
            Err(other) => panic!("expected integrity error, got {other}"),
            Ok(_) => panic!("tampered journal was accepted"),
        }
    }

    #[test]
    fn open_rejects_overdrawing_journal() {
        let mut ledger = Ledger::new();
        ledger.append(id("H1"), "opening", 2);
        ledger.append(id("H1"), "redeemed: too much", -3);

        struct Fixed(Vec<Block>);
        impl BlockStore for Fixed {
            fn append(&self, _block: &Block) -> Result<(), StoreError> {
                Ok(())
            }
            fn load(&self) -> Result<Vec<Block>, StoreError> {
                Ok(self.0.clone())
            }
        }

        match CreditService::open(Fixed(ledger.blocks().to_vec())) {
            Err(StoreError::Overdraft { index, account_id }) => {
                assert_eq!(index, 1);
                assert_eq!(account_id, id("H1"));
            }
            Err(other) => panic!("expected overdraft, got {other}"),
            Ok(_) => panic!("overdrawing journal was accepted"),
        }
    }
}
