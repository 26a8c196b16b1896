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

//! CreditService public API integration tests.

use credit_ledger_rs::{
    AccountId, CreditService, FixedReward, GENESIS_HASH, GRANT_LABEL, LedgerError, OPENING_LABEL,
};

fn id(s: &str) -> AccountId {
    AccountId::from(s)
}

// === Scenarios ===

#[test]
fn scenario_a_grants_chain_from_genesis() {
    let service = CreditService::new();
    service.ensure_account("H1").unwrap();
    assert_eq!(service.balance_of(&id("H1")), 0);

    let first = service.grant("H1", 3).unwrap();
    assert_eq!(service.balance_of(&id("H1")), 3);
    assert_eq!(service.export_ledger().len(), 1);
    assert_eq!(first.previous_hash, GENESIS_HASH);

    let second = service.grant("H1", 5).unwrap();
    assert_eq!(service.balance_of(&id("H1")), 8);
    assert_eq!(service.export_ledger().len(), 2);
    assert_eq!(second.previous_hash, first.hash);
}

#[test]
fn scenario_b_redeem_to_zero_then_reject() {
    let service = CreditService::new();
    service.grant("H1", 3).unwrap();
    service.grant("H1", 5).unwrap();

    let block = service.redeem("H1", 8, "X").unwrap();
    assert_eq!(block.delta, -8);
    assert_eq!(block.action_label, "redeemed: X");
    assert_eq!(service.balance_of(&id("H1")), 0);

    let result = service.redeem("H1", 1, "Y");
    assert_eq!(
        result,
        Err(LedgerError::InsufficientBalance {
            balance: 0,
            requested: 1
        })
    );
    assert!(result.unwrap_err().is_business_rejection());
    assert_eq!(service.balance_of(&id("H1")), 0);
    assert_eq!(service.export_ledger().len(), 3);
}

#[test]
fn scenario_c_leaderboard_orders_by_balance() {
    let service = CreditService::new();
    service.grant("H2", 4).unwrap();
    service.grant("H1", 10).unwrap();

    assert_eq!(service.leaderboard(), vec![(id("H1"), 10), (id("H2"), 4)]);
}

#[test]
fn scenario_d_export_preserves_order_and_linkage() {
    let service = CreditService::new();
    let a = service.grant("H1", 3).unwrap();
    let b = service.grant("H2", 4).unwrap();
    let c = service.redeem("H1", 2, "mug").unwrap();

    let exported = service.export_ledger();
    assert_eq!(exported, vec![a, b, c]);
    assert_eq!(exported[0].previous_hash, GENESIS_HASH);
    for pair in exported.windows(2) {
        assert_eq!(pair[1].previous_hash, pair[0].hash);
    }
}

// === Grants ===

#[test]
fn grant_creates_account_and_records_label() {
    let service = CreditService::new();
    let block = service.grant("H1", 2).unwrap();

    assert_eq!(block.account_id, id("H1"));
    assert_eq!(block.action_label, GRANT_LABEL);
    assert_eq!(block.delta, 2);
    assert!(service.get_account(&id("H1")).is_some());
}

#[test]
fn grant_rejects_non_positive_amounts() {
    let service = CreditService::new();
    assert_eq!(service.grant("H1", 0), Err(LedgerError::InvalidAmount));
    assert_eq!(service.grant("H1", -4), Err(LedgerError::InvalidAmount));

    assert!(service.get_account(&id("H1")).is_none());
    assert!(service.export_ledger().is_empty());
}

#[test]
fn grant_rejects_blank_account_id() {
    let service = CreditService::new();
    assert_eq!(service.grant("", 3), Err(LedgerError::EmptyAccountId));
    assert_eq!(service.grant("   ", 3), Err(LedgerError::EmptyAccountId));
    assert!(service.export_ledger().is_empty());
}

#[test]
fn grant_rejects_balance_overflow() {
    let service = CreditService::new();
    service.grant("H1", i64::MAX).unwrap();

    assert_eq!(service.grant("H1", 1), Err(LedgerError::InvalidAmount));
    assert_eq!(service.balance_of(&id("H1")), i64::MAX);
    assert_eq!(service.export_ledger().len(), 1);
}

#[test]
fn reward_records_event_label_and_policy_amount() {
    let service = CreditService::new().with_policy(FixedReward(3));
    let block = service.reward("H1", "segregation verified").unwrap();

    assert_eq!(block.delta, 3);
    assert_eq!(block.action_label, "segregation verified");
    assert_eq!(service.reward("H1", " "), Err(LedgerError::EmptyLabel));
}

#[test]
fn default_reward_policy_grants_between_two_and_five() {
    let service = CreditService::new();
    for _ in 0..100 {
        let block = service.reward("H1", "segregation verified").unwrap();
        assert!((2..=5).contains(&block.delta));
    }
    assert_eq!(
        service.balance_of(&id("H1")),
        service.replay_balance(&id("H1"))
    );
}

#[test]
fn seed_appends_opening_balance_block() {
    let service = CreditService::new();
    let block = service.seed("H1", 10).unwrap();

    assert_eq!(block.action_label, OPENING_LABEL);
    assert_eq!(service.balance_of(&id("H1")), 10);
    assert_eq!(service.replay_balance(&id("H1")), 10);
}

// === Redemptions ===

#[test]
fn redeem_on_unknown_account_creates_nothing() {
    let service = CreditService::new();
    let result = service.redeem("ghost", 1, "mug");

    assert_eq!(
        result,
        Err(LedgerError::InsufficientBalance {
            balance: 0,
            requested: 1
        })
    );
    assert!(service.get_account(&id("ghost")).is_none());
    assert!(service.leaderboard().is_empty());
}

#[test]
fn redeem_rejects_invalid_input_before_balance_check() {
    let service = CreditService::new();
    service.grant("H1", 5).unwrap();

    assert_eq!(service.redeem("H1", 0, "mug"), Err(LedgerError::InvalidAmount));
    assert_eq!(service.redeem("H1", -1, "mug"), Err(LedgerError::InvalidAmount));
    assert_eq!(service.redeem("H1", 1, ""), Err(LedgerError::EmptyLabel));
    assert_eq!(service.redeem("", 1, "mug"), Err(LedgerError::EmptyAccountId));

    assert_eq!(service.balance_of(&id("H1")), 5);
    assert_eq!(service.export_ledger().len(), 1);
}

#[test]
fn failed_redeem_leaves_history_untouched() {
    let service = CreditService::new();
    service.grant("H1", 2).unwrap();
    let before = service.history_of(&id("H1"));

    assert!(service.redeem("H1", 3, "bicycle").is_err());
    assert_eq!(service.history_of(&id("H1")), before);
}

// === Queries ===

#[test]
fn balance_of_unknown_account_is_zero_and_not_created() {
    let service = CreditService::new();
    assert_eq!(service.balance_of(&id("nobody")), 0);
    assert!(service.history_of(&id("nobody")).is_empty());
    assert!(service.get_account(&id("nobody")).is_none());
}

#[test]
fn ensure_account_is_idempotent() {
    let service = CreditService::new();
    service.ensure_account("H1").unwrap();
    service.grant("H1", 4).unwrap();
    service.ensure_account("H1").unwrap();

    assert_eq!(service.balance_of(&id("H1")), 4);
    assert_eq!(service.accounts().count(), 1);
    assert_eq!(service.export_ledger().len(), 1);
    assert_eq!(service.ensure_account(""), Err(LedgerError::EmptyAccountId));
}

#[test]
fn history_is_chronological() {
    let service = CreditService::new();
    service.grant("H1", 3).unwrap();
    service.grant("H2", 9).unwrap();
    service.redeem("H1", 1, "pen").unwrap();

    let history = service.history_of(&id("H1"));
    assert_eq!(history.len(), 2);
    assert!(history[0].starts_with("#0 "));
    assert!(history[0].ends_with("+3 credits: credits granted"));
    assert!(history[1].starts_with("#2 "));
    assert!(history[1].ends_with("-1 credits: redeemed: pen"));

    // Oldest-first snapshot can be reversed for newest-first views.
    let newest_first: Vec<_> = history.iter().rev().collect();
    assert!(newest_first[0].contains("redeemed: pen"));
}

#[test]
fn leaderboard_breaks_ties_by_account_id() {
    let service = CreditService::new();
    service.grant("carol", 5).unwrap();
    service.grant("alice", 5).unwrap();
    service.grant("bob", 7).unwrap();
    service.ensure_account("dave").unwrap();

    assert_eq!(
        service.leaderboard(),
        vec![
            (id("bob"), 7),
            (id("alice"), 5),
            (id("carol"), 5),
            (id("dave"), 0)
        ]
    );
}

#[test]
fn entries_for_lists_account_blocks_in_order() {
    let service = CreditService::new();
    service.grant("H1", 3).unwrap();
    service.grant("H2", 4).unwrap();
    service.redeem("H1", 1, "pen").unwrap();

    let h1 = id("H1");
    let ledger = service.ledger();
    let deltas: Vec<i64> = ledger.entries_for(&h1).map(|b| b.delta).collect();
    assert_eq!(deltas, vec![3, -1]);
}

#[test]
fn audit_balances_finds_no_mismatch() {
    let service = CreditService::new();
    service.grant("H1", 3).unwrap();
    service.grant("H2", 4).unwrap();
    service.redeem("H2", 4, "bag").unwrap();

    assert!(service.audit_balances().is_empty());
    assert_eq!(service.replay_balance(&id("H2")), 0);
}

#[test]
fn verify_chain_after_mixed_operations() {
    let service = CreditService::new();
    assert!(service.verify_chain().is_ok());

    service.grant("H1", 3).unwrap();
    let _ = service.redeem("H1", 10, "tv");
    service.redeem("H1", 3, "mug").unwrap();
    service.grant("H2", 1).unwrap();

    assert!(service.verify_chain().is_ok());
}
