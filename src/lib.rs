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

//! # Credit Ledger
//!
//! This library records credit-earning and credit-redemption events for a set
//! of account holders in an append-only, hash-chained ledger, and keeps a
//! derived balance per holder.
//!
//! ## Core Components
//!
//! - [`CreditService`]: Validates requests, enforces non-negative balances and is
//!   the only writer to the ledger
//! - [`Ledger`]: Hash-linked chain of [`Block`]s with tamper detection
//! - [`Account`]: Cached balance and history of one holder
//! - [`RewardPolicy`]: Sizing of rewards for credit-worthy events
//! - [`BlockStore`]: Optional durable destination for appended blocks
//! - [`LedgerError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use credit_ledger_rs::{AccountId, CreditService, GENESIS_HASH, LedgerError};
//!
//! let service = CreditService::new();
//!
//! // Grant credits for a verified event
//! let first = service.grant("H1", 3).unwrap();
//! assert_eq!(first.previous_hash, GENESIS_HASH);
//!
//! // Redeem some of them
//! service.redeem("H1", 2, "reusable bag").unwrap();
//! assert_eq!(service.balance_of(&AccountId::from("H1")), 1);
//!
//! // Overdrafts are rejected without touching the chain
//! let result = service.redeem("H1", 5, "bicycle");
//! assert_eq!(result, Err(LedgerError::InsufficientBalance { balance: 1, requested: 5 }));
//! assert_eq!(service.export_ledger().len(), 2);
//!
//! assert!(service.verify_chain().is_ok());
//! ```
//!
//! ## Thread Safety
//!
//! The service handles concurrent access to accounts, serializing operations on
//! the same account and appending to the chain in one global order.

pub mod account;
mod base;
pub mod block;
pub mod error;
pub mod export;
mod ledger;
pub mod policy;
mod service;
pub mod store;

pub use account::Account;
pub use base::AccountId;
pub use block::{Block, GENESIS_HASH};
pub use error::{ChainIntegrityViolation, IntegrityFault, LedgerError, StoreError};
pub use ledger::Ledger;
pub use policy::{FixedReward, RandomReward, RewardPolicy};
pub use service::{BalanceMismatch, CreditService, GRANT_LABEL, OPENING_LABEL};
pub use store::{BlockStore, JsonLinesStore, MemoryStore};
