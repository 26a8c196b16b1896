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

//! Reward sizing policies.
//!
//! How many credits a credit-worthy event earns is a policy decision outside
//! the ledger's integrity contract. The service only requires the drawn
//! amount to be positive.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

/// Decides the size of a reward for one credit-worthy event.
pub trait RewardPolicy: Send + Sync {
    /// Amount of credits to grant. Must be positive.
    fn draw(&self) -> i64;
}

/// Always grants the same amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReward(pub i64);

impl RewardPolicy for FixedReward {
    fn draw(&self) -> i64 {
        self.0
    }
}

/// Uniform draw over an inclusive range.
#[derive(Debug)]
pub struct RandomReward {
    range: RangeInclusive<i64>,
    rng: Mutex<StdRng>,
}

impl RandomReward {
    /// Smallest reward of the default policy.
    pub const DEFAULT_MIN: i64 = 2;
    /// Largest reward of the default policy.
    pub const DEFAULT_MAX: i64 = 5;

    /// Draws from `range` using OS entropy.
    ///
    /// Returns `None` if the range is empty or admits non-positive amounts.
    pub fn new(range: RangeInclusive<i64>) -> Option<Self> {
        Self::with_rng(range, StdRng::from_entropy())
    }

    /// Reproducible variant of [`new`](Self::new).
    pub fn seeded(range: RangeInclusive<i64>, seed: u64) -> Option<Self> {
        Self::with_rng(range, StdRng::seed_from_u64(seed))
    }

    fn with_rng(range: RangeInclusive<i64>, rng: StdRng) -> Option<Self> {
        if range.is_empty() || *range.start() <= 0 {
            return None;
        }
        Some(Self {
            range,
            rng: Mutex::new(rng),
        })
    }

    pub fn range(&self) -> &RangeInclusive<i64> {
        &self.range
    }
}

impl Default for RandomReward {
    fn default() -> Self {
        Self {
            range: Self::DEFAULT_MIN..=Self::DEFAULT_MAX,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl RewardPolicy for RandomReward {
    fn draw(&self) -> i64 {
        self.rng.lock().gen_range(self.range.clone())
    }
}

impl<F> RewardPolicy for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn draw(&self) -> i64 {
        self()
    }
}
