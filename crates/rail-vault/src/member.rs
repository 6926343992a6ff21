//! Per-member ledger record.
//!
//! ## Settlement
//!
//! ```text
//! pending  = weight * (earnings_per_weight - earnings_per_weight_at_settle) / 10^18
//! settle():  total_earnings += pending; earnings_per_weight_at_settle = earnings_per_weight
//! ```
//!
//! Settling twice against the same accumulator credits nothing the second time.
//! Every read or write of a member's balances settles first.

use rail_types::fixed::mul_scaled;
use rail_types::member::{MemberStats, MemberStatus};
use rail_types::{Amount, U256};
use serde::{Deserialize, Serialize};

use crate::{checked_add, checked_sub, Result};

/// Ledger state of one address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Lifecycle status.
    pub status: MemberStatus,
    /// Raw fixed-point weight. Zero unless active.
    pub weight: U256,
    /// Accumulator value at the last settlement.
    pub earnings_per_weight_at_settle: U256,
    /// Lifetime credited earnings.
    pub total_earnings: Amount,
    /// Lifetime amount withdrawn or transferred away.
    pub withdrawn: Amount,
    /// Timestamp of the latest join. Zero for addresses that never joined.
    #[serde(default)]
    pub joined_at: u64,
}

impl MemberRecord {
    /// Whether the member currently receives revenue.
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    /// `total_earnings - withdrawn`.
    pub fn withdrawable(&self) -> Amount {
        self.total_earnings.saturating_sub(self.withdrawn)
    }

    /// Earnings accrued since the last settlement against `earnings_per_weight`.
    pub fn pending(&self, earnings_per_weight: U256) -> Result<Amount> {
        if self.weight.is_zero() {
            return Ok(Amount::zero());
        }
        let delta = checked_sub(earnings_per_weight, self.earnings_per_weight_at_settle)?;
        Ok(mul_scaled(self.weight, delta)?)
    }

    /// Credit pending earnings and move the snapshot up to `earnings_per_weight`.
    /// Returns the amount credited.
    pub fn settle(&mut self, earnings_per_weight: U256) -> Result<Amount> {
        let pending = self.pending(earnings_per_weight)?;
        self.total_earnings = checked_add(self.total_earnings, pending)?;
        self.earnings_per_weight_at_settle = earnings_per_weight;
        Ok(pending)
    }

    /// A settled copy of this record, leaving `self` untouched.
    pub fn settled(mut self, earnings_per_weight: U256) -> Result<Self> {
        self.settle(earnings_per_weight)?;
        Ok(self)
    }

    /// Public statistics for this record. Zeroed when the status is `None`.
    pub fn stats(&self) -> MemberStats {
        if self.status == MemberStatus::None {
            return MemberStats::default();
        }
        MemberStats {
            status: self.status,
            total_earnings: self.total_earnings,
            withdrawable_earnings: self.withdrawable(),
            weight: self.weight,
        }
    }
}
