//! Member status, leave reasons and statistics records.

use serde::{Deserialize, Serialize};

use crate::{Amount, U256};

/// Lifecycle status of a member record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    /// Never joined and never received a balance.
    #[default]
    None,
    /// Currently receives a share of revenue.
    Active,
    /// Parted, removed, or only holds an in-vault balance.
    Inactive,
}

impl MemberStatus {
    /// Numeric status code used by indexers (`0`, `1`, `2`).
    pub fn code(&self) -> u8 {
        match self {
            MemberStatus::None => 0,
            MemberStatus::Active => 1,
            MemberStatus::Inactive => 2,
        }
    }
}

/// Why a member left. Passed to part listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// The member parted on its own.
    SelfRemoval,
    /// A join/part agent removed the member.
    Agent,
    /// The member was banned.
    Banned,
}

impl LeaveReason {
    /// Numeric leave condition code (`0`, `1`, `2`).
    pub fn code(&self) -> u8 {
        match self {
            LeaveReason::SelfRemoval => 0,
            LeaveReason::Agent => 1,
            LeaveReason::Banned => 2,
        }
    }

    /// Parse a numeric leave condition code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LeaveReason::SelfRemoval),
            1 => Some(LeaveReason::Agent),
            2 => Some(LeaveReason::Banned),
            _ => None,
        }
    }
}

/// Per-member statistics returned by the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStats {
    /// Current status.
    pub status: MemberStatus,
    /// Lifetime credited earnings, settled up to now.
    pub total_earnings: Amount,
    /// `total_earnings - withdrawn`.
    pub withdrawable_earnings: Amount,
    /// Raw fixed-point weight (zero unless active).
    pub weight: U256,
}

/// Aggregate ledger statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStats {
    /// All revenue ever distributed (member earnings + fees).
    pub total_revenue: Amount,
    /// Revenue assigned to members.
    pub total_earnings: Amount,
    /// Revenue assigned to the admin.
    pub total_admin_fees: Amount,
    /// Revenue assigned to the protocol fee beneficiary.
    pub total_protocol_fees: Amount,
    /// Tokens paid out of the vault.
    pub total_withdrawn: Amount,
    /// Members currently receiving revenue.
    pub active_member_count: u64,
    /// Records that hold balance but are not active.
    pub inactive_member_count: u64,
    /// Earnings of a weight-1.0 member that has been active since genesis.
    pub lifetime_member_earnings: Amount,
    /// Registered join/part agents.
    pub join_part_agent_count: u64,
    /// Sum of all active weights (raw fixed point).
    pub total_weight: U256,
}

impl VaultStats {
    /// Tokens members and fee beneficiaries could still withdraw, counting
    /// undistributed dust.
    pub fn total_withdrawable(&self) -> Amount {
        self.total_revenue.saturating_sub(self.total_withdrawn)
    }
}
