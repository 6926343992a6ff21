//! Events emitted by the ledger.
//!
//! Every successful mutating operation appends one or more events to the
//! vault's event log. External indexers drain the log and build their own
//! views from it.

use serde::{Deserialize, Serialize};

use crate::member::LeaveReason;
use crate::{Address, Amount, Fraction, U256};

/// Envelope for all ledger events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the vault's event log, starting at 0.
    pub sequence: u64,
    /// Unix timestamp (seconds) when the event was emitted.
    pub timestamp: u64,
    /// Event payload.
    pub kind: VaultEvent,
}

/// All ledger event payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultEvent {
    // Membership
    MemberJoined {
        member: Address,
    },
    MemberParted {
        member: Address,
        reason: LeaveReason,
    },
    MemberWeightChanged {
        member: Address,
        old_weight: U256,
        new_weight: U256,
    },
    JoinPartAgentAdded {
        agent: Address,
    },
    JoinPartAgentRemoved {
        agent: Address,
    },

    // Revenue
    RevenueReceived {
        amount: Amount,
    },
    NewEarnings {
        earnings_per_unit_weight: Amount,
        total_weight: U256,
    },
    AdminFeeCharged {
        amount: Amount,
        admin: Address,
    },
    ProtocolFeeCharged {
        amount: Amount,
        beneficiary: Address,
    },

    // Balances
    EarningsWithdrawn {
        member: Address,
        recipient: Address,
        amount: Amount,
    },
    TransferWithinContract {
        from: Address,
        to: Address,
        amount: Amount,
    },
    TransferToAddressInContract {
        from: Address,
        to: Address,
        amount: Amount,
    },

    // Administration
    AdminFeeChanged {
        admin_fee: Fraction,
        admin: Address,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
    MetadataChanged {
        metadata: String,
    },

    // Modules
    ModuleInstalled {
        module_id: u32,
        name: String,
    },
    ListenerAdded {
        hook: String,
        module_id: u32,
    },
    ListenerRemoved {
        hook: String,
        module_id: u32,
    },
    ModulesLocked,
    ModuleReset {
        module_id: u32,
    },
    MemberBanned {
        member: Address,
        banned_until: u64,
    },
    BanRemoved {
        member: Address,
    },
}

impl VaultEvent {
    /// Event name as indexers know it.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::MemberJoined { .. } => "MemberJoined",
            VaultEvent::MemberParted { .. } => "MemberParted",
            VaultEvent::MemberWeightChanged { .. } => "MemberWeightChanged",
            VaultEvent::JoinPartAgentAdded { .. } => "JoinPartAgentAdded",
            VaultEvent::JoinPartAgentRemoved { .. } => "JoinPartAgentRemoved",
            VaultEvent::RevenueReceived { .. } => "RevenueReceived",
            VaultEvent::NewEarnings { .. } => "NewEarnings",
            VaultEvent::AdminFeeCharged { .. } => "AdminFeeCharged",
            VaultEvent::ProtocolFeeCharged { .. } => "ProtocolFeeCharged",
            VaultEvent::EarningsWithdrawn { .. } => "EarningsWithdrawn",
            VaultEvent::TransferWithinContract { .. } => "TransferWithinContract",
            VaultEvent::TransferToAddressInContract { .. } => "TransferToAddressInContract",
            VaultEvent::AdminFeeChanged { .. } => "AdminFeeChanged",
            VaultEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
            VaultEvent::MetadataChanged { .. } => "MetadataChanged",
            VaultEvent::ModuleInstalled { .. } => "ModuleInstalled",
            VaultEvent::ListenerAdded { .. } => "ListenerAdded",
            VaultEvent::ListenerRemoved { .. } => "ListenerRemoved",
            VaultEvent::ModulesLocked => "ModulesLocked",
            VaultEvent::ModuleReset { .. } => "ModuleReset",
            VaultEvent::MemberBanned { .. } => "MemberBanned",
            VaultEvent::BanRemoved { .. } => "BanRemoved",
        }
    }
}
