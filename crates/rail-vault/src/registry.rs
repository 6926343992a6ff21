//! Membership registry.
//!
//! Join/part agents add and remove members and set their weights. Members may
//! also part on their own. Every join and part settles the member first, so a
//! returning member keeps what it earned before and never earns for the time
//! it was away.
//!
//! Batch operations are all-or-nothing: the first failing element aborts the
//! whole batch.

use rail_types::events::VaultEvent;
use rail_types::fixed::SCALE;
use rail_types::member::{LeaveReason, MemberStatus};
use rail_types::{Address, U256};

use crate::member::MemberRecord;
use crate::vault::Vault;
use crate::{checked_add, checked_sub, Result, VaultError};

impl Vault {
    /// Add `member` with weight 1.0. Agent only.
    pub fn add_member(&mut self, caller: Address, member: Address) -> Result<()> {
        self.add_member_with_weight(caller, member, SCALE)
    }

    /// Add `member` with a raw fixed-point `weight`. Agent only.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotAuthorized`] if `caller` is not an agent
    /// - [`VaultError::ZeroWeight`] if `weight` is zero
    /// - [`VaultError::AlreadyMember`] if `member` is active
    /// - any error from a join listener
    pub fn add_member_with_weight(
        &mut self,
        caller: Address,
        member: Address,
        weight: U256,
    ) -> Result<()> {
        self.transact(|vault| {
            vault.require_agent(caller, "add members")?;
            vault.join(member, weight)
        })
    }

    /// Add several members with weight 1.0.
    pub fn add_members(&mut self, caller: Address, members: &[Address]) -> Result<()> {
        self.transact(|vault| {
            vault.require_agent(caller, "add members")?;
            for member in members {
                vault.join(*member, SCALE)?;
            }
            Ok(())
        })
    }

    /// Add several members with individual weights.
    pub fn add_members_with_weights(
        &mut self,
        caller: Address,
        members: &[Address],
        weights: &[U256],
    ) -> Result<()> {
        self.transact(|vault| {
            vault.require_agent(caller, "add members")?;
            require_same_length(members.len(), weights.len())?;
            for (member, weight) in members.iter().zip(weights) {
                vault.join(*member, *weight)?;
            }
            Ok(())
        })
    }

    /// Remove an active member with an explicit reason. Agent only.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotAuthorized`] if `caller` is not an agent
    /// - [`VaultError::NotActiveMember`] if `member` is not active
    /// - any error from a part listener
    pub fn remove_member(
        &mut self,
        caller: Address,
        member: Address,
        reason: LeaveReason,
    ) -> Result<()> {
        self.transact(|vault| {
            vault.require_agent(caller, "remove members")?;
            vault.part(member, reason)
        })
    }

    /// Part a member. The member itself may call this, as may any agent.
    pub fn part_member(&mut self, caller: Address, member: Address) -> Result<()> {
        self.transact(|vault| {
            let reason = if caller == member {
                LeaveReason::SelfRemoval
            } else if vault.is_agent(caller) {
                LeaveReason::Agent
            } else {
                return Err(VaultError::NotAuthorized {
                    caller,
                    action: "part other members",
                });
            };
            vault.part(member, reason)
        })
    }

    /// Part several members. Agent only.
    pub fn part_members(&mut self, caller: Address, members: &[Address]) -> Result<()> {
        self.transact(|vault| {
            vault.require_agent(caller, "part members")?;
            for member in members {
                vault.part(*member, LeaveReason::Agent)?;
            }
            Ok(())
        })
    }

    /// Set a member's weight. Agent only.
    ///
    /// Weight zero removes an active member. A positive weight adds a member
    /// that is not active, and otherwise adjusts the weight in place.
    pub fn set_member_weight(&mut self, caller: Address, member: Address, weight: U256) -> Result<()> {
        self.transact(|vault| {
            vault.require_agent(caller, "set member weights")?;
            vault.reweight(member, weight)
        })
    }

    /// Set several weights at once.
    pub fn set_member_weights(
        &mut self,
        caller: Address,
        members: &[Address],
        weights: &[U256],
    ) -> Result<()> {
        self.transact(|vault| {
            vault.require_agent(caller, "set member weights")?;
            require_same_length(members.len(), weights.len())?;
            for (member, weight) in members.iter().zip(weights) {
                vault.reweight(*member, *weight)?;
            }
            Ok(())
        })
    }

    /// Register a join/part agent. Owner only.
    pub fn add_join_part_agent(&mut self, caller: Address, agent: Address) -> Result<()> {
        self.transact(|vault| {
            vault.require_owner(caller, "add join/part agents")?;
            vault.insert_agent(agent)
        })
    }

    /// Deregister a join/part agent. Owner only.
    pub fn remove_join_part_agent(&mut self, caller: Address, agent: Address) -> Result<()> {
        self.transact(|vault| {
            vault.require_owner(caller, "remove join/part agents")?;
            if !vault.agents_mut().remove(&agent) {
                return Err(VaultError::NotActiveAgent(agent));
            }
            vault.emit(VaultEvent::JoinPartAgentRemoved { agent });
            tracing::info!(agent = %agent, "vault: join/part agent removed");
            Ok(())
        })
    }

    pub(crate) fn insert_agent(&mut self, agent: Address) -> Result<()> {
        if !self.agents_mut().insert(agent) {
            return Err(VaultError::AlreadyActiveAgent(agent));
        }
        self.emit(VaultEvent::JoinPartAgentAdded { agent });
        tracing::info!(agent = %agent, "vault: join/part agent added");
        Ok(())
    }

    fn join(&mut self, member: Address, weight: U256) -> Result<()> {
        if weight.is_zero() {
            return Err(VaultError::ZeroWeight(member));
        }
        let mut record = self.settle_member(member)?;
        if record.is_active() {
            return Err(VaultError::AlreadyMember(member));
        }
        let was_inactive = record.status == MemberStatus::Inactive;

        record.status = MemberStatus::Active;
        record.weight = weight;
        record.earnings_per_weight_at_settle = self.ledger.earnings_per_weight;
        record.joined_at = self.now();
        self.store_member(member, record);

        self.ledger.total_weight = checked_add(self.ledger.total_weight, weight)?;
        self.ledger.active_member_count += 1;
        if was_inactive {
            self.ledger.inactive_member_count = self.ledger.inactive_member_count.saturating_sub(1);
        }

        self.emit(VaultEvent::MemberJoined { member });
        self.emit(VaultEvent::MemberWeightChanged {
            member,
            old_weight: U256::zero(),
            new_weight: weight,
        });
        tracing::info!(member = %member, weight = %weight, rejoin = was_inactive, "vault: member joined");

        self.notify_join(member)
    }

    pub(crate) fn part(&mut self, member: Address, reason: LeaveReason) -> Result<()> {
        let mut record = self.settle_member(member)?;
        if !record.is_active() {
            return Err(VaultError::NotActiveMember(member));
        }
        let old_weight = record.weight;

        record.status = MemberStatus::Inactive;
        record.weight = U256::zero();
        self.store_member(member, record);

        self.ledger.total_weight = checked_sub(self.ledger.total_weight, old_weight)?;
        self.ledger.active_member_count = self.ledger.active_member_count.saturating_sub(1);
        self.ledger.inactive_member_count += 1;

        self.emit(VaultEvent::MemberParted { member, reason });
        self.emit(VaultEvent::MemberWeightChanged {
            member,
            old_weight,
            new_weight: U256::zero(),
        });
        tracing::info!(member = %member, reason = ?reason, "vault: member parted");

        self.notify_part(member, reason)
    }

    fn reweight(&mut self, member: Address, weight: U256) -> Result<()> {
        if weight.is_zero() {
            return self.part(member, LeaveReason::Agent);
        }
        let mut record = self.settle_member(member)?;
        if !record.is_active() {
            return self.join(member, weight);
        }
        let old_weight = record.weight;
        if old_weight == weight {
            return Ok(());
        }
        record.weight = weight;
        self.store_member(member, record);

        let without_old = checked_sub(self.ledger.total_weight, old_weight)?;
        self.ledger.total_weight = checked_add(without_old, weight)?;

        self.emit(VaultEvent::MemberWeightChanged {
            member,
            old_weight,
            new_weight: weight,
        });
        tracing::debug!(member = %member, old_weight = %old_weight, new_weight = %weight, "vault: member weight changed");
        Ok(())
    }

    // ----- queries -----

    /// Whether `member` is active.
    pub fn is_member(&self, member: Address) -> bool {
        self.record(member).is_active()
    }

    /// Raw fixed-point weight of `member`, zero unless active.
    pub fn member_weight(&self, member: Address) -> U256 {
        self.record(member).weight
    }

    pub fn member_status(&self, member: Address) -> MemberStatus {
        self.record(member).status
    }

    /// Stored record of `member`, as of its last settlement.
    pub fn member_record(&self, member: Address) -> MemberRecord {
        self.record(member)
    }

    pub fn active_member_count(&self) -> u64 {
        self.ledger.active_member_count
    }

    pub fn inactive_member_count(&self) -> u64 {
        self.ledger.inactive_member_count
    }

    /// Sum of all active weights.
    pub fn total_weight(&self) -> U256 {
        self.ledger.total_weight
    }

    pub fn is_agent(&self, address: Address) -> bool {
        self.agent_set().contains(&address)
    }

    pub fn agent_count(&self) -> u64 {
        self.agent_set().len() as u64
    }

    /// Registered agents in address order.
    pub fn agents(&self) -> impl Iterator<Item = Address> + '_ {
        self.agent_set().iter().copied()
    }
}

fn require_same_length(left: usize, right: usize) -> Result<()> {
    if left != right {
        return Err(VaultError::LengthMismatch { left, right });
    }
    Ok(())
}
