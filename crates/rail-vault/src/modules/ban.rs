//! Time-limited bans.
//!
//! Banning removes an active member with [`LeaveReason::Banned`] and keeps the
//! address from re-joining until the ban expires. Addresses that never joined
//! can be banned in advance. Bans are managed by join/part agents through a
//! [`BanHandle`].

use std::any::Any;
use std::collections::HashMap;

use rail_types::events::VaultEvent;
use rail_types::member::LeaveReason;
use rail_types::Address;

use super::{Hook, ModuleContext, ModuleError, ModuleId, VaultModule};
use crate::vault::Vault;
use crate::{Result, VaultError};

/// Expiry of a ban without a duration.
pub const PERMANENT: u64 = u64::MAX;

/// Ban state. Listens on [`Hook::Join`].
#[derive(Debug, Clone, Default)]
pub struct BanModule {
    banned_until: HashMap<Address, u64>,
}

impl BanModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `member` is banned at time `now`.
    pub fn is_banned_at(&self, member: Address, now: u64) -> bool {
        self.banned_until
            .get(&member)
            .is_some_and(|until| now < *until)
    }

    /// Stored expiry for `member`, including expired bans.
    pub fn banned_until(&self, member: Address) -> Option<u64> {
        self.banned_until.get(&member).copied()
    }
}

impl VaultModule for BanModule {
    fn name(&self) -> &'static str {
        "ban"
    }

    fn on_join(&self, ctx: &ModuleContext, member: Address) -> std::result::Result<(), ModuleError> {
        match self.banned_until.get(&member) {
            Some(until) if ctx.now < *until => Err(ModuleError::MemberBanned {
                member,
                until: *until,
            }),
            _ => Ok(()),
        }
    }

    fn clone_box(&self) -> Box<dyn VaultModule> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed access to an installed [`BanModule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BanHandle {
    id: ModuleId,
}

impl BanHandle {
    /// Install a fresh [`BanModule`] and subscribe it to joins. Owner only.
    pub fn install(vault: &mut Vault, caller: Address) -> Result<Self> {
        vault.transact(|vault| {
            let id = vault.install_module(caller, Box::new(BanModule::new()))?;
            vault.add_listener(caller, Hook::Join, id)?;
            Ok(Self { id })
        })
    }

    /// Wrap an already installed module. Fails if `id` is not a [`BanModule`].
    pub fn attach(vault: &Vault, id: ModuleId) -> Result<Self> {
        vault
            .module::<BanModule>(id)
            .map(|_| Self { id })
            .ok_or(VaultError::UnknownModule(id.0))
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Ban `member` permanently. Agent only.
    pub fn ban(&self, vault: &mut Vault, caller: Address, member: Address) -> Result<()> {
        vault.transact(|vault| {
            vault.require_agent(caller, "ban members")?;
            self.ban_until(vault, member, PERMANENT)
        })
    }

    /// Ban `member` for `seconds` from now. Agent only.
    pub fn ban_seconds(
        &self,
        vault: &mut Vault,
        caller: Address,
        member: Address,
        seconds: u64,
    ) -> Result<()> {
        vault.transact(|vault| {
            vault.require_agent(caller, "ban members")?;
            let until = vault.now().saturating_add(seconds);
            self.ban_until(vault, member, until)
        })
    }

    /// Ban several members permanently.
    pub fn ban_members(&self, vault: &mut Vault, caller: Address, members: &[Address]) -> Result<()> {
        vault.transact(|vault| {
            vault.require_agent(caller, "ban members")?;
            for member in members {
                self.ban_until(vault, *member, PERMANENT)?;
            }
            Ok(())
        })
    }

    /// Ban several members for the same number of seconds.
    pub fn ban_members_seconds(
        &self,
        vault: &mut Vault,
        caller: Address,
        members: &[Address],
        seconds: u64,
    ) -> Result<()> {
        vault.transact(|vault| {
            vault.require_agent(caller, "ban members")?;
            let until = vault.now().saturating_add(seconds);
            for member in members {
                self.ban_until(vault, *member, until)?;
            }
            Ok(())
        })
    }

    /// Ban several members, each for its own number of seconds.
    ///
    /// # Errors
    ///
    /// - [`VaultError::LengthMismatch`] if the lists differ in length
    pub fn ban_members_specific_seconds(
        &self,
        vault: &mut Vault,
        caller: Address,
        members: &[Address],
        seconds: &[u64],
    ) -> Result<()> {
        vault.transact(|vault| {
            vault.require_agent(caller, "ban members")?;
            if members.len() != seconds.len() {
                return Err(VaultError::LengthMismatch {
                    left: members.len(),
                    right: seconds.len(),
                });
            }
            let now = vault.now();
            for (member, secs) in members.iter().zip(seconds) {
                self.ban_until(vault, *member, now.saturating_add(*secs))?;
            }
            Ok(())
        })
    }

    /// Lift the ban on `member`. The member is not re-added. Agent only.
    pub fn restore(&self, vault: &mut Vault, caller: Address, member: Address) -> Result<()> {
        vault.transact(|vault| {
            vault.require_agent(caller, "restore members")?;
            let module = vault.module_mut::<BanModule>(self.id)?;
            if module.banned_until.remove(&member).is_some() {
                vault.emit(VaultEvent::BanRemoved { member });
                tracing::info!(member = %member, "ban: ban removed");
            }
            Ok(())
        })
    }

    pub fn is_banned(&self, vault: &Vault, member: Address) -> bool {
        vault
            .module::<BanModule>(self.id)
            .is_some_and(|m| m.is_banned_at(member, vault.now()))
    }

    /// Ban state of each address, in order.
    pub fn are_banned(&self, vault: &Vault, members: &[Address]) -> Vec<bool> {
        members.iter().map(|m| self.is_banned(vault, *m)).collect()
    }

    fn ban_until(&self, vault: &mut Vault, member: Address, until: u64) -> Result<()> {
        vault
            .module_mut::<BanModule>(self.id)?
            .banned_until
            .insert(member, until);
        if vault.is_member(member) {
            vault.part(member, LeaveReason::Banned)?;
        }
        vault.emit(VaultEvent::MemberBanned {
            member,
            banned_until: until,
        });
        tracing::info!(member = %member, until, "ban: member banned");
        Ok(())
    }
}
