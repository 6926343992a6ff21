//! Extension modules and listener hooks.
//!
//! A module is installed into the vault once and addressed by its
//! [`ModuleId`]. It then listens on any of three hooks:
//!
//! - [`Hook::Join`] after a member joins
//! - [`Hook::Part`] after a member parts, with the reason
//! - [`Hook::Withdraw`] before a withdrawal or in-vault transfer changes any balance
//!
//! Listeners run synchronously in registration order. A listener returning an
//! error aborts the triggering operation, and the enclosing transaction undoes
//! everything it did. Module state is part of the ledger and rolls back too.
//!
//! [`Vault::lock_modules`] freezes the module configuration for good.
//!
//! ## Modules
//!
//! - [`ban`] — Time-limited bans that block re-joining
//! - [`limit_withdraw`] — Minimum amount, member age and rate limits on withdrawals

pub mod ban;
pub mod limit_withdraw;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use rail_types::events::VaultEvent;
use rail_types::member::LeaveReason;
use rail_types::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::vault::Vault;
use crate::{Result, VaultError};

/// Identifier of an installed module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Listener hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    Join,
    Part,
    Withdraw,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::Join => "join",
            Hook::Part => "part",
            Hook::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a listener sees of the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleContext {
    /// Current timestamp.
    pub now: u64,
    /// Identifier of the vault.
    pub vault: Address,
    /// Current vault owner.
    pub owner: Address,
    /// Latest join time of the member the hook is about, zero if it never joined.
    pub joined_at: u64,
}

/// The operation a listener is told about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookEvent {
    /// A member joined.
    Join { member: Address },
    /// A member parted.
    Part { member: Address, reason: LeaveReason },
    /// Tokens leave the vault from `member`'s balance.
    Withdraw {
        member: Address,
        recipient: Address,
        amount: Amount,
    },
    /// Part of `from`'s balance moves to `to` inside the vault.
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
}

impl HookEvent {
    /// Hook whose listeners receive this event. Transfers go to the withdraw
    /// listeners since the balance leaves the sender.
    pub fn hook(&self) -> Hook {
        match self {
            HookEvent::Join { .. } => Hook::Join,
            HookEvent::Part { .. } => Hook::Part,
            HookEvent::Withdraw { .. } | HookEvent::Transfer { .. } => Hook::Withdraw,
        }
    }

    /// The member whose balance or membership is affected.
    pub fn subject(&self) -> Address {
        match *self {
            HookEvent::Join { member }
            | HookEvent::Part { member, .. }
            | HookEvent::Withdraw { member, .. } => member,
            HookEvent::Transfer { from, .. } => from,
        }
    }
}

/// Reasons a listener vetoes an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// Address is banned.
    #[error("{member} is banned until {until}")]
    MemberBanned { member: Address, until: u64 },

    /// Withdrawal below the minimum amount.
    #[error("amount {amount} below minimum {minimum}")]
    BelowMinimum { amount: Amount, minimum: Amount },

    /// Withdrawal over the period limit.
    #[error("requested {requested}, remaining {remaining}")]
    LimitExceeded { requested: Amount, remaining: Amount },

    /// Member joined too recently.
    #[error("{member} joined at {joined_at}, eligible at {eligible_at}")]
    MemberTooNew {
        member: Address,
        joined_at: u64,
        eligible_at: u64,
    },

    /// Any other veto.
    #[error("{0}")]
    Rejected(String),
}

impl ModuleError {
    fn into_vault_error(self, module: &str) -> VaultError {
        match self {
            ModuleError::BelowMinimum { amount, minimum } => {
                VaultError::WithdrawBelowMinimum { amount, minimum }
            }
            ModuleError::LimitExceeded {
                requested,
                remaining,
            } => VaultError::WithdrawLimitExceeded {
                requested,
                remaining,
            },
            ModuleError::MemberTooNew {
                member,
                joined_at,
                eligible_at,
            } => VaultError::MemberTooNew {
                member,
                joined_at,
                eligible_at,
            },
            other @ (ModuleError::MemberBanned { .. } | ModuleError::Rejected(_)) => {
                VaultError::ModuleRejected {
                    module: module.to_string(),
                    reason: other.to_string(),
                }
            }
        }
    }
}

/// A vault extension.
///
/// Listening happens in two phases. The `on_*` hooks only inspect and may
/// veto; every listener on the hook is asked before anything is recorded.
/// Once all of them accept, modules that report [`records`](Self::records)
/// get [`record`](Self::record) to update their own state. Only those modules
/// are copied into the transaction journal, so checks stay cheap however
/// large a module's state grows.
pub trait VaultModule: Send + Sync + fmt::Debug + Any {
    /// Short name used in errors and events.
    fn name(&self) -> &'static str;

    fn on_join(&self, _ctx: &ModuleContext, _member: Address) -> std::result::Result<(), ModuleError> {
        Ok(())
    }

    fn on_part(
        &self,
        _ctx: &ModuleContext,
        _member: Address,
        _reason: LeaveReason,
    ) -> std::result::Result<(), ModuleError> {
        Ok(())
    }

    fn on_withdraw(
        &self,
        _ctx: &ModuleContext,
        _member: Address,
        _recipient: Address,
        _amount: Amount,
    ) -> std::result::Result<(), ModuleError> {
        Ok(())
    }

    fn on_transfer(
        &self,
        _ctx: &ModuleContext,
        _from: Address,
        _to: Address,
        _amount: Amount,
    ) -> std::result::Result<(), ModuleError> {
        Ok(())
    }

    /// Whether [`record`](Self::record) changes anything for `event`.
    fn records(&self, _ctx: &ModuleContext, _event: &HookEvent) -> bool {
        false
    }

    /// Update module state after every listener accepted `event`.
    fn record(&mut self, _ctx: &ModuleContext, _event: &HookEvent) {}

    fn clone_box(&self) -> Box<dyn VaultModule>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn check(
    module: &dyn VaultModule,
    ctx: &ModuleContext,
    event: &HookEvent,
) -> std::result::Result<(), ModuleError> {
    match *event {
        HookEvent::Join { member } => module.on_join(ctx, member),
        HookEvent::Part { member, reason } => module.on_part(ctx, member, reason),
        HookEvent::Withdraw {
            member,
            recipient,
            amount,
        } => module.on_withdraw(ctx, member, recipient, amount),
        HookEvent::Transfer { from, to, amount } => module.on_transfer(ctx, from, to, amount),
    }
}

/// Listener lists and the lock flag.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModuleLayout {
    join: Vec<ModuleId>,
    part: Vec<ModuleId>,
    withdraw: Vec<ModuleId>,
    locked: bool,
}

impl ModuleLayout {
    fn listeners(&self, hook: Hook) -> &[ModuleId] {
        match hook {
            Hook::Join => &self.join,
            Hook::Part => &self.part,
            Hook::Withdraw => &self.withdraw,
        }
    }

    fn listeners_mut(&mut self, hook: Hook) -> &mut Vec<ModuleId> {
        match hook {
            Hook::Join => &mut self.join,
            Hook::Part => &mut self.part,
            Hook::Withdraw => &mut self.withdraw,
        }
    }
}

/// Installed modules and how they listen.
#[derive(Debug, Default)]
pub(crate) struct ModuleRegistry {
    installed: Vec<Box<dyn VaultModule>>,
    layout: ModuleLayout,
}

impl ModuleRegistry {
    pub(crate) fn installed_len(&self) -> usize {
        self.installed.len()
    }

    pub(crate) fn layout(&self) -> &ModuleLayout {
        &self.layout
    }

    pub(crate) fn layout_mut(&mut self) -> &mut ModuleLayout {
        &mut self.layout
    }

    fn get(&self, id: ModuleId) -> Option<&dyn VaultModule> {
        self.installed.get(id.0 as usize).map(|m| &**m)
    }

    pub(crate) fn get_mut(&mut self, id: ModuleId) -> Result<&mut Box<dyn VaultModule>> {
        self.installed
            .get_mut(id.0 as usize)
            .ok_or(VaultError::UnknownModule(id.0))
    }

    /// Copy of one module for the journal.
    pub(crate) fn snapshot(&self, id: ModuleId) -> Result<Box<dyn VaultModule>> {
        self.get(id)
            .map(|m| m.clone_box())
            .ok_or(VaultError::UnknownModule(id.0))
    }

    /// Undo a transaction: restore touched modules, drop the ones it
    /// installed and put the listener lists back.
    pub(crate) fn restore(
        &mut self,
        installed_len: usize,
        originals: HashMap<ModuleId, Box<dyn VaultModule>>,
        layout: Option<ModuleLayout>,
    ) {
        for (id, original) in originals {
            if let Some(slot) = self.installed.get_mut(id.0 as usize) {
                *slot = original;
            }
        }
        self.installed.truncate(installed_len);
        if let Some(layout) = layout {
            self.layout = layout;
        }
    }
}

impl Vault {
    /// Install a module. Owner only. The module listens on nothing until
    /// [`add_listener`](Self::add_listener) is called.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotAuthorized`] if `caller` is not the owner
    /// - [`VaultError::ModulesLocked`] after [`lock_modules`](Self::lock_modules)
    pub fn install_module(&mut self, caller: Address, module: Box<dyn VaultModule>) -> Result<ModuleId> {
        self.transact(|vault| {
            vault.require_unlocked_owner(caller, "install modules")?;
            let name = module.name();
            let id = ModuleId(vault.modules.installed.len() as u32);
            vault.modules.installed.push(module);
            vault.emit(VaultEvent::ModuleInstalled {
                module_id: id.0,
                name: name.to_string(),
            });
            tracing::info!(module = name, id = %id, "vault: module installed");
            Ok(id)
        })
    }

    /// Subscribe an installed module to `hook`. Owner only.
    pub fn add_listener(&mut self, caller: Address, hook: Hook, id: ModuleId) -> Result<()> {
        self.transact(|vault| {
            vault.require_unlocked_owner(caller, "add listeners")?;
            if vault.modules.get(id).is_none() {
                return Err(VaultError::UnknownModule(id.0));
            }
            if vault.modules.layout.listeners(hook).contains(&id) {
                return Err(VaultError::ListenerAlreadyAdded { hook, module: id.0 });
            }
            vault.module_layout_mut().listeners_mut(hook).push(id);
            vault.emit(VaultEvent::ListenerAdded {
                hook: hook.to_string(),
                module_id: id.0,
            });
            Ok(())
        })
    }

    /// Unsubscribe a module from `hook`. Owner only.
    pub fn remove_listener(&mut self, caller: Address, hook: Hook, id: ModuleId) -> Result<()> {
        self.transact(|vault| {
            vault.require_unlocked_owner(caller, "remove listeners")?;
            let Some(position) = vault.modules.layout.listeners(hook).iter().position(|l| *l == id) else {
                return Err(VaultError::ListenerNotFound { hook, module: id.0 });
            };
            vault.module_layout_mut().listeners_mut(hook).remove(position);
            vault.emit(VaultEvent::ListenerRemoved {
                hook: hook.to_string(),
                module_id: id.0,
            });
            Ok(())
        })
    }

    /// Freeze the module configuration. Owner only, irreversible.
    pub fn lock_modules(&mut self, caller: Address) -> Result<()> {
        self.transact(|vault| {
            vault.require_unlocked_owner(caller, "lock modules")?;
            vault.module_layout_mut().locked = true;
            vault.emit(VaultEvent::ModulesLocked);
            tracing::info!("vault: modules locked");
            Ok(())
        })
    }

    pub fn modules_locked(&self) -> bool {
        self.modules.layout.locked
    }

    /// Modules listening on `hook`, in call order.
    pub fn listeners(&self, hook: Hook) -> Vec<ModuleId> {
        self.modules.layout.listeners(hook).to_vec()
    }

    /// Name of an installed module.
    pub fn module_name(&self, id: ModuleId) -> Option<&'static str> {
        self.modules.get(id).map(|m| m.name())
    }

    /// Borrow an installed module as its concrete type.
    pub fn module<T: VaultModule>(&self, id: ModuleId) -> Option<&T> {
        self.modules.get(id)?.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow an installed module, journaling it first.
    pub(crate) fn module_mut<T: VaultModule>(&mut self, id: ModuleId) -> Result<&mut T> {
        if self.module::<T>(id).is_none() {
            return Err(VaultError::UnknownModule(id.0));
        }
        self.journaled_module(id)?
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(VaultError::UnknownModule(id.0))
    }

    fn module_context(&self, member: Address) -> ModuleContext {
        ModuleContext {
            now: self.now(),
            vault: self.identifier(),
            owner: self.owner(),
            joined_at: self.record(member).joined_at,
        }
    }

    pub(crate) fn notify_join(&mut self, member: Address) -> Result<()> {
        self.dispatch(HookEvent::Join { member })
    }

    pub(crate) fn notify_part(&mut self, member: Address, reason: LeaveReason) -> Result<()> {
        self.dispatch(HookEvent::Part { member, reason })
    }

    pub(crate) fn notify_withdraw(
        &mut self,
        member: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<()> {
        self.dispatch(HookEvent::Withdraw {
            member,
            recipient,
            amount,
        })
    }

    pub(crate) fn notify_transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        self.dispatch(HookEvent::Transfer { from, to, amount })
    }

    fn dispatch(&mut self, event: HookEvent) -> Result<()> {
        let hook = event.hook();
        let listeners = self.modules.layout.listeners(hook).to_vec();
        if listeners.is_empty() {
            return Ok(());
        }
        let ctx = self.module_context(event.subject());

        let mut recording = Vec::new();
        for id in listeners {
            let module = self.modules.get(id).ok_or(VaultError::UnknownModule(id.0))?;
            if let Err(e) = check(module, &ctx, &event) {
                let name = module.name();
                tracing::info!(module = name, hook = %hook, reason = %e, "vault: listener vetoed operation");
                return Err(e.into_vault_error(name));
            }
            if module.records(&ctx, &event) {
                recording.push(id);
            }
        }
        for id in recording {
            self.journaled_module(id)?.record(&ctx, &event);
        }
        Ok(())
    }

    fn require_unlocked_owner(&self, caller: Address, action: &'static str) -> Result<()> {
        self.require_owner(caller, action)?;
        if self.modules.layout.locked {
            return Err(VaultError::ModulesLocked);
        }
        Ok(())
    }
}
