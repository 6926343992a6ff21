//! Withdrawal limits.
//!
//! [`LimitWithdrawModule`] puts four checks in front of every withdrawal:
//!
//! 1. members removed with [`LeaveReason::Banned`] cannot withdraw until they re-join
//! 2. the amount must be at least `minimum_withdraw`
//! 3. the member must have joined at least `required_member_age` seconds ago
//! 4. all withdrawals in the current window may not exceed `withdraw_limit_during_period`
//!
//! In-vault transfers pass checks 1 and 3, so a balance cannot be handed to a
//! fresh address to skip them.
//!
//! The window is vault-wide. It starts at the first withdrawal after the
//! previous window ran out, or when the parameters are reset.

use std::any::Any;
use std::collections::HashSet;

use rail_types::events::VaultEvent;
use rail_types::member::LeaveReason;
use rail_types::{tokens, Address, Amount};

use super::{Hook, HookEvent, ModuleContext, ModuleError, ModuleId, VaultModule};
use crate::vault::Vault;
use crate::{Result, VaultError};

/// Limit parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitWithdrawParams {
    /// Seconds a member must have been in the vault before withdrawing.
    pub required_member_age: u64,
    /// Window length in seconds.
    pub withdraw_limit_period: u64,
    /// Total allowed per window, in token wei.
    pub withdraw_limit_during_period: Amount,
    /// Smallest allowed withdrawal, in token wei.
    pub minimum_withdraw: Amount,
}

impl Default for LimitWithdrawParams {
    fn default() -> Self {
        Self {
            required_member_age: 24 * 60 * 60,
            withdraw_limit_period: 60 * 60,
            withdraw_limit_during_period: tokens(100),
            minimum_withdraw: tokens(1),
        }
    }
}

/// Withdraw limit state. Listens on all three hooks.
///
/// Join times come from the member records, so the module only keeps the
/// window and the members blocked by a ban.
#[derive(Debug, Clone, Default)]
pub struct LimitWithdrawModule {
    params: LimitWithdrawParams,
    blocked: HashSet<Address>,
    window_start: u64,
    withdrawn_in_window: Amount,
}

impl LimitWithdrawModule {
    pub fn params(&self) -> LimitWithdrawParams {
        self.params
    }

    /// Whether `member` was banned and has not re-joined since.
    pub fn is_blocked(&self, member: Address) -> bool {
        self.blocked.contains(&member)
    }

    fn reset(&mut self, params: LimitWithdrawParams, now: u64) {
        self.params = params;
        self.window_start = now;
        self.withdrawn_in_window = Amount::zero();
    }

    fn window_expired(&self, now: u64) -> bool {
        now >= self.window_start.saturating_add(self.params.withdraw_limit_period)
    }

    /// Allowance left in the window that applies at `now`.
    fn remaining(&self, now: u64) -> Amount {
        let used = if self.window_expired(now) {
            Amount::zero()
        } else {
            self.withdrawn_in_window
        };
        self.params.withdraw_limit_during_period.saturating_sub(used)
    }

    fn check_member(&self, ctx: &ModuleContext, member: Address) -> std::result::Result<(), ModuleError> {
        if self.blocked.contains(&member) {
            return Err(ModuleError::Rejected(format!(
                "{member} was banned and may not withdraw"
            )));
        }
        // fee recipients never join and are always old enough
        let eligible_at = ctx.joined_at.saturating_add(self.params.required_member_age);
        if ctx.now < eligible_at {
            return Err(ModuleError::MemberTooNew {
                member,
                joined_at: ctx.joined_at,
                eligible_at,
            });
        }
        Ok(())
    }
}

impl VaultModule for LimitWithdrawModule {
    fn name(&self) -> &'static str {
        "limit_withdraw"
    }

    fn on_withdraw(
        &self,
        ctx: &ModuleContext,
        member: Address,
        _recipient: Address,
        amount: Amount,
    ) -> std::result::Result<(), ModuleError> {
        self.check_member(ctx, member)?;
        if amount < self.params.minimum_withdraw {
            return Err(ModuleError::BelowMinimum {
                amount,
                minimum: self.params.minimum_withdraw,
            });
        }
        let remaining = self.remaining(ctx.now);
        if amount > remaining {
            return Err(ModuleError::LimitExceeded {
                requested: amount,
                remaining,
            });
        }
        Ok(())
    }

    // Nothing leaves the vault, so no minimum and no window. The recipient's
    // later withdrawal pays those.
    fn on_transfer(
        &self,
        ctx: &ModuleContext,
        from: Address,
        _to: Address,
        _amount: Amount,
    ) -> std::result::Result<(), ModuleError> {
        self.check_member(ctx, from)
    }

    fn records(&self, _ctx: &ModuleContext, event: &HookEvent) -> bool {
        match *event {
            HookEvent::Join { member } => self.blocked.contains(&member),
            HookEvent::Part { member, reason } => {
                reason == LeaveReason::Banned && !self.blocked.contains(&member)
            }
            HookEvent::Withdraw { .. } => true,
            HookEvent::Transfer { .. } => false,
        }
    }

    fn record(&mut self, ctx: &ModuleContext, event: &HookEvent) {
        match *event {
            HookEvent::Join { member } => {
                self.blocked.remove(&member);
            }
            HookEvent::Part { member, reason } => {
                if reason == LeaveReason::Banned {
                    self.blocked.insert(member);
                }
            }
            HookEvent::Withdraw { amount, .. } => {
                if self.window_expired(ctx.now) {
                    self.window_start = ctx.now;
                    self.withdrawn_in_window = Amount::zero();
                }
                self.withdrawn_in_window = self.withdrawn_in_window.saturating_add(amount);
            }
            HookEvent::Transfer { .. } => {}
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

/// Typed access to an installed [`LimitWithdrawModule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitWithdrawHandle {
    id: ModuleId,
}

impl LimitWithdrawHandle {
    /// Install the module and subscribe it to joins, parts and withdrawals.
    /// Owner only.
    pub fn install(vault: &mut Vault, caller: Address, params: LimitWithdrawParams) -> Result<Self> {
        vault.transact(|vault| {
            let now = vault.now();
            let mut module = LimitWithdrawModule::default();
            module.reset(params, now);
            let id = vault.install_module(caller, Box::new(module))?;
            for hook in [Hook::Join, Hook::Part, Hook::Withdraw] {
                vault.add_listener(caller, hook, id)?;
            }
            Ok(Self { id })
        })
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Replace the parameters and start a fresh window. Owner only.
    pub fn set_parameters(
        &self,
        vault: &mut Vault,
        caller: Address,
        params: LimitWithdrawParams,
    ) -> Result<()> {
        vault.transact(|vault| {
            vault.require_owner(caller, "reset the withdraw limit module")?;
            let now = vault.now();
            vault
                .module_mut::<LimitWithdrawModule>(self.id)?
                .reset(params, now);
            vault.emit(VaultEvent::ModuleReset {
                module_id: self.id.0,
            });
            tracing::info!(
                period = params.withdraw_limit_period,
                limit = %params.withdraw_limit_during_period,
                "limit_withdraw: parameters reset"
            );
            Ok(())
        })
    }

    pub fn parameters(&self, vault: &Vault) -> Result<LimitWithdrawParams> {
        Ok(self.module(vault)?.params)
    }

    /// Whether `member` is blocked from withdrawing after a ban.
    pub fn is_blocked(&self, vault: &Vault, member: Address) -> Result<bool> {
        Ok(self.module(vault)?.is_blocked(member))
    }

    /// Total withdrawn in the current window.
    pub fn withdrawn_in_window(&self, vault: &Vault) -> Result<Amount> {
        Ok(self.module(vault)?.withdrawn_in_window)
    }

    fn module<'a>(&self, vault: &'a Vault) -> Result<&'a LimitWithdrawModule> {
        vault
            .module::<LimitWithdrawModule>(self.id)
            .ok_or(VaultError::UnknownModule(self.id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use rail_types::U256;

    const DAY: u64 = 24 * 60 * 60;

    /// Limit module with default parameters and one member old enough to withdraw.
    fn setup() -> (Fixture, LimitWithdrawHandle) {
        let mut f = fixture();
        let limit = LimitWithdrawHandle::install(&mut f.vault, OWNER, LimitWithdrawParams::default())
            .expect("install");
        f.vault.add_member(AGENT, member(1)).expect("add");
        f.clock.advance(DAY);
        (f, limit)
    }

    #[test]
    fn test_new_members_must_wait() {
        let (mut f, _limit) = setup();
        f.vault.add_members(AGENT, &[member(2), member(3)]).expect("add");
        f.vault.deposit(tokens(10)).expect("deposit");

        assert!(matches!(
            f.vault.withdraw_all(member(2), member(2)),
            Err(VaultError::MemberTooNew { .. })
        ));
        assert!(matches!(
            f.vault.withdraw_all_to(member(3), member(9)),
            Err(VaultError::MemberTooNew { .. })
        ));

        f.clock.advance(DAY);
        f.vault.withdraw_all(member(2), member(2)).expect("old enough");
        f.vault.withdraw_all_to(member(3), member(9)).expect("old enough");
    }

    #[test]
    fn test_minimum_withdraw() {
        let (mut f, _limit) = setup();
        f.vault.deposit(tokens(10)).expect("deposit");
        let tenth = tokens(1) / U256::from(10);
        assert_eq!(
            f.vault.withdraw(OWNER, member(1), tenth),
            Err(VaultError::WithdrawBelowMinimum {
                amount: tenth,
                minimum: tokens(1)
            })
        );
    }

    #[test]
    fn test_withdraw_limit_window() {
        let (mut f, limit) = setup();
        f.vault.deposit(tokens(1000)).expect("deposit");

        assert!(matches!(
            f.vault.withdraw(OWNER, member(1), tokens(200)),
            Err(VaultError::WithdrawLimitExceeded { .. })
        ));
        f.vault.withdraw(OWNER, member(1), tokens(50)).expect("first half");
        f.vault
            .withdraw_to(member(1), member(9), tokens(50))
            .expect("second half");
        assert_eq!(limit.withdrawn_in_window(&f.vault), Ok(tokens(100)));
        assert_eq!(
            f.vault.withdraw(OWNER, member(1), tokens(1)),
            Err(VaultError::WithdrawLimitExceeded {
                requested: tokens(1),
                remaining: U256::zero()
            })
        );

        f.clock.advance(60);
        assert!(f.vault.withdraw(OWNER, member(1), tokens(1)).is_err());

        f.clock.advance(60 * 60);
        f.vault
            .withdraw(OWNER, member(1), tokens(100))
            .expect("next window");
    }

    #[test]
    fn test_banned_member_blocked_until_rejoin() {
        let (mut f, _limit) = setup();
        f.vault.add_member(AGENT, member(2)).expect("add");
        f.vault.deposit(tokens(10)).expect("deposit");
        f.clock.advance(DAY);

        f.vault
            .remove_member(AGENT, member(2), LeaveReason::Banned)
            .expect("remove");
        let result = f.vault.withdraw_all(member(2), member(2));
        assert!(matches!(
            result,
            Err(VaultError::ModuleRejected { ref module, .. }) if module == "limit_withdraw"
        ));
        assert_eq!(f.vault.stats().total_withdrawn, U256::zero());

        f.vault.add_member(AGENT, member(2)).expect("rejoin");
        f.clock.advance(DAY);
        f.vault.withdraw_all(member(2), member(2)).expect("withdraw");
    }

    #[test]
    fn test_transfer_cannot_skip_member_age() {
        let (mut f, limit) = setup();
        f.vault.add_member(AGENT, member(2)).expect("add");
        f.vault.deposit(tokens(10)).expect("deposit");

        let result = f.vault.transfer_within_contract(member(2), member(7), tokens(2));
        assert!(matches!(result, Err(VaultError::MemberTooNew { .. })));
        assert!(f.vault.withdrawable_earnings(member(7)).is_err());

        // old members transfer freely, and the window is charged only on withdraw
        f.vault
            .transfer_within_contract(member(1), member(7), tokens(2))
            .expect("transfer");
        assert_eq!(limit.withdrawn_in_window(&f.vault), Ok(U256::zero()));
        f.vault.withdraw_all(member(7), member(7)).expect("withdraw");
        assert_eq!(limit.withdrawn_in_window(&f.vault), Ok(tokens(2)));
    }

    #[test]
    fn test_banned_member_cannot_transfer_out() {
        let (mut f, limit) = setup();
        f.vault.deposit(tokens(10)).expect("deposit");
        f.vault
            .remove_member(AGENT, member(1), LeaveReason::Banned)
            .expect("remove");
        assert_eq!(limit.is_blocked(&f.vault, member(1)), Ok(true));

        assert_eq!(
            f.vault
                .transfer_within_contract(member(1), member(7), tokens(5)),
            Err(VaultError::NotActiveMember(member(1)))
        );
        assert!(f.vault.withdraw_all(member(7), member(7)).is_err());
        assert_eq!(f.vault.stats().total_withdrawn, U256::zero());
    }

    #[test]
    fn test_parted_member_can_withdraw() {
        let (mut f, _limit) = setup();
        f.vault.deposit(tokens(10)).expect("deposit");
        f.vault.part_member(member(1), member(1)).expect("part");
        f.vault.withdraw_all(member(1), member(1)).expect("withdraw");
    }

    #[test]
    fn test_set_parameters() {
        let (mut f, limit) = setup();
        let params = LimitWithdrawParams {
            minimum_withdraw: U256::zero(),
            ..LimitWithdrawParams::default()
        };
        assert!(matches!(
            limit.set_parameters(&mut f.vault, member(1), params),
            Err(VaultError::NotAuthorized { .. })
        ));
        limit
            .set_parameters(&mut f.vault, OWNER, params)
            .expect("reset");
        assert_eq!(limit.parameters(&f.vault), Ok(params));
        assert_eq!(
            f.vault.events().last().map(|e| e.kind.clone()),
            Some(VaultEvent::ModuleReset {
                module_id: limit.id().0
            })
        );
        // join times live in the member records and survive a reset
        assert_eq!(f.vault.member_record(member(1)).joined_at, START_TIME);
    }
}
