//! Integration test: ban and withdraw-limit modules working together.
//!
//! Builds a vault from TOML with both modules enabled and exercises:
//! 1. A join veto leaves membership untouched
//! 2. Ban, restore and re-join round trip
//! 3. Banned members cannot withdraw until they re-join
//! 4. Member age gating and the vault-wide withdraw window
//! 5. In-vault transfers pass the same member checks as withdrawals
//! 6. A locked module configuration still enforces its listeners
//!
//! This test uses rail-vault (config, modules, registry, withdraw) and
//! rail-types.

use std::sync::Arc;

use rail_types::member::LeaveReason;
use rail_types::{tokens, Address};
use rail_vault::config::{BuiltVault, VaultConfig};
use rail_vault::modules::ban::BanHandle;
use rail_vault::modules::limit_withdraw::LimitWithdrawHandle;
use rail_vault::{Hook, ManualClock, VaultError};

const OWNER: Address = Address::repeat_byte(0xa0);
const AGENT: Address = Address::repeat_byte(0xa1);
const DAY: u64 = 24 * 60 * 60;

const CONFIG: &str = r#"
[vault]
identifier = "0x7777777777777777777777777777777777777777"
owner = "0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0"
admin_fee = "0.09"
join_part_agents = ["0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"]

[protocol_fee]
fee = "0.01"
beneficiary = "0xd0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0"

[modules.ban]
enabled = true

[modules.limit_withdraw]
enabled = true
required_member_age_secs = 86400
withdraw_limit_period_secs = 3600
withdraw_limit_during_period = "100"
minimum_withdraw = "1"
"#;

fn build() -> (BuiltVault, ManualClock, BanHandle, LimitWithdrawHandle) {
    let clock = ManualClock::new(1_700_000_000);
    let built = VaultConfig::from_toml_str(CONFIG)
        .expect("config")
        .build(Arc::new(clock.clone()))
        .expect("build");
    let ban = built.ban.expect("ban enabled");
    let limit = built.limit_withdraw.expect("limit enabled");
    (built, clock, ban, limit)
}

#[test]
fn join_veto_is_atomic() {
    let (mut built, _clock, ban, _limit) = build();
    let vault = &mut built.vault;
    let m = Address::repeat_byte(1);

    ban.ban(vault, AGENT, m).expect("pre-ban");
    let active_before = vault.active_member_count();
    let events_before = vault.events().len();

    // batch with a banned address fails as a whole
    let result = vault.add_members(AGENT, &[Address::repeat_byte(2), m]);
    assert!(matches!(result, Err(VaultError::ModuleRejected { .. })));
    assert!(!vault.is_member(m));
    assert!(!vault.is_member(Address::repeat_byte(2)));
    assert_eq!(vault.active_member_count(), active_before);
    assert_eq!(vault.events().len(), events_before);
}

#[test]
fn ban_restore_rejoin_round_trip() {
    let (mut built, _clock, ban, _limit) = build();
    let vault = &mut built.vault;
    let m = Address::repeat_byte(1);

    vault.add_member(AGENT, m).expect("join");
    ban.ban(vault, AGENT, m).expect("ban");
    assert!(!vault.is_member(m));
    assert!(ban.is_banned(vault, m));

    ban.restore(vault, AGENT, m).expect("restore");
    assert!(!ban.is_banned(vault, m));
    assert!(!vault.is_member(m));
    vault.add_member(AGENT, m).expect("re-join");
    assert!(vault.is_member(m));
}

#[test]
fn banned_member_cannot_withdraw_until_rejoin() {
    let (mut built, clock, ban, _limit) = build();
    let vault = &mut built.vault;
    let m = Address::repeat_byte(1);

    vault.add_member(AGENT, m).expect("join");
    vault.deposit(tokens(10)).expect("deposit");
    clock.advance(DAY);

    ban.ban(vault, AGENT, m).expect("ban");
    assert!(matches!(
        vault.withdraw_all(m, m),
        Err(VaultError::ModuleRejected { ref module, .. }) if module == "limit_withdraw"
    ));
    assert_eq!(vault.withdrawable_earnings(m), Ok(tokens(9)));

    ban.restore(vault, AGENT, m).expect("restore");
    vault.add_member(AGENT, m).expect("re-join");
    // re-joining restarts the age clock
    assert!(matches!(
        vault.withdraw_all(m, m),
        Err(VaultError::MemberTooNew { .. })
    ));
    clock.advance(DAY);
    assert_eq!(vault.withdraw_all(m, m), Ok(tokens(9)));
}

#[test]
fn transfers_cannot_route_around_limits() {
    let (mut built, clock, ban, _limit) = build();
    let vault = &mut built.vault;
    let (m, fresh, outsider) = (
        Address::repeat_byte(1),
        Address::repeat_byte(2),
        Address::repeat_byte(0x55),
    );

    vault.add_member(AGENT, m).expect("join");
    vault.deposit(tokens(10)).expect("deposit");
    clock.advance(DAY);
    vault.add_member(AGENT, fresh).expect("join");
    vault.deposit(tokens(10)).expect("deposit");

    // a member that just joined cannot hand its balance to a new address
    assert!(matches!(
        vault.transfer_within_contract(fresh, outsider, tokens(2)),
        Err(VaultError::MemberTooNew { .. })
    ));

    // nor can a banned member
    ban.ban(vault, AGENT, m).expect("ban");
    assert_eq!(
        vault.transfer_within_contract(m, outsider, tokens(9)),
        Err(VaultError::NotActiveMember(m))
    );
    assert!(vault.withdraw_all(outsider, outsider).is_err());
    assert_eq!(vault.stats().total_withdrawn, tokens(0));
}

#[test]
fn parted_member_withdraws_normally() {
    let (mut built, clock, _ban, _limit) = build();
    let vault = &mut built.vault;
    let m = Address::repeat_byte(1);

    vault.add_member(AGENT, m).expect("join");
    vault.deposit(tokens(10)).expect("deposit");
    clock.advance(DAY);
    vault
        .remove_member(AGENT, m, LeaveReason::Agent)
        .expect("remove");
    assert_eq!(vault.withdraw_all(m, m), Ok(tokens(9)));
}

#[test]
fn withdraw_window_is_vault_wide() {
    let (mut built, clock, _ban, limit) = build();
    let vault = &mut built.vault;
    let (a, b) = (Address::repeat_byte(1), Address::repeat_byte(2));

    vault.add_members(AGENT, &[a, b]).expect("join");
    vault.deposit(tokens(1000)).expect("deposit");
    clock.advance(DAY);

    vault.withdraw(a, a, tokens(60)).expect("a");
    assert_eq!(
        vault.withdraw(b, b, tokens(60)),
        Err(VaultError::WithdrawLimitExceeded {
            requested: tokens(60),
            remaining: tokens(40)
        })
    );
    vault.withdraw(b, b, tokens(40)).expect("b within limit");
    assert_eq!(limit.withdrawn_in_window(vault), Ok(tokens(100)));

    clock.advance(3600);
    vault.withdraw(b, b, tokens(60)).expect("next window");

    // fee recipients never joined and are never too new
    vault.withdraw(OWNER, OWNER, tokens(1)).expect("admin");
}

#[test]
fn locked_modules_keep_enforcing() {
    let (mut built, _clock, ban, limit) = build();
    let vault = &mut built.vault;

    vault.lock_modules(OWNER).expect("lock");
    assert_eq!(
        vault.remove_listener(OWNER, Hook::Join, ban.id()),
        Err(VaultError::ModulesLocked)
    );
    assert_eq!(
        vault.remove_listener(OWNER, Hook::Withdraw, limit.id()),
        Err(VaultError::ModulesLocked)
    );

    ban.ban(vault, AGENT, Address::repeat_byte(5)).expect("ban");
    assert!(vault.add_member(AGENT, Address::repeat_byte(5)).is_err());
}
