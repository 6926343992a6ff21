//! Integration test: ledger invariants under randomized operation sequences.
//!
//! Drives a vault with a seeded random mix of joins, parts, reweights,
//! deposits, withdrawals and in-vault transfers, and after every step checks:
//! 1. Revenue conservation: revenue equals member earnings plus both fees
//! 2. No member ever withdrew more than it earned
//! 3. Token conservation: the held balance covers every withdrawable balance
//! 4. Settlement is idempotent without intervening deposits
//!
//! Failed operations (e.g. parting an inactive member) are expected and must
//! leave the ledger unchanged.
//!
//! This test uses rail-vault, rail-oracle and rail-types.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rail_oracle::DefaultFeeOracle;
use rail_types::fixed::SCALE;
use rail_types::{Address, Amount, Fraction, U256};
use rail_vault::{InitParams, ManualClock, Vault};

const OWNER: Address = Address::repeat_byte(0xa0);
const AGENT: Address = Address::repeat_byte(0xa1);
const DAO: Address = Address::repeat_byte(0xd0);

/// Number of random steps per seed.
const STEPS: usize = 400;

fn new_vault(admin_percent: u64, protocol_percent: u64) -> Vault {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let mut vault = Vault::new(Address::repeat_byte(0x77), clock);
    vault
        .initialize(InitParams {
            owner: OWNER,
            join_part_agents: vec![AGENT],
            admin_fee: Fraction::from_percent(admin_percent).expect("admin"),
            fee_oracle: Arc::new(DefaultFeeOracle::new(
                Fraction::from_percent(protocol_percent).expect("protocol"),
                DAO,
            )),
            metadata: "{}".to_string(),
        })
        .expect("initialize");
    vault
}

fn check_invariants(vault: &Vault) {
    let stats = vault.stats();

    // revenue conservation
    assert_eq!(
        stats.total_revenue,
        stats.total_earnings + stats.total_admin_fees + stats.total_protocol_fees
    );

    // nobody is over-withdrawn, and the vault holds enough to pay everyone out
    let mut owed = Amount::zero();
    for (address, _) in vault.records() {
        let settled = vault.member_stats(address).expect("stats");
        let record = vault.member_record(address);
        assert!(record.withdrawn <= settled.total_earnings);
        owed += settled.withdrawable_earnings;
    }
    assert!(owed <= vault.held_balance());
    assert_eq!(
        vault.held_balance(),
        stats.total_revenue + vault.total_transferred_in() - stats.total_withdrawn
            + vault.undistributed_balance().expect("undistributed")
    );
}

fn random_step(vault: &mut Vault, rng: &mut StdRng, pool: &[Address]) {
    let who = pool[rng.gen_range(0..pool.len())];
    let other = pool[rng.gen_range(0..pool.len())];
    let before = vault.stats();
    let events_before = vault.events().len();

    let result = match rng.gen_range(0..8) {
        0 => vault.add_member(AGENT, who),
        1 => vault.part_member(who, who),
        2 => vault.set_member_weight(AGENT, who, SCALE * U256::from(rng.gen_range(0..4u64))),
        3 | 4 => vault
            .deposit(U256::from(rng.gen_range(1..100_000u64)))
            .map(|_| ()),
        5 => {
            let available = vault.withdrawable_earnings(who).unwrap_or_default();
            let amount = if available.is_zero() {
                U256::one()
            } else {
                U256::from(rng.gen_range(0..=available.low_u64()))
            };
            vault.withdraw(who, who, amount).map(|_| ())
        }
        6 => vault.transfer_within_contract(who, other, U256::from(rng.gen_range(1..500u64))),
        _ => vault.withdraw_all(OWNER, OWNER).map(|_| ()),
    };

    if result.is_err() {
        assert_eq!(vault.stats(), before, "failed operation changed stats");
        assert_eq!(vault.events().len(), events_before);
    }
}

#[test]
fn properties_hold_for_random_sequences() {
    let pool: Vec<Address> = (1..=8).map(Address::repeat_byte).collect();
    for seed in [1u64, 7, 42, 1337] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut vault = new_vault(9, 1);
        vault.add_members(AGENT, &pool[..3]).expect("seed members");
        for _ in 0..STEPS {
            random_step(&mut vault, &mut rng, &pool);
            check_invariants(&vault);
        }
    }
}

#[test]
fn properties_hold_with_extreme_fees() {
    let pool: Vec<Address> = (1..=4).map(Address::repeat_byte).collect();
    let mut rng = StdRng::seed_from_u64(99);
    let mut vault = new_vault(95, 5);
    vault.add_members(AGENT, &pool).expect("members");
    for _ in 0..STEPS {
        random_step(&mut vault, &mut rng, &pool);
        check_invariants(&vault);
    }
    // members get nothing when fees take everything
    assert_eq!(vault.stats().total_earnings, U256::zero());
}

#[test]
fn settlement_is_idempotent() {
    let mut vault = new_vault(9, 1);
    let members: Vec<Address> = (1..=3).map(Address::repeat_byte).collect();
    vault.add_members(AGENT, &members).expect("members");
    vault.deposit(U256::from(3000)).expect("deposit");

    let first = vault.member_stats(members[0]).expect("stats");
    let second = vault.member_stats(members[0]).expect("stats");
    assert_eq!(first, second);

    // settling through a no-op withdrawal stores the same values
    vault.withdraw(members[0], members[0], U256::zero()).expect("zero withdraw");
    vault.withdraw(members[0], members[0], U256::zero()).expect("zero withdraw");
    assert_eq!(vault.member_stats(members[0]).expect("stats"), first);
    assert_eq!(vault.member_record(members[0]).total_earnings, U256::from(900));
    assert_eq!(vault.stats().total_earnings, U256::from(2700));
}

#[test]
fn reweighting_only_affects_later_deposits() {
    let mut vault = new_vault(9, 1);
    let members: Vec<Address> = (1..=2).map(Address::repeat_byte).collect();
    vault.add_members(AGENT, &members).expect("members");
    vault.deposit(U256::from(2000)).expect("deposit");
    assert_eq!(vault.earnings(members[0]), Ok(U256::from(900)));

    vault
        .set_member_weight(AGENT, members[0], SCALE * U256::from(2))
        .expect("reweight");
    assert_eq!(vault.earnings(members[0]), Ok(U256::from(900)));

    // 3000 after fees is 2700, split 2:1
    vault.deposit(U256::from(3000)).expect("deposit");
    assert_eq!(vault.earnings(members[0]), Ok(U256::from(900 + 1800)));
    assert_eq!(vault.earnings(members[1]), Ok(U256::from(900 + 900)));
}
