//! Integration test: revenue distribution across membership changes.
//!
//! Exercises the complete distribution lifecycle:
//! 1. Three members share a deposit after a 9% admin and 1% protocol fee
//! 2. A member parts and misses the next deposit but keeps its earnings
//! 3. The member re-joins with a newcomer and both share the third deposit
//! 4. Fee recipients accrue withdrawable balances like any member
//! 5. Weighted members receive proportional shares
//!
//! This test uses rail-vault (registry, distribution, withdraw), rail-oracle
//! (fee source) and rail-types.

use std::sync::Arc;

use rail_oracle::DefaultFeeOracle;
use rail_types::events::VaultEvent;
use rail_types::fixed::SCALE;
use rail_types::{Address, Fraction, U256};
use rail_vault::{InitParams, ManualClock, Vault};

const OWNER: Address = Address::repeat_byte(0xa0);
const AGENT: Address = Address::repeat_byte(0xa1);
const DAO: Address = Address::repeat_byte(0xd0);
const OUTSIDER: Address = Address::repeat_byte(0xee);

fn pct(p: u64) -> Fraction {
    Fraction::from_percent(p).expect("percent")
}

fn new_vault() -> Vault {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let mut vault = Vault::new(Address::repeat_byte(0x77), clock);
    vault
        .initialize(InitParams {
            owner: OWNER,
            join_part_agents: vec![AGENT],
            admin_fee: pct(9),
            fee_oracle: Arc::new(DefaultFeeOracle::new(pct(1), DAO)),
            metadata: "{}".to_string(),
        })
        .expect("initialize");
    vault
}

fn earnings(vault: &Vault, who: Address) -> u64 {
    vault.earnings(who).expect("known account").as_u64()
}

fn transfer_and_refresh(vault: &mut Vault, amount: u64) {
    vault.receive(U256::from(amount)).expect("receive");
    vault.refresh_revenue().expect("refresh");
}

#[test]
fn distribution_join_part_rejoin_scenario() {
    let mut vault = new_vault();
    let m: Vec<Address> = (1..=3).map(Address::repeat_byte).collect();
    let newcomer = Address::repeat_byte(4);
    vault.add_members(AGENT, &m).expect("add members");

    // =========================================================
    // First deposit: 3000 split three ways after 10% fees
    // =========================================================
    transfer_and_refresh(&mut vault, 3000);
    // repeating the refresh distributes nothing
    assert_eq!(vault.refresh_revenue().expect("refresh"), U256::zero());

    let stats = vault.stats();
    assert_eq!(stats.total_earnings, U256::from(2700));
    assert_eq!(stats.total_admin_fees, U256::from(270));
    assert_eq!(stats.total_protocol_fees, U256::from(30));
    assert_eq!(earnings(&vault, OWNER), 270);
    assert_eq!(earnings(&vault, DAO), 30);
    for member in &m {
        assert_eq!(earnings(&vault, *member), 900);
    }

    // =========================================================
    // Part one member, second deposit goes to the other two
    // =========================================================
    vault.part_member(AGENT, m[0]).expect("part");
    assert_eq!(earnings(&vault, m[0]), 900);
    transfer_and_refresh(&mut vault, 2000);

    let stats = vault.stats();
    assert_eq!(stats.total_earnings, U256::from(4500));
    assert_eq!(stats.total_admin_fees, U256::from(450));
    assert_eq!(stats.total_protocol_fees, U256::from(50));
    assert_eq!(earnings(&vault, m[0]), 900);
    assert_eq!(earnings(&vault, m[1]), 1800);
    assert_eq!(earnings(&vault, m[2]), 1800);

    // =========================================================
    // Re-join plus a newcomer, third deposit split four ways
    // =========================================================
    vault.add_member(AGENT, m[0]).expect("re-join");
    vault.add_member(AGENT, newcomer).expect("newcomer");
    transfer_and_refresh(&mut vault, 4000);

    let stats = vault.stats();
    assert_eq!(stats.total_earnings, U256::from(8100));
    assert_eq!(stats.total_admin_fees, U256::from(810));
    assert_eq!(stats.total_protocol_fees, U256::from(90));
    assert_eq!(earnings(&vault, OWNER), 810);
    assert_eq!(earnings(&vault, DAO), 90);
    assert_eq!(earnings(&vault, newcomer), 900);
    let final_earnings: Vec<u64> = m.iter().map(|a| earnings(&vault, *a)).collect();
    assert_eq!(final_earnings, vec![1800, 2700, 2700]);
    assert_eq!(stats.total_revenue, U256::from(9000));

    vault.part_member(AGENT, newcomer).expect("part newcomer");
    assert_eq!(vault.active_member_count(), 3);
}

#[test]
fn distribution_refresh_by_anyone_emits_revenue_events() {
    let mut vault = new_vault();
    vault
        .add_members(AGENT, &[Address::repeat_byte(1), Address::repeat_byte(2)])
        .expect("add");
    vault.take_events();

    vault.receive(U256::from(1000)).expect("receive");
    assert_eq!(vault.undistributed_balance(), Ok(U256::from(1000)));
    vault.refresh_revenue().expect("refresh");
    assert_eq!(vault.undistributed_balance(), Ok(U256::zero()));

    let names: Vec<&str> = vault.events().iter().map(|e| e.kind.name()).collect();
    assert!(names.contains(&"RevenueReceived"));
    assert!(names.contains(&"NewEarnings"));
    assert!(names.contains(&"AdminFeeCharged"));
    assert!(names.contains(&"ProtocolFeeCharged"));
    assert!(vault.events().iter().any(|e| e.kind
        == VaultEvent::RevenueReceived {
            amount: U256::from(1000)
        }));
}

#[test]
fn distribution_weighted_members() {
    let mut vault = new_vault();
    let members: Vec<Address> = (1..=3).map(Address::repeat_byte).collect();
    let weights: Vec<U256> = (1..=3u64).map(|w| SCALE * U256::from(w)).collect();
    vault
        .add_members_with_weights(AGENT, &members, &weights)
        .expect("add weighted");

    // 6000 deposit, 5400 to members in 1:2:3
    transfer_and_refresh(&mut vault, 6000);
    let shares: Vec<u64> = members.iter().map(|a| earnings(&vault, *a)).collect();
    assert_eq!(shares, vec![900, 1800, 2700]);

    // weight 1 -> 3 only affects later deposits
    vault
        .set_member_weight(AGENT, members[0], SCALE * U256::from(3))
        .expect("reweight");
    transfer_and_refresh(&mut vault, 8000);
    let shares: Vec<u64> = members.iter().map(|a| earnings(&vault, *a)).collect();
    assert_eq!(shares, vec![900 + 2700, 1800 + 1800, 2700 + 2700]);
}

#[test]
fn distribution_outsider_cannot_change_membership() {
    let mut vault = new_vault();
    assert!(vault.add_member(OUTSIDER, Address::repeat_byte(1)).is_err());
    assert!(vault.set_admin_fee(OUTSIDER, pct(5)).is_err());
    assert_eq!(vault.active_member_count(), 0);
    assert_eq!(vault.admin_fee(), pct(9));
}
