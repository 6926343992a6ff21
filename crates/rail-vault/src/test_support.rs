//! Fixtures shared by the unit tests.

use std::sync::Arc;

use rail_oracle::DefaultFeeOracle;
use rail_types::{Address, Fraction};

use crate::{InitParams, ManualClock, Vault};

pub(crate) const VAULT_ID: Address = Address::repeat_byte(0x77);
pub(crate) const OWNER: Address = Address::repeat_byte(0xa0);
pub(crate) const AGENT: Address = Address::repeat_byte(0xa1);
pub(crate) const DAO: Address = Address::repeat_byte(0xd0);
pub(crate) const START_TIME: u64 = 1_700_000_000;

pub(crate) fn member(n: u8) -> Address {
    Address::repeat_byte(n)
}

pub(crate) fn pct(p: u64) -> Fraction {
    Fraction::from_percent(p).expect("percent")
}

pub(crate) struct Fixture {
    pub vault: Vault,
    pub clock: ManualClock,
    pub oracle: Arc<DefaultFeeOracle>,
}

/// Admin fee 9%, protocol fee 1% paid to `DAO`, one agent, no members.
pub(crate) fn fixture() -> Fixture {
    let clock = ManualClock::new(START_TIME);
    let oracle = Arc::new(DefaultFeeOracle::new(pct(1), DAO));
    let mut vault = Vault::new(VAULT_ID, Arc::new(clock.clone()));
    vault
        .initialize(InitParams {
            owner: OWNER,
            join_part_agents: vec![AGENT],
            admin_fee: pct(9),
            fee_oracle: oracle.clone(),
            metadata: "{}".to_string(),
        })
        .expect("initialize");
    Fixture {
        vault,
        clock,
        oracle,
    }
}

/// [`fixture`] with members `member(1)..=member(n)` at weight 1.0.
pub(crate) fn fixture_with_members(n: u8) -> Fixture {
    let mut f = fixture();
    let members: Vec<Address> = (1..=n).map(member).collect();
    f.vault.add_members(AGENT, &members).expect("add members");
    f
}
