//! Replay scripts.
//!
//! A script is a JSON object with an optional `start_time` and a list of
//! operations, each tagged by `op`:
//!
//! ```json
//! {
//!   "start_time": 1700000000,
//!   "ops": [
//!     { "op": "add_members", "caller": "0xa1…", "members": ["0x01…", "0x02…"] },
//!     { "op": "deposit", "amount": "3000" },
//!     { "op": "advance_time", "seconds": 86400 },
//!     { "op": "withdraw_all", "caller": "0x01…", "member": "0x01…" }
//!   ]
//! }
//! ```
//!
//! Token amounts and weights are decimal strings in whole units.

use anyhow::{bail, Context};
use rail_types::fixed::parse_decimal;
use rail_types::member::LeaveReason;
use rail_types::{Address, Amount, Fraction};
use rail_vault::config::BuiltVault;
use rail_vault::ManualClock;
use serde::{Deserialize, Serialize};

/// A parsed replay script.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Clock value before the first operation. Defaults to the wall clock.
    #[serde(default)]
    pub start_time: Option<u64>,
    pub ops: Vec<Op>,
}

/// One scripted operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    // Time
    AdvanceTime { seconds: u64 },
    SetTime { timestamp: u64 },

    // Membership
    AddMember {
        caller: Address,
        member: Address,
        #[serde(default)]
        weight: Option<String>,
    },
    AddMembers { caller: Address, members: Vec<Address> },
    RemoveMember {
        caller: Address,
        member: Address,
        reason: LeaveReason,
    },
    PartMember { caller: Address, member: Address },
    PartMembers { caller: Address, members: Vec<Address> },
    SetMemberWeight {
        caller: Address,
        member: Address,
        weight: String,
    },
    AddJoinPartAgent { caller: Address, agent: Address },
    RemoveJoinPartAgent { caller: Address, agent: Address },

    // Revenue and fees
    Deposit { amount: String },
    Receive { amount: String },
    RefreshRevenue,
    TransferToMemberInContract {
        caller: Address,
        member: Address,
        amount: String,
    },
    SetAdminFee { caller: Address, fee: Fraction },
    SetProtocolFee { fee: Fraction },
    SetFeeBeneficiary { beneficiary: Address },
    PauseFeeOracle,
    ResumeFeeOracle,

    // Withdrawals
    Withdraw {
        caller: Address,
        member: Address,
        amount: String,
    },
    WithdrawTo {
        caller: Address,
        recipient: Address,
        amount: String,
    },
    WithdrawAll { caller: Address, member: Address },
    WithdrawAllTo { caller: Address, recipient: Address },
    WithdrawToSigned {
        member: Address,
        recipient: Address,
        amount: String,
        signature: String,
    },
    TransferWithinContract {
        caller: Address,
        recipient: Address,
        amount: String,
    },

    // Bans
    Ban {
        caller: Address,
        member: Address,
        #[serde(default)]
        seconds: Option<u64>,
    },
    Restore { caller: Address, member: Address },

    // Administration
    TransferOwnership { caller: Address, new_owner: Address },
    ClaimOwnership { caller: Address },
    SetMetadata { caller: Address, metadata: String },
    LockModules { caller: Address },
}

impl Op {
    /// The `op` tag, for reports.
    pub fn name(&self) -> &'static str {
        match self {
            Op::AdvanceTime { .. } => "advance_time",
            Op::SetTime { .. } => "set_time",
            Op::AddMember { .. } => "add_member",
            Op::AddMembers { .. } => "add_members",
            Op::RemoveMember { .. } => "remove_member",
            Op::PartMember { .. } => "part_member",
            Op::PartMembers { .. } => "part_members",
            Op::SetMemberWeight { .. } => "set_member_weight",
            Op::AddJoinPartAgent { .. } => "add_join_part_agent",
            Op::RemoveJoinPartAgent { .. } => "remove_join_part_agent",
            Op::Deposit { .. } => "deposit",
            Op::Receive { .. } => "receive",
            Op::RefreshRevenue => "refresh_revenue",
            Op::TransferToMemberInContract { .. } => "transfer_to_member_in_contract",
            Op::SetAdminFee { .. } => "set_admin_fee",
            Op::SetProtocolFee { .. } => "set_protocol_fee",
            Op::SetFeeBeneficiary { .. } => "set_fee_beneficiary",
            Op::PauseFeeOracle => "pause_fee_oracle",
            Op::ResumeFeeOracle => "resume_fee_oracle",
            Op::Withdraw { .. } => "withdraw",
            Op::WithdrawTo { .. } => "withdraw_to",
            Op::WithdrawAll { .. } => "withdraw_all",
            Op::WithdrawAllTo { .. } => "withdraw_all_to",
            Op::WithdrawToSigned { .. } => "withdraw_to_signed",
            Op::TransferWithinContract { .. } => "transfer_within_contract",
            Op::Ban { .. } => "ban",
            Op::Restore { .. } => "restore",
            Op::TransferOwnership { .. } => "transfer_ownership",
            Op::ClaimOwnership { .. } => "claim_ownership",
            Op::SetMetadata { .. } => "set_metadata",
            Op::LockModules { .. } => "lock_modules",
        }
    }
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpResult {
    pub index: usize,
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn amount(value: &str) -> anyhow::Result<Amount> {
    parse_decimal(value).with_context(|| format!("invalid amount {value:?}"))
}

/// Apply one operation.
pub fn apply(built: &mut BuiltVault, clock: &ManualClock, op: &Op) -> anyhow::Result<()> {
    let vault = &mut built.vault;
    match op {
        Op::AdvanceTime { seconds } => clock.advance(*seconds),
        Op::SetTime { timestamp } => clock.set(*timestamp),

        Op::AddMember {
            caller,
            member,
            weight,
        } => match weight {
            Some(w) => vault.add_member_with_weight(*caller, *member, amount(w)?)?,
            None => vault.add_member(*caller, *member)?,
        },
        Op::AddMembers { caller, members } => vault.add_members(*caller, members)?,
        Op::RemoveMember {
            caller,
            member,
            reason,
        } => vault.remove_member(*caller, *member, *reason)?,
        Op::PartMember { caller, member } => vault.part_member(*caller, *member)?,
        Op::PartMembers { caller, members } => vault.part_members(*caller, members)?,
        Op::SetMemberWeight {
            caller,
            member,
            weight,
        } => vault.set_member_weight(*caller, *member, amount(weight)?)?,
        Op::AddJoinPartAgent { caller, agent } => vault.add_join_part_agent(*caller, *agent)?,
        Op::RemoveJoinPartAgent { caller, agent } => {
            vault.remove_join_part_agent(*caller, *agent)?
        }

        Op::Deposit { amount: a } => {
            vault.deposit(amount(a)?)?;
        }
        Op::Receive { amount: a } => vault.receive(amount(a)?)?,
        Op::RefreshRevenue => {
            vault.refresh_revenue()?;
        }
        Op::TransferToMemberInContract {
            caller,
            member,
            amount: a,
        } => vault.transfer_to_member_in_contract(*caller, *member, amount(a)?)?,
        Op::SetAdminFee { caller, fee } => vault.set_admin_fee(*caller, *fee)?,
        Op::SetProtocolFee { fee } => built.fee_oracle.set_fee(*fee)?,
        Op::SetFeeBeneficiary { beneficiary } => built.fee_oracle.set_beneficiary(*beneficiary)?,
        Op::PauseFeeOracle => built.fee_oracle.pause()?,
        Op::ResumeFeeOracle => built.fee_oracle.resume()?,

        Op::Withdraw {
            caller,
            member,
            amount: a,
        } => {
            vault.withdraw(*caller, *member, amount(a)?)?;
        }
        Op::WithdrawTo {
            caller,
            recipient,
            amount: a,
        } => {
            vault.withdraw_to(*caller, *recipient, amount(a)?)?;
        }
        Op::WithdrawAll { caller, member } => {
            vault.withdraw_all(*caller, *member)?;
        }
        Op::WithdrawAllTo { caller, recipient } => {
            vault.withdraw_all_to(*caller, *recipient)?;
        }
        Op::WithdrawToSigned {
            member,
            recipient,
            amount: a,
            signature,
        } => {
            let signature = hex::decode(signature.trim_start_matches("0x"))
                .context("signature is not hex")?;
            vault.withdraw_to_signed(*member, *recipient, amount(a)?, &signature)?;
        }
        Op::TransferWithinContract {
            caller,
            recipient,
            amount: a,
        } => vault.transfer_within_contract(*caller, *recipient, amount(a)?)?,

        Op::Ban {
            caller,
            member,
            seconds,
        } => {
            let Some(ban) = built.ban else {
                bail!("ban module is not enabled");
            };
            match seconds {
                Some(s) => ban.ban_seconds(vault, *caller, *member, *s)?,
                None => ban.ban(vault, *caller, *member)?,
            }
        }
        Op::Restore { caller, member } => {
            let Some(ban) = built.ban else {
                bail!("ban module is not enabled");
            };
            ban.restore(vault, *caller, *member)?;
        }

        Op::TransferOwnership { caller, new_owner } => {
            vault.transfer_ownership(*caller, *new_owner)?
        }
        Op::ClaimOwnership { caller } => vault.claim_ownership(*caller)?,
        Op::SetMetadata { caller, metadata } => vault.set_metadata(*caller, metadata.clone())?,
        Op::LockModules { caller } => vault.lock_modules(*caller)?,
    }
    Ok(())
}

/// Apply every operation in order. Failures are recorded and skipped.
pub fn run(built: &mut BuiltVault, clock: &ManualClock, ops: &[Op]) -> Vec<OpResult> {
    ops.iter()
        .enumerate()
        .map(|(index, op)| match apply(built, clock, op) {
            Ok(()) => OpResult {
                index,
                op: op.name(),
                ok: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(index, op = op.name(), error = %e, "replay: operation failed");
                OpResult {
                    index,
                    op: op.name(),
                    ok: false,
                    error: Some(format!("{e:#}")),
                }
            }
        })
        .collect()
}

/// Final state of one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountReport {
    pub address: Address,
    #[serde(flatten)]
    pub stats: rail_types::member::MemberStats,
}

/// Settled stats for every known account, in address order.
pub fn account_reports(built: &BuiltVault) -> anyhow::Result<Vec<AccountReport>> {
    let mut addresses: Vec<Address> = built.vault.records().map(|(a, _)| a).collect();
    addresses.sort();
    addresses
        .into_iter()
        .map(|address| {
            Ok(AccountReport {
                address,
                stats: built.vault.member_stats(address)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rail_types::{tokens, U256};
    use rail_vault::config::VaultConfig;
    use std::sync::Arc;

    const CONFIG: &str = r#"
[vault]
owner = "0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0"
admin_fee = "0.09"
join_part_agents = ["0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"]

[protocol_fee]
fee = "0.01"
beneficiary = "0xd0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0"
"#;

    fn setup() -> (BuiltVault, ManualClock) {
        let clock = ManualClock::new(1_000);
        let built = VaultConfig::from_toml_str(CONFIG)
            .expect("config")
            .build(Arc::new(clock.clone()))
            .expect("build");
        (built, clock)
    }

    fn parse(json: &str) -> Script {
        serde_json::from_str(json).expect("script")
    }

    #[test]
    fn test_parse_ops() {
        let script = parse(
            r#"{"ops": [
                {"op": "advance_time", "seconds": 5},
                {"op": "add_member", "caller": "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1",
                 "member": "0x0101010101010101010101010101010101010101", "weight": "2"},
                {"op": "remove_member", "caller": "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1",
                 "member": "0x0101010101010101010101010101010101010101", "reason": "banned"},
                {"op": "refresh_revenue"}
            ]}"#,
        );
        assert_eq!(script.start_time, None);
        let names: Vec<&str> = script.ops.iter().map(Op::name).collect();
        assert_eq!(
            names,
            vec!["advance_time", "add_member", "remove_member", "refresh_revenue"]
        );
    }

    #[test]
    fn test_failures_do_not_stop_the_run() {
        let (mut built, clock) = setup();
        let script = parse(
            r#"{"ops": [
                {"op": "add_members", "caller": "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1",
                 "members": ["0x0101010101010101010101010101010101010101",
                             "0x0202020202020202020202020202020202020202",
                             "0x0303030303030303030303030303030303030303"]},
                {"op": "ban", "caller": "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1",
                 "member": "0x0101010101010101010101010101010101010101"},
                {"op": "deposit", "amount": "3000"},
                {"op": "withdraw", "caller": "0x0101010101010101010101010101010101010101",
                 "member": "0x0101010101010101010101010101010101010101", "amount": "5000"},
                {"op": "advance_time", "seconds": 10}
            ]}"#,
        );
        let results = run(&mut built, &clock, &script.ops);

        let ok: Vec<bool> = results.iter().map(|r| r.ok).collect();
        assert_eq!(ok, vec![true, false, true, false, true]);
        assert!(results[1]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("ban module is not enabled")));
        assert_eq!(
            built.vault.earnings(Address::repeat_byte(1)).expect("earnings"),
            tokens(900)
        );
        assert_eq!(clock_now(&clock), 1_010);
    }

    fn clock_now(clock: &ManualClock) -> u64 {
        use rail_vault::Clock;
        clock.now()
    }

    #[test]
    fn test_account_reports_sorted() {
        let (mut built, clock) = setup();
        let ops = vec![
            Op::AddMembers {
                caller: Address::repeat_byte(0xa1),
                members: vec![Address::repeat_byte(2), Address::repeat_byte(1)],
            },
            Op::Deposit {
                amount: "10".to_string(),
            },
        ];
        assert!(run(&mut built, &clock, &ops).iter().all(|r| r.ok));

        let reports = account_reports(&built).expect("reports");
        let addresses: Vec<Address> = reports.iter().map(|r| r.address).collect();
        // members plus admin and protocol fee recipients
        assert_eq!(
            addresses,
            vec![
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                Address::repeat_byte(0xa0),
                Address::repeat_byte(0xd0),
            ]
        );
        assert_eq!(reports[0].stats.total_earnings, tokens(9) / U256::from(2));
    }
}
