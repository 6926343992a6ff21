//! Withdrawals and in-vault transfers.
//!
//! A withdrawal pays tokens out of the vault. The member itself or the owner
//! may withdraw a member's earnings, always to the member; only the member can
//! send them elsewhere. Relayers submit signed withdrawals on a member's
//! behalf (see [`crate::signature`]).
//!
//! Every withdrawal is offered to the withdraw listeners before any balance
//! changes, and any listener can veto it.

use rail_types::events::VaultEvent;
use rail_types::member::MemberStatus;
use rail_types::{Address, Amount};

use crate::vault::Vault;
use crate::{checked_add, checked_sub, Result, VaultError};

impl Vault {
    /// Withdraw `amount` of `member`'s earnings to `member`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotAuthorized`] if `caller` is neither `member` nor the owner
    /// - [`VaultError::NotMember`] if `member` has no record
    /// - [`VaultError::InsufficientBalance`] if `amount` exceeds the withdrawable balance
    /// - any error from a withdraw listener
    pub fn withdraw(&mut self, caller: Address, member: Address, amount: Amount) -> Result<Amount> {
        self.transact(|vault| {
            vault.require_withdraw_authority(caller, member)?;
            vault.withdraw_from(member, member, amount)
        })
    }

    /// Withdraw `amount` of the caller's own earnings to `recipient`.
    pub fn withdraw_to(&mut self, caller: Address, recipient: Address, amount: Amount) -> Result<Amount> {
        self.transact(|vault| vault.withdraw_from(caller, recipient, amount))
    }

    /// Withdraw everything `member` can withdraw to `member`. Withdrawing a
    /// zero balance is a no-op.
    pub fn withdraw_all(&mut self, caller: Address, member: Address) -> Result<Amount> {
        self.transact(|vault| {
            vault.require_withdraw_authority(caller, member)?;
            vault.withdraw_everything(member, member)
        })
    }

    /// Withdraw all of the caller's earnings to `recipient`.
    pub fn withdraw_all_to(&mut self, caller: Address, recipient: Address) -> Result<Amount> {
        self.transact(|vault| vault.withdraw_everything(caller, recipient))
    }

    /// Withdraw all earnings of several members, each to itself. Returns the
    /// total paid out.
    pub fn withdraw_members(&mut self, caller: Address, members: &[Address]) -> Result<Amount> {
        self.transact(|vault| {
            let mut total = Amount::zero();
            for member in members {
                vault.require_withdraw_authority(caller, *member)?;
                let paid = vault.withdraw_everything(*member, *member)?;
                total = checked_add(total, paid)?;
            }
            Ok(total)
        })
    }

    /// Withdraw `amount` of `member`'s earnings to `recipient` on the strength
    /// of the member's signature. Anyone may submit it.
    ///
    /// `amount == 0` means "everything withdrawable", matching what the member
    /// signed.
    ///
    /// # Errors
    ///
    /// - [`VaultError::BadSignatureLength`], [`VaultError::BadSignatureVersion`]
    ///   for malformed signatures
    /// - [`VaultError::BadSignature`] if the member did not sign this payload
    /// - the errors of [`withdraw`](Self::withdraw)
    pub fn withdraw_to_signed(
        &mut self,
        member: Address,
        recipient: Address,
        amount: Amount,
        signature: &[u8],
    ) -> Result<Amount> {
        self.transact(|vault| {
            if !vault.signature_is_valid(member, recipient, amount, signature)? {
                return Err(VaultError::BadSignature);
            }
            if amount.is_zero() {
                vault.withdraw_everything(member, recipient)
            } else {
                vault.withdraw_from(member, recipient, amount)
            }
        })
    }

    /// Withdraw everything on the strength of a signature over amount zero.
    pub fn withdraw_all_to_signed(
        &mut self,
        member: Address,
        recipient: Address,
        signature: &[u8],
    ) -> Result<Amount> {
        self.withdraw_to_signed(member, recipient, Amount::zero(), signature)
    }

    /// Move `amount` of the caller's withdrawable balance to `recipient`
    /// inside the vault.
    ///
    /// Only active members may transfer, and withdraw listeners are consulted
    /// first. The sender's `withdrawn` counter advances, invalidating any
    /// outstanding signatures. Recipients without a record become inactive
    /// members.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotMember`] if the caller has no record
    /// - [`VaultError::NotActiveMember`] if the caller has parted or was removed
    /// - [`VaultError::InsufficientBalance`] if `amount` exceeds its balance
    /// - any error from a withdraw listener
    pub fn transfer_within_contract(
        &mut self,
        caller: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<()> {
        self.transact(|vault| {
            let mut record = vault.settle_member(caller)?;
            match record.status {
                MemberStatus::None => return Err(VaultError::NotMember(caller)),
                MemberStatus::Inactive => return Err(VaultError::NotActiveMember(caller)),
                MemberStatus::Active => {}
            }
            let available = record.withdrawable();
            if amount > available {
                return Err(VaultError::InsufficientBalance {
                    member: caller,
                    requested: amount,
                    available,
                });
            }
            vault.notify_transfer(caller, recipient, amount)?;

            record.withdrawn = checked_add(record.withdrawn, amount)?;
            vault.store_member(caller, record);
            vault.credit_balance(recipient, amount)?;

            vault.emit(VaultEvent::TransferWithinContract {
                from: caller,
                to: recipient,
                amount,
            });
            tracing::info!(from = %caller, to = %recipient, amount = %amount, "vault: in-vault transfer");
            Ok(())
        })
    }

    fn require_withdraw_authority(&self, caller: Address, member: Address) -> Result<()> {
        if caller != member && caller != self.owner() {
            return Err(VaultError::NotAuthorized {
                caller,
                action: "withdraw another member's earnings",
            });
        }
        Ok(())
    }

    fn withdraw_everything(&mut self, member: Address, recipient: Address) -> Result<Amount> {
        let record = self.settle_member(member)?;
        if record.status == MemberStatus::None {
            return Err(VaultError::NotMember(member));
        }
        let amount = record.withdrawable();
        if amount.is_zero() {
            tracing::debug!(member = %member, "vault: nothing to withdraw");
            return Ok(Amount::zero());
        }
        self.withdraw_from(member, recipient, amount)
    }

    fn withdraw_from(&mut self, member: Address, recipient: Address, amount: Amount) -> Result<Amount> {
        let mut record = self.settle_member(member)?;
        if record.status == MemberStatus::None {
            return Err(VaultError::NotMember(member));
        }
        if amount.is_zero() {
            return Ok(Amount::zero());
        }
        let available = record.withdrawable();
        if amount > available {
            return Err(VaultError::InsufficientBalance {
                member,
                requested: amount,
                available,
            });
        }

        self.notify_withdraw(member, recipient, amount)?;

        record.withdrawn = checked_add(record.withdrawn, amount)?;
        self.store_member(member, record);
        self.ledger.total_withdrawn = checked_add(self.ledger.total_withdrawn, amount)?;
        self.ledger.held_balance = checked_sub(self.ledger.held_balance, amount)?;

        self.emit(VaultEvent::EarningsWithdrawn {
            member,
            recipient,
            amount,
        });
        tracing::info!(member = %member, recipient = %recipient, amount = %amount, "vault: earnings withdrawn");
        Ok(amount)
    }
}
