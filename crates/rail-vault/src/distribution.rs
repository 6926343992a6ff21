//! Revenue distribution engine.
//!
//! Tokens reach the vault with [`Vault::receive`] and are distributed by
//! [`Vault::refresh_revenue`], or both at once with [`Vault::deposit`].
//!
//! ## Fee split
//!
//! ```text
//! new_revenue  = held_balance - (total_revenue + total_transferred_in - total_withdrawn)
//! admin_fee    = new_revenue * admin_fee_fraction
//! protocol_fee = new_revenue * protocol_fee_fraction
//! member_share = new_revenue - admin_fee - protocol_fee
//! earnings_per_weight += member_share * 10^18 / total_weight
//! ```
//!
//! Fees are credited to the owner and the fee beneficiary as in-vault balances.
//! Truncation leaves a few units of dust per deposit in the vault; nothing is
//! ever over-distributed.

use rail_oracle::FeeQuote;
use rail_types::events::VaultEvent;
use rail_types::fixed::div_scaled;
use rail_types::member::{MemberStats, MemberStatus};
use rail_types::{Address, Amount, Fraction};

use crate::vault::Vault;
use crate::{checked_add, checked_sub, Result, VaultError};

impl Vault {
    /// Record `amount` tokens arriving at the vault without distributing them.
    pub fn receive(&mut self, amount: Amount) -> Result<()> {
        self.transact(|vault| vault.credit_held(amount))
    }

    /// Receive `amount` and distribute everything undistributed.
    /// Returns the amount distributed.
    pub fn deposit(&mut self, amount: Amount) -> Result<Amount> {
        self.transact(|vault| {
            vault.credit_held(amount)?;
            vault.distribute_new_revenue()
        })
    }

    /// Distribute tokens that arrived since the last distribution.
    ///
    /// Returns the amount distributed, zero if there was nothing new or no
    /// active weight to distribute to. Undistributed tokens stay in the vault
    /// for a later refresh.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Arithmetic`] on overflow
    pub fn refresh_revenue(&mut self) -> Result<Amount> {
        self.transact(|vault| vault.distribute_new_revenue())
    }

    /// Tokens held but not yet distributed.
    pub fn undistributed_balance(&self) -> Result<Amount> {
        let accounted = checked_sub(
            checked_add(self.ledger.total_revenue, self.ledger.total_transferred_in)?,
            self.ledger.total_withdrawn,
        )?;
        Ok(self.ledger.held_balance.saturating_sub(accounted))
    }

    /// Credit external tokens directly to `member`'s withdrawable balance.
    ///
    /// No fees are charged and the amount is not revenue. Addresses without a
    /// record become inactive members.
    pub fn transfer_to_member_in_contract(
        &mut self,
        caller: Address,
        member: Address,
        amount: Amount,
    ) -> Result<()> {
        self.transact(|vault| {
            vault.credit_held(amount)?;
            vault.ledger.total_transferred_in =
                checked_add(vault.ledger.total_transferred_in, amount)?;
            vault.credit_balance(member, amount)?;
            vault.emit(VaultEvent::TransferToAddressInContract {
                from: caller,
                to: member,
                amount,
            });
            tracing::info!(from = %caller, to = %member, amount = %amount, "vault: tokens credited to member");
            Ok(())
        })
    }

    /// Change the admin fee. Owner only.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotAuthorized`] if `caller` is not the owner
    /// - [`VaultError::InvalidFraction`] if `admin_fee` plus the protocol fee
    ///   exceeds 1.0
    pub fn set_admin_fee(&mut self, caller: Address, admin_fee: Fraction) -> Result<()> {
        self.transact(|vault| {
            vault.require_owner(caller, "set the admin fee")?;
            let protocol_fee = vault.refresh_fee_quote()?.quote.fee;
            if admin_fee.checked_add(protocol_fee).is_none() {
                return Err(VaultError::InvalidFraction(format!(
                    "admin fee {admin_fee} plus protocol fee {protocol_fee} exceeds 1.0"
                )));
            }
            vault.ledger.admin_fee = admin_fee;
            vault.emit(VaultEvent::AdminFeeChanged {
                admin_fee,
                admin: vault.ledger.owner,
            });
            tracing::info!(admin_fee = %admin_fee, "vault: admin fee changed");
            Ok(())
        })
    }

    /// Lifetime earnings of `member`, settled up to now.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotMember`] if `member` has no record
    pub fn earnings(&self, member: Address) -> Result<Amount> {
        Ok(self.known_record(member)?.total_earnings)
    }

    /// What `member` could withdraw right now.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotMember`] if `member` has no record
    pub fn withdrawable_earnings(&self, member: Address) -> Result<Amount> {
        Ok(self.known_record(member)?.withdrawable())
    }

    /// Settled statistics of `member`; zeroed for unknown addresses.
    pub fn member_stats(&self, member: Address) -> Result<MemberStats> {
        Ok(self.settled_record(member)?.stats())
    }

    fn known_record(&self, member: Address) -> Result<crate::MemberRecord> {
        let record = self.settled_record(member)?;
        if record.status == MemberStatus::None {
            return Err(VaultError::NotMember(member));
        }
        Ok(record)
    }

    fn credit_held(&mut self, amount: Amount) -> Result<()> {
        self.ledger.held_balance = checked_add(self.ledger.held_balance, amount)?;
        tracing::debug!(amount = %amount, held = %self.ledger.held_balance, "vault: tokens received");
        Ok(())
    }

    /// Add `amount` to an address's in-vault balance, creating an inactive
    /// record for unknown addresses.
    pub(crate) fn credit_balance(&mut self, account: Address, amount: Amount) -> Result<()> {
        let mut record = self.settle_member(account)?;
        if record.status == MemberStatus::None {
            record.status = MemberStatus::Inactive;
            self.ledger.inactive_member_count += 1;
        }
        record.total_earnings = checked_add(record.total_earnings, amount)?;
        self.store_member(account, record);
        Ok(())
    }

    pub(crate) fn distribute_new_revenue(&mut self) -> Result<Amount> {
        let amount = self.undistributed_balance()?;
        if amount.is_zero() {
            tracing::debug!("vault: no new revenue");
            return Ok(Amount::zero());
        }
        let total_weight = self.ledger.total_weight;
        if total_weight.is_zero() {
            tracing::debug!(amount = %amount, "vault: no active weight, revenue left undistributed");
            return Ok(Amount::zero());
        }

        let quote = self.charged_fee_quote()?;
        let admin_fee = self.ledger.admin_fee.of(amount)?;
        let protocol_fee = quote.fee.of(amount)?;
        let member_share = checked_sub(checked_sub(amount, admin_fee)?, protocol_fee)?;

        let per_weight = div_scaled(member_share, total_weight)?;
        self.ledger.earnings_per_weight = checked_add(self.ledger.earnings_per_weight, per_weight)?;

        let owner = self.ledger.owner;
        if !admin_fee.is_zero() {
            self.credit_balance(owner, admin_fee)?;
        }
        if !protocol_fee.is_zero() {
            self.credit_balance(quote.beneficiary, protocol_fee)?;
        }

        self.ledger.total_revenue = checked_add(self.ledger.total_revenue, amount)?;
        self.ledger.total_earnings = checked_add(self.ledger.total_earnings, member_share)?;
        self.ledger.total_admin_fees = checked_add(self.ledger.total_admin_fees, admin_fee)?;
        self.ledger.total_protocol_fees =
            checked_add(self.ledger.total_protocol_fees, protocol_fee)?;

        self.emit(VaultEvent::RevenueReceived { amount });
        self.emit(VaultEvent::NewEarnings {
            earnings_per_unit_weight: per_weight,
            total_weight,
        });
        self.emit(VaultEvent::AdminFeeCharged {
            amount: admin_fee,
            admin: owner,
        });
        self.emit(VaultEvent::ProtocolFeeCharged {
            amount: protocol_fee,
            beneficiary: quote.beneficiary,
        });

        tracing::info!(
            amount = %amount,
            member_share = %member_share,
            admin_fee = %admin_fee,
            protocol_fee = %protocol_fee,
            "vault: revenue distributed"
        );
        Ok(amount)
    }

    fn refresh_fee_quote(&mut self) -> Result<rail_oracle::ResolvedQuote> {
        let oracle = self
            .ledger
            .fee_oracle
            .clone()
            .ok_or(VaultError::NotInitialized)?;
        let cache = self
            .ledger
            .fee_cache
            .as_mut()
            .ok_or(VaultError::NotInitialized)?;
        Ok(cache.refresh(oracle.as_ref()))
    }

    /// The protocol fee to charge on this distribution.
    ///
    /// A fresh quote that no longer fits next to the admin fee lowers the admin
    /// fee for good. A cached quote is clamped instead, so an outage never
    /// changes the admin fee.
    fn charged_fee_quote(&mut self) -> Result<FeeQuote> {
        let resolved = self.refresh_fee_quote()?;
        let mut quote = resolved.quote;
        let admin_fee = self.ledger.admin_fee;

        if admin_fee.checked_add(quote.fee).is_some() {
            return Ok(quote);
        }
        if resolved.fresh {
            let clamped = quote.fee.complement();
            tracing::warn!(
                old_admin_fee = %admin_fee,
                new_admin_fee = %clamped,
                protocol_fee = %quote.fee,
                "vault: admin fee lowered to fit the protocol fee"
            );
            self.ledger.admin_fee = clamped;
            self.emit(VaultEvent::AdminFeeChanged {
                admin_fee: clamped,
                admin: self.ledger.owner,
            });
        } else {
            quote.fee = quote.fee.min(admin_fee.complement());
            tracing::warn!(protocol_fee = %quote.fee, "vault: cached protocol fee clamped");
        }
        Ok(quote)
    }
}
