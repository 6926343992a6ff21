//! Fee oracle trait and the default implementation.
//!
//! A fee oracle reports two values: the protocol fee fraction charged on every
//! revenue distribution, and the beneficiary credited with it. Both may change
//! at any time. Vaults hold the oracle as an `Arc<dyn FeeOracle>` shared between
//! many ledgers.

use std::sync::RwLock;

use rail_types::{Address, Fraction};
use serde::{Deserialize, Serialize};

use crate::{OracleError, Result};

/// A protocol fee quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Fraction of every distribution taken as protocol fee.
    pub fee: Fraction,
    /// Account credited with the protocol fee.
    pub beneficiary: Address,
}

/// Source of protocol fee quotes.
pub trait FeeOracle: Send + Sync + std::fmt::Debug {
    /// Current protocol fee fraction.
    fn protocol_fee(&self) -> Result<Fraction>;

    /// Current protocol fee beneficiary.
    fn beneficiary(&self) -> Result<Address>;

    /// Both values at once.
    fn quote(&self) -> Result<FeeQuote> {
        Ok(FeeQuote {
            fee: self.protocol_fee()?,
            beneficiary: self.beneficiary()?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct OracleState {
    fee: Fraction,
    beneficiary: Address,
    paused: bool,
}

/// Settable fee oracle operated by the protocol.
///
/// The fee and beneficiary are adjusted with [`set_fee`](Self::set_fee) and
/// [`set_beneficiary`](Self::set_beneficiary). [`pause`](Self::pause) makes
/// every query fail, which is how outages are exercised.
#[derive(Debug)]
pub struct DefaultFeeOracle {
    state: RwLock<OracleState>,
}

impl DefaultFeeOracle {
    /// Create an oracle serving `fee` to `beneficiary`.
    pub fn new(fee: Fraction, beneficiary: Address) -> Self {
        Self {
            state: RwLock::new(OracleState {
                fee,
                beneficiary,
                paused: false,
            }),
        }
    }

    /// Change the protocol fee fraction.
    pub fn set_fee(&self, fee: Fraction) -> Result<()> {
        let mut state = self.write()?;
        tracing::info!(old_fee = %state.fee, new_fee = %fee, "fee oracle: protocol fee changed");
        state.fee = fee;
        Ok(())
    }

    /// Change the protocol fee beneficiary.
    pub fn set_beneficiary(&self, beneficiary: Address) -> Result<()> {
        let mut state = self.write()?;
        tracing::info!(beneficiary = %beneficiary, "fee oracle: beneficiary changed");
        state.beneficiary = beneficiary;
        Ok(())
    }

    /// Stop serving quotes.
    pub fn pause(&self) -> Result<()> {
        tracing::warn!("fee oracle: paused");
        self.write()?.paused = true;
        Ok(())
    }

    /// Resume serving quotes.
    pub fn resume(&self) -> Result<()> {
        tracing::info!("fee oracle: resumed");
        self.write()?.paused = false;
        Ok(())
    }

    /// Whether the oracle is paused.
    pub fn is_paused(&self) -> bool {
        self.read().map(|s| s.paused).unwrap_or(true)
    }

    fn read(&self) -> Result<OracleState> {
        self.state
            .read()
            .map(|guard| *guard)
            .map_err(|_| OracleError::Unavailable("state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, OracleState>> {
        self.state
            .write()
            .map_err(|_| OracleError::Unavailable("state lock poisoned".to_string()))
    }

    fn live(&self) -> Result<OracleState> {
        let state = self.read()?;
        if state.paused {
            return Err(OracleError::Paused);
        }
        Ok(state)
    }
}

impl FeeOracle for DefaultFeeOracle {
    fn protocol_fee(&self) -> Result<Fraction> {
        Ok(self.live()?.fee)
    }

    fn beneficiary(&self) -> Result<Address> {
        Ok(self.live()?.beneficiary)
    }

    fn quote(&self) -> Result<FeeQuote> {
        let state = self.live()?;
        Ok(FeeQuote {
            fee: state.fee,
            beneficiary: state.beneficiary,
        })
    }
}
