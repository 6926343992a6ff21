//! Vault configuration files.
//!
//! ```toml
//! [vault]
//! identifier = "0x7777777777777777777777777777777777777777"
//! owner = "0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0"
//! admin_fee = "0.09"
//! join_part_agents = ["0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"]
//!
//! [protocol_fee]
//! fee = "0.01"
//! beneficiary = "0xd0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0"
//!
//! [modules.ban]
//! enabled = true
//!
//! [modules.limit_withdraw]
//! enabled = true
//! withdraw_limit_during_period = "100"
//! ```
//!
//! Fractions and token amounts are decimal strings; amounts are in whole
//! tokens with up to 18 decimals.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rail_oracle::DefaultFeeOracle;
use rail_types::fixed::parse_decimal;
use rail_types::{Address, Amount, Fraction};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::modules::ban::BanHandle;
use crate::modules::limit_withdraw::{LimitWithdrawHandle, LimitWithdrawParams};
use crate::vault::{InitParams, Vault};
use crate::VaultError;

/// Errors produced while loading or applying a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`VaultConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A token amount field is not a valid decimal.
    #[error("invalid amount for {field}: {value:?}")]
    InvalidAmount { field: &'static str, value: String },

    /// The vault rejected the configuration.
    #[error("vault setup failed: {0}")]
    Vault(#[from] VaultError),
}

/// Complete vault configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Ledger settings.
    #[serde(default)]
    pub vault: LedgerConfig,
    /// Protocol fee source settings.
    #[serde(default)]
    pub protocol_fee: ProtocolFeeConfig,
    /// Optional modules.
    #[serde(default)]
    pub modules: ModulesConfig,
}

/// `[vault]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Ledger identifier bound into signed withdrawals.
    #[serde(default)]
    pub identifier: Address,
    /// Initial owner, receives admin fees.
    #[serde(default)]
    pub owner: Address,
    /// Admin fee fraction.
    #[serde(default = "default_admin_fee")]
    pub admin_fee: Fraction,
    /// Free-form metadata string.
    #[serde(default = "default_metadata")]
    pub metadata: String,
    /// Initial join/part agents.
    #[serde(default)]
    pub join_part_agents: Vec<Address>,
}

/// `[protocol_fee]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolFeeConfig {
    /// Protocol fee fraction.
    #[serde(default = "default_protocol_fee")]
    pub fee: Fraction,
    /// Protocol fee recipient.
    #[serde(default)]
    pub beneficiary: Address,
}

/// `[modules]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default)]
    pub ban: BanConfig,
    #[serde(default)]
    pub limit_withdraw: LimitWithdrawConfig,
}

/// `[modules.ban]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BanConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// `[modules.limit_withdraw]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitWithdrawConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Seconds a member must have been in the vault before withdrawing.
    #[serde(default = "default_required_member_age")]
    pub required_member_age_secs: u64,
    /// Window length in seconds.
    #[serde(default = "default_withdraw_limit_period")]
    pub withdraw_limit_period_secs: u64,
    /// Tokens allowed per window.
    #[serde(default = "default_withdraw_limit")]
    pub withdraw_limit_during_period: String,
    /// Smallest allowed withdrawal in tokens.
    #[serde(default = "default_minimum_withdraw")]
    pub minimum_withdraw: String,
}

// Default value functions

fn default_admin_fee() -> Fraction {
    Fraction::ZERO
}

fn default_metadata() -> String {
    "{}".to_string()
}

fn default_protocol_fee() -> Fraction {
    Fraction::ZERO
}

fn default_required_member_age() -> u64 {
    24 * 60 * 60
}

fn default_withdraw_limit_period() -> u64 {
    60 * 60
}

fn default_withdraw_limit() -> String {
    "100".to_string()
}

fn default_minimum_withdraw() -> String {
    "1".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            identifier: Address::ZERO,
            owner: Address::ZERO,
            admin_fee: default_admin_fee(),
            metadata: default_metadata(),
            join_part_agents: Vec::new(),
        }
    }
}

impl Default for ProtocolFeeConfig {
    fn default() -> Self {
        Self {
            fee: default_protocol_fee(),
            beneficiary: Address::ZERO,
        }
    }
}

impl Default for LimitWithdrawConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            required_member_age_secs: default_required_member_age(),
            withdraw_limit_period_secs: default_withdraw_limit_period(),
            withdraw_limit_during_period: default_withdraw_limit(),
            minimum_withdraw: default_minimum_withdraw(),
        }
    }
}

impl LimitWithdrawConfig {
    /// Module parameters with amounts converted to token wei.
    pub fn params(&self) -> Result<LimitWithdrawParams, ConfigError> {
        Ok(LimitWithdrawParams {
            required_member_age: self.required_member_age_secs,
            withdraw_limit_period: self.withdraw_limit_period_secs,
            withdraw_limit_during_period: parse_amount(
                "withdraw_limit_during_period",
                &self.withdraw_limit_during_period,
            )?,
            minimum_withdraw: parse_amount("minimum_withdraw", &self.minimum_withdraw)?,
        })
    }
}

fn parse_amount(field: &'static str, value: &str) -> Result<Amount, ConfigError> {
    parse_decimal(value).map_err(|_| ConfigError::InvalidAmount {
        field,
        value: value.to_string(),
    })
}

/// A vault built from configuration, with handles to what was installed.
#[derive(Debug)]
pub struct BuiltVault {
    pub vault: Vault,
    /// The fee source, for adjusting protocol fees at runtime.
    pub fee_oracle: Arc<DefaultFeeOracle>,
    pub ban: Option<BanHandle>,
    pub limit_withdraw: Option<LimitWithdrawHandle>,
}

impl VaultConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Create and initialize a vault, then install the enabled modules as the
    /// owner.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Result<BuiltVault, ConfigError> {
        let limit_params = if self.modules.limit_withdraw.enabled {
            Some(self.modules.limit_withdraw.params()?)
        } else {
            None
        };

        let fee_oracle = Arc::new(DefaultFeeOracle::new(
            self.protocol_fee.fee,
            self.protocol_fee.beneficiary,
        ));
        let mut vault = Vault::new(self.vault.identifier, clock);
        vault.initialize(InitParams {
            owner: self.vault.owner,
            join_part_agents: self.vault.join_part_agents.clone(),
            admin_fee: self.vault.admin_fee,
            fee_oracle: fee_oracle.clone(),
            metadata: self.vault.metadata.clone(),
        })?;

        let owner = self.vault.owner;
        let ban = if self.modules.ban.enabled {
            Some(BanHandle::install(&mut vault, owner)?)
        } else {
            None
        };
        let limit_withdraw = match limit_params {
            Some(params) => Some(LimitWithdrawHandle::install(&mut vault, owner, params)?),
            None => None,
        };

        tracing::info!(
            identifier = %self.vault.identifier,
            owner = %owner,
            ban = ban.is_some(),
            limit_withdraw = limit_withdraw.is_some(),
            "config: vault built"
        );
        Ok(BuiltVault {
            vault,
            fee_oracle,
            ban,
            limit_withdraw,
        })
    }
}
