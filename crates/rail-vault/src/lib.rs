//! # rail-vault
//!
//! Revenue-sharing vault ledger.
//!
//! A vault holds a pool of weighted members. Every revenue deposit is split
//! between an admin fee, a protocol fee, and the members in proportion to their
//! weights. Distribution is O(1) per deposit: a global earnings-per-weight
//! accumulator advances and each member settles lazily against it. Members pull
//! their earnings out directly or authorize a relayer with a signature.
//!
//! All mutating operations run inside [`Vault::transact`] and either commit
//! completely or leave the ledger untouched.
//!
//! ## Modules
//!
//! - [`vault`] — Ledger aggregate, ownership, admin fee, stats, transactions
//! - [`member`] — Per-member record and settlement
//! - [`registry`] — Membership and join/part agents
//! - [`distribution`] — Revenue intake and fee split
//! - [`withdraw`] — Withdrawals and in-vault transfers
//! - [`signature`] — Signed withdrawal payloads
//! - [`modules`] — Listener hooks and the ban and withdraw-limit modules
//! - [`clock`] — Time source
//! - [`config`] — TOML configuration

pub mod clock;
pub mod config;
pub mod distribution;
pub mod member;
pub mod modules;
pub mod registry;
pub mod signature;
pub mod vault;
pub mod withdraw;

pub use clock::{Clock, ManualClock, SystemClock};
pub use member::MemberRecord;
pub use modules::{Hook, HookEvent, ModuleContext, ModuleError, ModuleId, VaultModule};
pub use vault::{InitParams, Vault};

use rail_types::{Address, Amount, FixedPointError};

/// Error types for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    /// Caller lacks the role required for the operation.
    #[error("{caller} is not authorized to {action}")]
    NotAuthorized {
        /// The rejected caller.
        caller: Address,
        /// What the caller attempted.
        action: &'static str,
    },

    /// Member is already active.
    #[error("{0} is already an active member")]
    AlreadyMember(Address),

    /// Member is not active.
    #[error("{0} is not an active member")]
    NotActiveMember(Address),

    /// Address has no member record.
    #[error("{0} is not a member")]
    NotMember(Address),

    /// A join was requested with weight zero.
    #[error("cannot add {0} with zero weight")]
    ZeroWeight(Address),

    /// A fee fraction is out of range, or fees would sum above 1.0.
    #[error("invalid fee fraction: {0}")]
    InvalidFraction(String),

    /// Withdrawal or transfer exceeds the withdrawable balance.
    #[error("insufficient balance for {member}: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Member whose balance was checked.
        member: Address,
        /// Requested amount.
        requested: Amount,
        /// Withdrawable amount.
        available: Amount,
    },

    /// Signature was not made by the member for this payload.
    #[error("bad signature")]
    BadSignature,

    /// Signature is not 65 bytes long.
    #[error("bad signature length: {0}")]
    BadSignatureLength(usize),

    /// Signature recovery byte is not 27 or 28.
    #[error("bad signature version: {0}")]
    BadSignatureVersion(u8),

    /// A module listener vetoed the operation.
    #[error("module {module} rejected the operation: {reason}")]
    ModuleRejected {
        /// Name of the rejecting module.
        module: String,
        /// Why it rejected.
        reason: String,
    },

    /// Module configuration is locked.
    #[error("modules are locked")]
    ModulesLocked,

    /// Withdrawal is below the configured minimum.
    #[error("withdraw amount {amount} is below the minimum {minimum}")]
    WithdrawBelowMinimum {
        /// Requested amount.
        amount: Amount,
        /// Configured minimum.
        minimum: Amount,
    },

    /// Withdrawal would exceed the limit for the current period.
    #[error("withdraw limit exceeded: requested {requested}, remaining in period {remaining}")]
    WithdrawLimitExceeded {
        /// Requested amount.
        requested: Amount,
        /// What is left of the period's allowance.
        remaining: Amount,
    },

    /// Member joined too recently to withdraw.
    #[error("{member} joined at {joined_at} and may withdraw from {eligible_at}")]
    MemberTooNew {
        /// The member.
        member: Address,
        /// Join timestamp.
        joined_at: u64,
        /// First timestamp at which withdrawals are allowed.
        eligible_at: u64,
    },

    /// `initialize` was called twice.
    #[error("vault is already initialized")]
    AlreadyInitialized,

    /// Mutation attempted before `initialize`.
    #[error("vault is not initialized")]
    NotInitialized,

    /// Agent is already registered.
    #[error("{0} is already a join/part agent")]
    AlreadyActiveAgent(Address),

    /// Agent is not registered.
    #[error("{0} is not a join/part agent")]
    NotActiveAgent(Address),

    /// Batch argument lists differ in length.
    #[error("length mismatch: {left} != {right}")]
    LengthMismatch {
        /// Length of the first list.
        left: usize,
        /// Length of the second list.
        right: usize,
    },

    /// No module with this id (or of the requested type) is installed.
    #[error("unknown module {0}")]
    UnknownModule(u32),

    /// Module is already listening on the hook.
    #[error("module {module} already listens on {hook}")]
    ListenerAlreadyAdded {
        /// Hook name.
        hook: Hook,
        /// Module id.
        module: u32,
    },

    /// Module is not listening on the hook.
    #[error("module {module} does not listen on {hook}")]
    ListenerNotFound {
        /// Hook name.
        hook: Hook,
        /// Module id.
        module: u32,
    },

    /// Fixed-point arithmetic failed.
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] FixedPointError),

    /// The fee oracle could not be read and no quote was cached.
    #[error("fee source error: {0}")]
    FeeSource(#[from] rail_oracle::OracleError),
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Checked addition on token amounts.
pub(crate) fn checked_add(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_add(b)
        .ok_or(VaultError::Arithmetic(FixedPointError::Overflow))
}

/// Checked subtraction on token amounts.
pub(crate) fn checked_sub(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_sub(b)
        .ok_or(VaultError::Arithmetic(FixedPointError::Overflow))
}

#[cfg(test)]
pub(crate) mod test_support;
