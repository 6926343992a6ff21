//! The ledger aggregate.
//!
//! [`Vault`] owns every piece of ledger state: global totals, member records,
//! join/part agents, installed modules and the event log. All operations are
//! methods on one explicit `Vault` value; hosts that share it across threads
//! wrap it in a `Mutex`.
//!
//! ## Transactions
//!
//! Public mutating operations run inside [`Vault::transact`]. The first time a
//! transaction touches a member record, the agent set, a module or the
//! listener lists, the original is saved in a journal. On error the journal is replayed and the
//! vault is exactly as it was before the call. Transactions nest: an inner
//! transaction folds into the outermost one, and only the outermost commits or
//! rolls back. Inner errors must be propagated for this to hold.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rail_oracle::{FeeCache, FeeOracle, FeeQuote};
use rail_types::events::{Event, VaultEvent};
use rail_types::member::{MemberStatus, VaultStats};
use rail_types::{Address, Amount, Fraction, U256};

use crate::clock::Clock;
use crate::member::MemberRecord;
use crate::modules::{ModuleId, ModuleLayout, ModuleRegistry, VaultModule};
use crate::{Result, VaultError};

/// Arguments to [`Vault::initialize`].
#[derive(Debug, Clone)]
pub struct InitParams {
    /// Initial owner. Receives admin fees.
    pub owner: Address,
    /// Initial join/part agents.
    pub join_part_agents: Vec<Address>,
    /// Initial admin fee fraction.
    pub admin_fee: Fraction,
    /// Protocol fee source.
    pub fee_oracle: Arc<dyn FeeOracle>,
    /// Free-form metadata, usually a JSON string.
    pub metadata: String,
}

/// Global ledger state, snapshotted whole at transaction start.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ledger {
    pub(crate) initialized: bool,
    pub(crate) owner: Address,
    pub(crate) pending_owner: Option<Address>,
    pub(crate) metadata: String,
    pub(crate) admin_fee: Fraction,
    pub(crate) fee_oracle: Option<Arc<dyn FeeOracle>>,
    pub(crate) fee_cache: Option<FeeCache>,
    pub(crate) total_weight: U256,
    pub(crate) earnings_per_weight: U256,
    pub(crate) total_revenue: Amount,
    pub(crate) total_earnings: Amount,
    pub(crate) total_admin_fees: Amount,
    pub(crate) total_protocol_fees: Amount,
    pub(crate) total_withdrawn: Amount,
    pub(crate) active_member_count: u64,
    pub(crate) inactive_member_count: u64,
    /// Tokens currently held by the vault.
    pub(crate) held_balance: Amount,
    /// Tokens credited directly to members, bypassing revenue distribution.
    pub(crate) total_transferred_in: Amount,
}

/// Originals of everything the running transaction has touched.
#[derive(Debug)]
struct Journal {
    depth: u32,
    ledger: Ledger,
    members: HashMap<Address, Option<MemberRecord>>,
    agents: Option<BTreeSet<Address>>,
    installed_modules: usize,
    module_layout: Option<ModuleLayout>,
    /// Modules changed by the transaction, as they were before it.
    module_originals: HashMap<ModuleId, Box<dyn VaultModule>>,
    events_len: usize,
    next_sequence: u64,
}

/// A revenue-sharing vault.
#[derive(Debug)]
pub struct Vault {
    identifier: Address,
    clock: Arc<dyn Clock>,
    pub(crate) ledger: Ledger,
    members: HashMap<Address, MemberRecord>,
    agents: BTreeSet<Address>,
    pub(crate) modules: ModuleRegistry,
    events: Vec<Event>,
    next_sequence: u64,
    journal: Option<Journal>,
}

impl Vault {
    /// Create an uninitialized vault.
    ///
    /// `identifier` is bound into every signed withdrawal payload, so signatures
    /// for one vault are useless on another.
    pub fn new(identifier: Address, clock: Arc<dyn Clock>) -> Self {
        Self {
            identifier,
            clock,
            ledger: Ledger::default(),
            members: HashMap::new(),
            agents: BTreeSet::new(),
            modules: ModuleRegistry::default(),
            events: Vec::new(),
            next_sequence: 0,
            journal: None,
        }
    }

    /// Set owner, agents, fees and metadata. Callable once.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyInitialized`] on a second call
    /// - [`VaultError::FeeSource`] if the fee oracle cannot be read
    /// - [`VaultError::InvalidFraction`] if admin plus protocol fee exceeds 1.0
    /// - [`VaultError::AlreadyActiveAgent`] if an agent is listed twice
    pub fn initialize(&mut self, params: InitParams) -> Result<()> {
        if self.ledger.initialized {
            return Err(VaultError::AlreadyInitialized);
        }
        self.atomically(|vault| {
            let quote = params.fee_oracle.quote()?;
            if params.admin_fee.checked_add(quote.fee).is_none() {
                return Err(VaultError::InvalidFraction(format!(
                    "admin fee {} plus protocol fee {} exceeds 1.0",
                    params.admin_fee, quote.fee
                )));
            }

            vault.ledger.initialized = true;
            vault.ledger.owner = params.owner;
            vault.ledger.admin_fee = params.admin_fee;
            vault.ledger.metadata = params.metadata.clone();
            vault.ledger.fee_oracle = Some(Arc::clone(&params.fee_oracle));
            vault.ledger.fee_cache = Some(FeeCache::new(quote));

            vault.emit(VaultEvent::OwnershipTransferred {
                previous_owner: Address::ZERO,
                new_owner: params.owner,
            });
            vault.emit(VaultEvent::AdminFeeChanged {
                admin_fee: params.admin_fee,
                admin: params.owner,
            });
            vault.emit(VaultEvent::MetadataChanged {
                metadata: params.metadata.clone(),
            });
            for agent in &params.join_part_agents {
                vault.insert_agent(*agent)?;
            }

            tracing::info!(
                vault = %vault.identifier,
                owner = %params.owner,
                admin_fee = %params.admin_fee,
                protocol_fee = %quote.fee,
                agents = params.join_part_agents.len(),
                "vault initialized"
            );
            Ok(())
        })
    }

    /// Run `op` atomically: on error every change it made is undone.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotInitialized`] before [`initialize`](Self::initialize)
    /// - whatever `op` returns
    pub fn transact<T>(&mut self, op: impl FnOnce(&mut Vault) -> Result<T>) -> Result<T> {
        if !self.ledger.initialized {
            return Err(VaultError::NotInitialized);
        }
        self.atomically(op)
    }

    fn atomically<T>(&mut self, op: impl FnOnce(&mut Vault) -> Result<T>) -> Result<T> {
        self.begin();
        let result = op(self);
        match result {
            Ok(_) => self.commit(),
            Err(_) => self.rollback(),
        }
        result
    }

    fn begin(&mut self) {
        if let Some(journal) = self.journal.as_mut() {
            journal.depth += 1;
            return;
        }
        self.journal = Some(Journal {
            depth: 1,
            ledger: self.ledger.clone(),
            members: HashMap::new(),
            agents: None,
            installed_modules: self.modules.installed_len(),
            module_layout: None,
            module_originals: HashMap::new(),
            events_len: self.events.len(),
            next_sequence: self.next_sequence,
        });
    }

    fn commit(&mut self) {
        if let Some(journal) = self.journal.as_mut() {
            if journal.depth > 1 {
                journal.depth -= 1;
                return;
            }
        }
        self.journal = None;
    }

    fn rollback(&mut self) {
        if let Some(journal) = self.journal.as_mut() {
            if journal.depth > 1 {
                journal.depth -= 1;
                return;
            }
        }
        let Some(journal) = self.journal.take() else {
            return;
        };

        let touched = journal.members.len();
        for (address, original) in journal.members {
            match original {
                Some(record) => {
                    self.members.insert(address, record);
                }
                None => {
                    self.members.remove(&address);
                }
            }
        }
        if let Some(agents) = journal.agents {
            self.agents = agents;
        }
        self.modules.restore(
            journal.installed_modules,
            journal.module_originals,
            journal.module_layout,
        );
        self.ledger = journal.ledger;
        self.events.truncate(journal.events_len);
        self.next_sequence = journal.next_sequence;

        tracing::debug!(members = touched, "vault: transaction rolled back");
    }

    // ----- state access used by the operation modules -----

    /// Stored record, or the empty record for unknown addresses.
    pub(crate) fn record(&self, member: Address) -> MemberRecord {
        self.members.get(&member).copied().unwrap_or_default()
    }

    /// Write a member record, saving the original in the journal first.
    pub(crate) fn store_member(&mut self, member: Address, record: MemberRecord) {
        if let Some(journal) = self.journal.as_mut() {
            journal
                .members
                .entry(member)
                .or_insert_with(|| self.members.get(&member).copied());
        }
        self.members.insert(member, record);
    }

    /// Settled view of a record without writing it back.
    pub(crate) fn settled_record(&self, member: Address) -> Result<MemberRecord> {
        self.record(member)
            .settled(self.ledger.earnings_per_weight)
    }

    /// Settle a member and store the result. Unknown addresses stay unknown.
    pub(crate) fn settle_member(&mut self, member: Address) -> Result<MemberRecord> {
        let before = self.record(member);
        let record = before.settled(self.ledger.earnings_per_weight)?;
        if record.status != MemberStatus::None && record != before {
            tracing::debug!(
                member = %member,
                credited = %record.total_earnings.saturating_sub(before.total_earnings),
                "vault: member settled"
            );
            self.store_member(member, record);
        }
        Ok(record)
    }

    pub(crate) fn agent_set(&self) -> &BTreeSet<Address> {
        &self.agents
    }

    pub(crate) fn agents_mut(&mut self) -> &mut BTreeSet<Address> {
        if let Some(journal) = self.journal.as_mut() {
            if journal.agents.is_none() {
                journal.agents = Some(self.agents.clone());
            }
        }
        &mut self.agents
    }

    pub(crate) fn module_layout_mut(&mut self) -> &mut ModuleLayout {
        if let Some(journal) = self.journal.as_mut() {
            if journal.module_layout.is_none() {
                journal.module_layout = Some(self.modules.layout().clone());
            }
        }
        self.modules.layout_mut()
    }

    /// Mutable access to one module, saving its original on first touch.
    /// Modules installed by the running transaction need no original.
    pub(crate) fn journaled_module(&mut self, id: ModuleId) -> Result<&mut Box<dyn VaultModule>> {
        if let Some(journal) = self.journal.as_mut() {
            if (id.0 as usize) < journal.installed_modules
                && !journal.module_originals.contains_key(&id)
            {
                journal.module_originals.insert(id, self.modules.snapshot(id)?);
            }
        }
        self.modules.get_mut(id)
    }

    /// Append an event to the log.
    pub(crate) fn emit(&mut self, kind: VaultEvent) {
        let event = Event {
            sequence: self.next_sequence,
            timestamp: self.clock.now(),
            kind,
        };
        self.next_sequence += 1;
        self.events.push(event);
    }

    pub(crate) fn require_owner(&self, caller: Address, action: &'static str) -> Result<()> {
        if caller != self.ledger.owner {
            return Err(VaultError::NotAuthorized { caller, action });
        }
        Ok(())
    }

    pub(crate) fn require_agent(&self, caller: Address, action: &'static str) -> Result<()> {
        if !self.agents.contains(&caller) {
            return Err(VaultError::NotAuthorized { caller, action });
        }
        Ok(())
    }

    // ----- ownership and metadata -----

    /// Nominate `new_owner`. Takes effect when they call
    /// [`claim_ownership`](Self::claim_ownership).
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<()> {
        self.transact(|vault| {
            vault.require_owner(caller, "transfer ownership")?;
            vault.ledger.pending_owner = Some(new_owner);
            tracing::info!(owner = %caller, pending_owner = %new_owner, "vault: ownership transfer started");
            Ok(())
        })
    }

    /// Accept a pending ownership transfer.
    pub fn claim_ownership(&mut self, caller: Address) -> Result<()> {
        self.transact(|vault| {
            if vault.ledger.pending_owner != Some(caller) {
                return Err(VaultError::NotAuthorized {
                    caller,
                    action: "claim ownership",
                });
            }
            let previous_owner = vault.ledger.owner;
            vault.ledger.owner = caller;
            vault.ledger.pending_owner = None;
            vault.emit(VaultEvent::OwnershipTransferred {
                previous_owner,
                new_owner: caller,
            });
            tracing::info!(previous_owner = %previous_owner, new_owner = %caller, "vault: ownership transferred");
            Ok(())
        })
    }

    /// Replace the metadata string. Owner only.
    pub fn set_metadata(&mut self, caller: Address, metadata: impl Into<String>) -> Result<()> {
        let metadata = metadata.into();
        self.transact(|vault| {
            vault.require_owner(caller, "set metadata")?;
            vault.ledger.metadata = metadata.clone();
            vault.emit(VaultEvent::MetadataChanged { metadata });
            Ok(())
        })
    }

    // ----- queries -----

    /// Identifier bound into signed withdrawal payloads.
    pub fn identifier(&self) -> Address {
        self.identifier
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Whether [`initialize`](Self::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.ledger.initialized
    }

    pub fn owner(&self) -> Address {
        self.ledger.owner
    }

    pub fn pending_owner(&self) -> Option<Address> {
        self.ledger.pending_owner
    }

    pub fn metadata(&self) -> &str {
        &self.ledger.metadata
    }

    /// Current admin fee fraction.
    pub fn admin_fee(&self) -> Fraction {
        self.ledger.admin_fee
    }

    /// Last protocol fee quote seen from the fee oracle.
    pub fn protocol_fee_quote(&self) -> Option<FeeQuote> {
        self.ledger.fee_cache.map(|cache| cache.last())
    }

    /// Global earnings-per-weight accumulator.
    pub fn earnings_per_weight(&self) -> U256 {
        self.ledger.earnings_per_weight
    }

    /// Tokens the vault holds.
    pub fn held_balance(&self) -> Amount {
        self.ledger.held_balance
    }

    /// Tokens credited to members outside revenue distribution.
    pub fn total_transferred_in(&self) -> Amount {
        self.ledger.total_transferred_in
    }

    /// Snapshot of the global totals.
    pub fn stats(&self) -> VaultStats {
        VaultStats {
            total_revenue: self.ledger.total_revenue,
            total_earnings: self.ledger.total_earnings,
            total_admin_fees: self.ledger.total_admin_fees,
            total_protocol_fees: self.ledger.total_protocol_fees,
            total_withdrawn: self.ledger.total_withdrawn,
            active_member_count: self.ledger.active_member_count,
            inactive_member_count: self.ledger.inactive_member_count,
            lifetime_member_earnings: self.ledger.earnings_per_weight,
            join_part_agent_count: self.agents.len() as u64,
            total_weight: self.ledger.total_weight,
        }
    }

    /// All stored member records, unsettled.
    pub fn records(&self) -> impl Iterator<Item = (Address, MemberRecord)> + '_ {
        self.members.iter().map(|(address, record)| (*address, *record))
    }

    /// Events not yet drained.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drain the event log. Sequence numbers keep counting up.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
