//! Transaction building for the crank service.
//!
//! Turns pending events into `ConsumeEvents` instructions, groups them into
//! transactions and attaches the compute budget.

use std::collections::{HashMap, HashSet};

use openbook_sdk::{ConsumeEventsBuilder, SdkError};
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;
use tracing::{debug, warn};

use crate::config::{ConfigError, CrankConfig};
use crate::detector::PendingEvents;
use crate::registry::MarketDescriptor;
use crate::submitter::PACKET_DATA_SIZE;

/// Batching and fee policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Event limit encoded into each instruction.
    pub consume_events_limit: u16,
    /// Depth above which a market is priority.
    pub priority_queue_limit: usize,
    /// Markets that are always priority.
    pub priority_markets: HashSet<Pubkey>,
    /// Compute unit price for ordinary batches.
    pub default_cu_price: u64,
    /// Compute unit price for priority batches.
    pub priority_cu_price: u64,
    /// Compute units budgeted per settlement instruction.
    pub cu_limit_per_instruction: u32,
    /// Settlement instructions per transaction.
    pub max_tx_instructions: usize,
    /// Queues shallower than this are skipped.
    pub min_events: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            consume_events_limit: 19,
            priority_queue_limit: 100,
            priority_markets: HashSet::new(),
            default_cu_price: 0,
            priority_cu_price: 100_000,
            cu_limit_per_instruction: 50_000,
            max_tx_instructions: 1,
            min_events: 0,
        }
    }
}

impl BatchPolicy {
    /// Builds the policy from the service configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the priority allow-list holds an invalid address.
    pub fn from_config(config: &CrankConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            consume_events_limit: config.consume_events_limit,
            priority_queue_limit: config.priority_queue_limit,
            priority_markets: config.parse_priority_markets()?,
            default_cu_price: config.default_cu_price,
            priority_cu_price: config.priority_cu_price,
            cu_limit_per_instruction: config.cu_limit,
            max_tx_instructions: config.max_tx_instructions,
            min_events: config.min_events,
        })
    }
}

/// One market's settlement instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementInstruction {
    /// Market address.
    pub market: Pubkey,
    /// Market display name.
    pub name: String,
    /// The `ConsumeEvents` instruction.
    pub instruction: Instruction,
    /// Whether the market qualifies for the priority price.
    pub priority: bool,
    /// Events pending in the queue.
    pub queue_depth: usize,
}

/// A group of settlement instructions sent in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBatch {
    /// Settlement instructions.
    pub instructions: Vec<SettlementInstruction>,
    /// Compute unit limit.
    pub cu_limit: u32,
    /// Compute unit price in micro-lamports.
    pub cu_price: u64,
}

impl TransactionBatch {
    /// Returns true if any member is priority.
    #[must_use]
    pub fn is_priority(&self) -> bool {
        self.instructions.iter().any(|ix| ix.priority)
    }

    /// Returns the markets settled by this batch.
    #[must_use]
    pub fn markets(&self) -> Vec<Pubkey> {
        self.instructions.iter().map(|ix| ix.market).collect()
    }

    /// Returns a short label for logs, e.g. `SOL/USDC,BTC/USDC`.
    #[must_use]
    pub fn label(&self) -> String {
        self.instructions
            .iter()
            .map(|ix| ix.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Returns the total number of pending events across the batch.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.instructions.iter().map(|ix| ix.queue_depth).sum()
    }

    /// Returns the full instruction list: compute budget first.
    ///
    /// The price instruction is omitted when the price is zero.
    #[must_use]
    pub fn to_instructions(&self) -> Vec<Instruction> {
        let mut instructions = Vec::with_capacity(self.instructions.len() + 2);
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(self.cu_limit));
        if self.cu_price > 0 {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
                self.cu_price,
            ));
        }
        instructions.extend(self.instructions.iter().map(|ix| ix.instruction.clone()));
        instructions
    }

    /// Returns the serialized size of the signed transaction paid by `payer`.
    #[must_use]
    pub fn wire_size(&self, payer: &Pubkey) -> usize {
        let message = Message::new(&self.to_instructions(), Some(payer));
        bincode::serialized_size(&Transaction::new_unsigned(message))
            .ok()
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(usize::MAX)
    }

    /// Signs the batch with `payer` against `blockhash`.
    #[must_use]
    pub fn sign(&self, payer: &Keypair, blockhash: Hash) -> Transaction {
        Transaction::new_signed_with_payer(
            &self.to_instructions(),
            Some(&payer.pubkey()),
            &[payer],
            blockhash,
        )
    }
}

/// Transaction builder for crank operations.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    /// DEX program id.
    program_id: Pubkey,
    /// Fee payer, needed to size transactions.
    payer: Pubkey,
    /// Batching and fee policy.
    policy: BatchPolicy,
}

impl TransactionBuilder {
    /// Creates a new transaction builder.
    #[must_use]
    pub fn new(program_id: Pubkey, payer: Pubkey, policy: BatchPolicy) -> Self {
        Self {
            program_id,
            payer,
            policy,
        }
    }

    /// Returns the program id.
    #[must_use]
    pub const fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Returns true if a market with `depth` pending events is priority.
    #[must_use]
    pub fn is_priority(&self, market: &Pubkey, depth: usize) -> bool {
        depth > self.policy.priority_queue_limit || self.policy.priority_markets.contains(market)
    }

    /// Compute unit limit requested by every transaction.
    #[must_use]
    pub fn compute_unit_limit(&self) -> u32 {
        let instructions = u32::try_from(self.policy.max_tx_instructions).unwrap_or(u32::MAX);
        self.policy.cu_limit_per_instruction.saturating_mul(instructions)
    }

    /// Compute unit price for a batch.
    #[must_use]
    pub const fn compute_unit_price(&self, priority: bool) -> u64 {
        if priority {
            self.policy.priority_cu_price
        } else {
            self.policy.default_cu_price
        }
    }

    /// Builds the settlement instruction for one market.
    ///
    /// Returns `None` for empty queues and queues below the minimum depth.
    ///
    /// # Errors
    ///
    /// Returns an error if the instruction cannot be encoded.
    pub fn build_instruction(
        &self,
        market: &MarketDescriptor,
        pending: &PendingEvents,
    ) -> Result<Option<SettlementInstruction>, SdkError> {
        if pending.is_empty() {
            return Ok(None);
        }

        if pending.event_count < self.policy.min_events {
            debug!(
                market = %market.name,
                events = pending.event_count,
                min_events = self.policy.min_events,
                "Skipping market below minimum queue depth"
            );
            return Ok(None);
        }

        let instruction = ConsumeEventsBuilder::new(self.program_id)
            .market(market.address)
            .event_queue(market.event_queue)
            .fee_accounts(market.event_queue, market.event_queue)
            .open_orders(pending.open_orders.clone())
            .limit(self.policy.consume_events_limit)
            .build()?;

        Ok(Some(SettlementInstruction {
            market: market.address,
            name: market.name.clone(),
            instruction,
            priority: self.is_priority(&market.address, pending.event_count),
            queue_depth: pending.event_count,
        }))
    }

    /// Builds settlement instructions for every market with pending events.
    ///
    /// Markets whose instruction fails to encode are logged and skipped.
    #[must_use]
    pub fn build_instructions(
        &self,
        markets: &[MarketDescriptor],
        pending: &[PendingEvents],
    ) -> Vec<SettlementInstruction> {
        let by_address: HashMap<Pubkey, &MarketDescriptor> =
            markets.iter().map(|m| (m.address, m)).collect();

        pending
            .iter()
            .filter_map(|p| {
                let market = by_address.get(&p.market)?;
                match self.build_instruction(market, p) {
                    Ok(ix) => ix,
                    Err(e) => {
                        warn!(market = %market.name, error = %e, "Failed to build instruction");
                        None
                    }
                }
            })
            .collect()
    }

    /// Groups instructions into transactions, preserving order.
    ///
    /// A transaction holds at most `max_tx_instructions` settlement
    /// instructions and is closed early when one more would push it past
    /// [`PACKET_DATA_SIZE`]. A single instruction that is too large on its own
    /// still gets its own batch.
    #[must_use]
    pub fn batch(&self, instructions: Vec<SettlementInstruction>) -> Vec<TransactionBatch> {
        let ceiling = self.policy.max_tx_instructions.max(1);

        let mut batches = Vec::new();
        let mut current = self.open_batch();
        for ix in instructions {
            if !current.instructions.is_empty() {
                let full = current.instructions.len() >= ceiling;
                if full || !self.fits_with(&current, &ix) {
                    batches.push(std::mem::replace(&mut current, self.open_batch()));
                }
            }
            current.cu_price = self.compute_unit_price(current.is_priority() || ix.priority);
            current.instructions.push(ix);
        }
        if !current.instructions.is_empty() {
            batches.push(current);
        }

        batches
    }

    fn open_batch(&self) -> TransactionBatch {
        TransactionBatch {
            instructions: Vec::new(),
            cu_limit: self.compute_unit_limit(),
            cu_price: self.compute_unit_price(false),
        }
    }

    fn fits_with(&self, batch: &TransactionBatch, ix: &SettlementInstruction) -> bool {
        let mut candidate = batch.clone();
        candidate.cu_price = self.compute_unit_price(batch.is_priority() || ix.priority);
        candidate.instructions.push(ix.clone());
        candidate.wire_size(&self.payer) <= PACKET_DATA_SIZE
    }
}
