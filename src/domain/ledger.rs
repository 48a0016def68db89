//! Deposit/withdraw ledger replay for event-sourced vaults.
//!
//! Events are decoded into [`VaultEvent`] once at the reader boundary.
//! Replaying them yields each user's net position; only strictly
//! positive positions count towards the locked total, which keeps
//! bookkeeping drift (withdrawals of yield, missed deposits before the
//! start block) from dragging the total below zero.

use std::collections::HashMap;

use alloy::primitives::{Address, I256, U256};

/// Direction of a vault balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultEventKind {
    Deposit,
    Withdraw,
}

/// A decoded Deposit or Withdraw log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultEvent {
    /// Contract that emitted the log.
    pub emitter: Address,
    /// Depositor / withdrawer.
    pub user: Address,
    pub kind: VaultEventKind,
    /// Amount in the asset's smallest unit.
    pub amount: U256,
    pub block_number: u64,
    pub log_index: u64,
}

impl VaultEvent {
    /// Amount signed by direction, saturating at the `I256` bounds.
    pub fn signed_amount(&self) -> I256 {
        let magnitude = I256::try_from(self.amount).unwrap_or(I256::MAX);
        match self.kind {
            VaultEventKind::Deposit => magnitude,
            VaultEventKind::Withdraw => -magnitude,
        }
    }
}

/// Net signed amount per user, built by replaying events.
#[derive(Debug, Clone, Default)]
pub struct DepositWithdrawLedger {
    balances: HashMap<Address, I256>,
    events_applied: usize,
}

impl DepositWithdrawLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay a sequence of events into a fresh ledger.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a VaultEvent>) -> Self {
        let mut ledger = Self::new();
        for event in events {
            ledger.apply(event);
        }
        ledger
    }

    /// Apply one event to the user's running balance.
    pub fn apply(&mut self, event: &VaultEvent) {
        let entry = self.balances.entry(event.user).or_insert(I256::ZERO);
        *entry = entry.saturating_add(event.signed_amount());
        self.events_applied += 1;
    }

    /// Net balance for a user (zero if never seen).
    pub fn balance_of(&self, user: &Address) -> I256 {
        self.balances.get(user).copied().unwrap_or(I256::ZERO)
    }

    /// Users with a strictly positive net balance.
    pub fn positive_positions(&self) -> impl Iterator<Item = (&Address, &I256)> {
        self.balances.iter().filter(|(_, balance)| balance.is_positive())
    }

    /// Sum of strictly positive balances, in smallest units.
    pub fn locked_total(&self) -> U256 {
        self.positive_positions()
            .fold(U256::ZERO, |acc, (_, balance)| acc.saturating_add(balance.into_raw()))
    }

    pub fn events_applied(&self) -> usize {
        self.events_applied
    }

    /// Number of distinct users seen.
    pub fn users(&self) -> usize {
        self.balances.len()
    }
}
