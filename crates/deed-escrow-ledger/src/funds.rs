//! Fund accounting for the escrow ledger.
//!
//! Tracks per-party wallet balances and the custodian's held total.
//! All mutations are atomic: either the full operation succeeds or the
//! balances are unchanged.

use std::collections::HashMap;

use deed_escrow_types::{EscrowError, PartyAddress, Result};
use rust_decimal::Decimal;

/// Party wallets plus the funds held in escrow.
///
/// Only [`escrow_in`](Self::escrow_in) increases the held total and only
/// [`release`](Self::release) decreases it.
#[derive(Debug, Clone, Default)]
pub struct FundsLedger {
    wallets: HashMap<PartyAddress, Decimal>,
    held: Decimal,
}

/// `total + amount`, or `AmountOverflow` if the sum is not representable.
pub(crate) fn checked_total(total: Decimal, amount: Decimal) -> Result<Decimal> {
    total
        .checked_add(amount)
        .ok_or(EscrowError::AmountOverflow { amount, total })
}

impl FundsLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add funds to a party's wallet.
    ///
    /// # Errors
    /// Returns `AmountOverflow` if the wallet balance would overflow.
    pub fn credit(&mut self, party: PartyAddress, amount: Decimal) -> Result<()> {
        let balance = checked_total(self.balance_of(party), amount)?;
        self.wallets.insert(party, balance);
        Ok(())
    }

    /// Remove funds from a party's wallet.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if the wallet holds less than `amount`.
    pub fn debit(&mut self, party: PartyAddress, amount: Decimal) -> Result<()> {
        let available = self.balance_of(party);
        if available < amount {
            return Err(EscrowError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        self.wallets.insert(party, available - amount);
        Ok(())
    }

    /// Move funds from a party's wallet into escrow.
    ///
    /// # Errors
    /// `AmountOverflow` if the held total would overflow, or
    /// `InsufficientFunds` from the wallet debit. Nothing changes on error.
    pub fn escrow_in(&mut self, from: PartyAddress, amount: Decimal) -> Result<()> {
        let held = checked_total(self.held, amount)?;
        self.debit(from, amount)?;
        self.held = held;
        Ok(())
    }

    /// Pay funds out of escrow to a party.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if escrow holds less than `amount`, or
    /// `AmountOverflow` if the recipient's wallet would overflow.
    pub fn release(&mut self, to: PartyAddress, amount: Decimal) -> Result<()> {
        if self.held < amount {
            return Err(EscrowError::InsufficientFunds {
                needed: amount,
                available: self.held,
            });
        }
        self.credit(to, amount)?;
        self.held -= amount;
        Ok(())
    }

    #[must_use]
    pub fn balance_of(&self, party: PartyAddress) -> Decimal {
        self.wallets.get(&party).copied().unwrap_or(Decimal::ZERO)
    }

    /// Funds currently held in escrow.
    #[must_use]
    pub fn held(&self) -> Decimal {
        self.held
    }
}
