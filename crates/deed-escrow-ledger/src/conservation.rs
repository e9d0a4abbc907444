//! Held-funds conservation checker.
//!
//! Invariant enforced after every fund movement:
//! ```text
//! held == Σ(inflows) - Σ(outflows)
//! ```
//!
//! Inflows are earnest deposits and lender financing; outflows are
//! settlement payouts. A mismatch means funds were created or destroyed
//! somewhere outside the two settlement paths.

use deed_escrow_types::{EscrowError, Result};
use rust_decimal::Decimal;

use crate::funds::checked_total;

/// Running totals of funds entering and leaving escrow.
#[derive(Debug, Clone, Default)]
pub struct FundsConservation {
    inflows: Decimal,
    outflows: Decimal,
}

impl FundsConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `AmountOverflow` if the running total would overflow.
    pub fn record_inflow(&mut self, amount: Decimal) -> Result<()> {
        self.inflows = checked_total(self.inflows, amount)?;
        Ok(())
    }

    /// # Errors
    /// Returns `AmountOverflow` if the running total would overflow.
    pub fn record_outflow(&mut self, amount: Decimal) -> Result<()> {
        self.outflows = checked_total(self.outflows, amount)?;
        Ok(())
    }

    /// Expected held balance: inflows − outflows.
    #[must_use]
    pub fn expected_held(&self) -> Decimal {
        self.inflows - self.outflows
    }

    /// Compare the actual held balance with the recorded totals.
    ///
    /// # Errors
    /// Returns [`EscrowError::FundsInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, actual_held: Decimal) -> Result<()> {
        let expected = self.expected_held();
        if actual_held != expected {
            return Err(EscrowError::FundsInvariantViolation {
                reason: format!(
                    "held {actual_held} != expected {expected} \
                     (inflows={}, outflows={})",
                    self.inflows, self.outflows
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn total_inflows(&self) -> Decimal {
        self.inflows
    }

    #[must_use]
    pub fn total_outflows(&self) -> Decimal {
        self.outflows
    }
}
