//! # Listing: per-deed escrow state
//!
//! One listing per deed, keyed by [`AssetId`]. The price terms are fixed at
//! listing time; deposit, inspection and approval flags mutate freely until
//! the listing reaches a terminal state.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐  finalize   ┌───────────┐
//!   │ LISTED ├────────────▶│ FINALIZED │
//!   └───┬────┘             └───────────┘
//!       │ cancel
//!       ▼
//!   ┌───────────┐
//!   │ CANCELLED │
//!   └───────────┘
//! ```
//!
//! Deposits, inspection results and approvals are independent flags on a
//! `Listed` listing, set in any order and any number of times.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssetId, EscrowError, PartyAddress};

/// Lifecycle state of a listing.
///
/// Transitions are **monotonic**: only `Listed → Finalized` and
/// `Listed → Cancelled` exist, and both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingState {
    /// Accepting deposits, inspection results and approvals.
    Listed,
    /// Deed delivered to the buyer, price paid to the seller.
    Finalized,
    /// Deed returned to the seller, deposit refunded or forfeited.
    Cancelled,
}

impl ListingState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Listed, Self::Finalized | Self::Cancelled)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }
}

impl std::fmt::Display for ListingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listed => write!(f, "LISTED"),
            Self::Finalized => write!(f, "FINALIZED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Escrow terms and progress for a single deed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub asset_id: AssetId,
    /// The only party allowed to deposit earnest funds.
    pub buyer: PartyAddress,
    /// Total price; immutable after listing.
    pub purchase_price: Decimal,
    /// Minimum earnest deposit; `<= purchase_price`.
    pub escrow_amount: Decimal,
    /// Running total deposited by the buyer.
    pub deposited_amount: Decimal,
    /// Running total sent directly by the lender.
    pub financed_amount: Decimal,
    /// Last inspection outcome; `false` until the inspector says otherwise.
    pub inspection_passed: bool,
    /// Approval flag per party. Missing entries read as `false`.
    pub approvals: BTreeMap<PartyAddress, bool>,
    pub state: ListingState,
    pub listed_at: DateTime<Utc>,
    /// When the listing reached a terminal state.
    pub settled_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Create a new listing in the `Listed` state.
    ///
    /// # Errors
    /// Returns `InvalidTerms` unless `purchase_price > 0` and
    /// `0 <= escrow_amount <= purchase_price`.
    pub fn new(
        asset_id: AssetId,
        buyer: PartyAddress,
        purchase_price: Decimal,
        escrow_amount: Decimal,
    ) -> crate::Result<Self> {
        Self::check_terms(purchase_price, escrow_amount)?;
        Ok(Self {
            asset_id,
            buyer,
            purchase_price,
            escrow_amount,
            deposited_amount: Decimal::ZERO,
            financed_amount: Decimal::ZERO,
            inspection_passed: false,
            approvals: BTreeMap::new(),
            state: ListingState::Listed,
            listed_at: Utc::now(),
            settled_at: None,
        })
    }

    /// Validate listing amounts without building a listing.
    pub fn check_terms(purchase_price: Decimal, escrow_amount: Decimal) -> crate::Result<()> {
        if purchase_price <= Decimal::ZERO {
            return Err(EscrowError::InvalidTerms {
                reason: format!("purchase price {purchase_price} must be positive"),
            });
        }
        if escrow_amount.is_sign_negative() {
            return Err(EscrowError::InvalidTerms {
                reason: format!("escrow amount {escrow_amount} must not be negative"),
            });
        }
        if escrow_amount > purchase_price {
            return Err(EscrowError::InvalidTerms {
                reason: format!(
                    "escrow amount {escrow_amount} exceeds purchase price {purchase_price}"
                ),
            });
        }
        Ok(())
    }

    /// `true` while the listing accepts deposits, inspections and approvals.
    #[must_use]
    pub fn is_listed(&self) -> bool {
        self.state == ListingState::Listed
    }

    /// Funds held by the custodian on behalf of this listing.
    #[must_use]
    pub fn held_amount(&self) -> Decimal {
        self.deposited_amount + self.financed_amount
    }

    #[must_use]
    pub fn approval(&self, party: &PartyAddress) -> bool {
        self.approvals.get(party).copied().unwrap_or(false)
    }

    /// Attempt a terminal transition.
    ///
    /// # Errors
    /// Returns `AlreadySettled` if the listing is already terminal.
    pub fn settle(&mut self, target: ListingState) -> crate::Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(EscrowError::AlreadySettled(self.asset_id));
        }
        self.state = target;
        self.settled_at = Some(Utc::now());
        Ok(())
    }
}
