//! Escrow event log entries.
//!
//! Every successful state change on the ledger appends one [`EscrowEvent`].
//! The log is observational: nothing in the ledger reads it back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssetId, EventId, PartyAddress};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowEventKind {
    Listed {
        buyer: PartyAddress,
        purchase_price: Decimal,
        escrow_amount: Decimal,
    },
    EarnestDeposited {
        buyer: PartyAddress,
        amount: Decimal,
        total: Decimal,
    },
    FinancingReceived {
        lender: PartyAddress,
        amount: Decimal,
        total: Decimal,
    },
    InspectionUpdated {
        passed: bool,
    },
    SaleApproved {
        party: PartyAddress,
    },
    ApprovalRevoked {
        party: PartyAddress,
    },
    SaleFinalized {
        buyer: PartyAddress,
        seller_proceeds: Decimal,
        buyer_refund: Decimal,
        lender_refund: Decimal,
    },
    SaleCancelled {
        /// Who received the earnest deposit (buyer on refund, seller on forfeit).
        deposit_recipient: PartyAddress,
        deposit: Decimal,
        financing_returned: Decimal,
    },
}

impl EscrowEventKind {
    /// Short tag for log fields.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Listed { .. } => "LISTED",
            Self::EarnestDeposited { .. } => "EARNEST_DEPOSITED",
            Self::FinancingReceived { .. } => "FINANCING_RECEIVED",
            Self::InspectionUpdated { .. } => "INSPECTION_UPDATED",
            Self::SaleApproved { .. } => "SALE_APPROVED",
            Self::ApprovalRevoked { .. } => "APPROVAL_REVOKED",
            Self::SaleFinalized { .. } => "SALE_FINALIZED",
            Self::SaleCancelled { .. } => "SALE_CANCELLED",
        }
    }
}

/// A single event log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowEvent {
    pub id: EventId,
    pub asset_id: AssetId,
    /// The party whose call produced the event.
    pub caller: PartyAddress,
    pub kind: EscrowEventKind,
    pub recorded_at: DateTime<Utc>,
}

impl EscrowEvent {
    #[must_use]
    pub fn new(asset_id: AssetId, caller: PartyAddress, kind: EscrowEventKind) -> Self {
        Self {
            id: EventId::new(),
            asset_id,
            caller,
            kind,
            recorded_at: Utc::now(),
        }
    }
}
