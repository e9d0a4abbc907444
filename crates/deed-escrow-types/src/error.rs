//! Error types for the deed escrow ledger and its asset registry.
//!
//! Ledger errors use the `DE_ERR_` prefix, registry errors `RG_ERR_`, so
//! both are easy to grep in logs. Ledger codes are grouped by subsystem:
//! - 1xx: Authorization errors
//! - 2xx: Listing errors
//! - 3xx: Funds errors
//! - 4xx: Settlement errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AssetId, PartyAddress};

/// Errors raised by an asset registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No deed with this identifier has been minted.
    #[error("RG_ERR_100: Asset not found: {0}")]
    AssetNotFound(AssetId),

    /// `from` is not the current owner of the deed.
    #[error("RG_ERR_101: {from} is not the owner of {asset_id}")]
    NotOwner { asset_id: AssetId, from: PartyAddress },

    /// The caller is neither owner, approved delegate, nor operator.
    #[error("RG_ERR_102: {caller} is not authorized to move {asset_id}")]
    NotAuthorized {
        asset_id: AssetId,
        caller: PartyAddress,
    },

    /// Transfers and approvals to the zero address are rejected.
    #[error("RG_ERR_103: Invalid recipient: zero address")]
    InvalidRecipient,
}

/// Central error enum for all escrow ledger operations.
#[derive(Debug, Error)]
pub enum EscrowError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// The caller lacks the role required for the operation.
    #[error("DE_ERR_100: Unauthorized: {caller} may not {operation}")]
    Unauthorized {
        caller: PartyAddress,
        operation: &'static str,
    },

    // =================================================================
    // Listing Errors (2xx)
    // =================================================================
    /// Listing amounts violate `0 <= escrow_amount <= purchase_price`, `purchase_price > 0`.
    #[error("DE_ERR_200: Invalid listing terms: {reason}")]
    InvalidTerms { reason: String },

    /// The registry does not confirm seller ownership and delegation.
    #[error("DE_ERR_201: Asset {asset_id} not owned by seller: {reason}")]
    AssetNotOwnedBySeller { asset_id: AssetId, reason: String },

    /// No listing exists for this asset.
    #[error("DE_ERR_202: Listing not found: {0}")]
    ListingNotFound(AssetId),

    /// The asset already has a pending listing.
    #[error("DE_ERR_203: Asset already listed: {0}")]
    AlreadyListed(AssetId),

    /// The listing was finalized or cancelled.
    #[error("DE_ERR_204: Listing already settled: {0}")]
    AlreadySettled(AssetId),

    // =================================================================
    // Funds Errors (3xx)
    // =================================================================
    /// Not enough funds to perform the operation.
    #[error("DE_ERR_300: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    /// Amounts entering the ledger must be strictly positive.
    #[error("DE_ERR_301: Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Adding `amount` would leave the representable decimal range.
    #[error("DE_ERR_303: Amount overflow: cannot add {amount} to {total}")]
    AmountOverflow { amount: Decimal, total: Decimal },

    /// Held funds no longer match recorded inflows and outflows.
    #[error("DE_ERR_302: Funds invariant violation: {reason}")]
    FundsInvariantViolation { reason: String },

    // =================================================================
    // Settlement Errors (4xx)
    // =================================================================
    /// One or more finalize preconditions are unsatisfied.
    #[error("DE_ERR_400: Conditions not met for {asset_id}: {reason}")]
    ConditionsNotMet { asset_id: AssetId, reason: String },

    /// The asset registry rejected a custody transfer.
    #[error("DE_ERR_401: Registry rejected transfer: {0}")]
    Registry(#[from] RegistryError),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("DE_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("DE_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (malformed file, conflicting roles, etc.).
    #[error("DE_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, EscrowError>;

impl From<serde_json::Error> for EscrowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
