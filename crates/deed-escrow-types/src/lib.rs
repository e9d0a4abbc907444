//! # deed-escrow-types
//!
//! Shared types, errors, and configuration for the **deed escrow** ledger.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`AssetId`], [`PartyAddress`], [`EventId`]
//! - **Listing model**: [`Listing`], [`ListingState`]
//! - **Event log**: [`EscrowEvent`], [`EscrowEventKind`]
//! - **Receipts**: [`SettlementReceipt`], [`SettlementSummary`], [`Payout`], [`ReceiptType`]
//! - **Configuration**: [`EscrowConfig`]
//! - **Errors**: [`EscrowError`] (`DE_ERR_` codes) and [`RegistryError`] (`RG_ERR_` codes)
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod listing;
pub mod receipt;

pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use listing::*;
pub use receipt::*;

// Constants are accessed via `deed_escrow_types::constants::FOO`.
