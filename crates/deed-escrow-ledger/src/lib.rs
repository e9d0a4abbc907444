//! # deed-escrow-ledger
//!
//! **Escrow Ledger**: the neutral custodian that holds a deed and the funds
//! paid for it until buyer, seller and lender conditions are met.
//!
//! ## Architecture
//!
//! 1. **FundsLedger**: party wallets plus the custodian's held total
//! 2. **FundsConservation**: held == inflows − outflows, checked after every move
//! 3. **EscrowLedger**: listing state machine, role checks, settlement
//! 4. **SharedEscrow**: lock-serialized handle for concurrent callers
//!
//! ## Listing Flow
//!
//! ```text
//! seller: registry.approve(escrow) → list (custody moves to escrow)
//! buyer: deposit_earnest      lender: provide_financing
//! inspector: update_inspection_status
//! buyer, seller, lender: approve_sale
//! seller: finalize_sale → deed to buyer, price to seller, excess to buyer
//! seller | buyer: cancel_sale → deed to seller, deposit refunded or forfeited
//! ```

pub mod conservation;
pub mod escrow;
pub mod funds;
pub mod shared;

pub use conservation::FundsConservation;
pub use escrow::EscrowLedger;
pub use funds::FundsLedger;
pub use shared::SharedEscrow;
