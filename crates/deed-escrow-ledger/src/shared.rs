//! Thread-safe handle over an [`EscrowLedger`].
//!
//! Every operation runs to completion under one lock, so concurrent callers
//! observe the same serialized, all-or-nothing execution a single-threaded
//! ledger gives: a deposit racing a finalize either lands entirely before
//! it or is rejected after it.

use std::sync::{Arc, Mutex, MutexGuard};

use deed_escrow_registry::AssetRegistry;
use deed_escrow_types::{
    AssetId, EscrowError, ListingState, PartyAddress, Result, SettlementReceipt,
};
use rust_decimal::Decimal;

use crate::escrow::EscrowLedger;

/// Cloneable, `Send + Sync` (for `R: Send`) handle to a shared ledger.
pub struct SharedEscrow<R> {
    inner: Arc<Mutex<EscrowLedger<R>>>,
}

impl<R> Clone for SharedEscrow<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: AssetRegistry> SharedEscrow<R> {
    #[must_use]
    pub fn new(ledger: EscrowLedger<R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, EscrowLedger<R>>> {
        self.inner
            .lock()
            .map_err(|_| EscrowError::Internal("escrow ledger lock poisoned".into()))
    }

    /// Run `f` with exclusive access to the ledger.
    pub fn with<T>(&self, f: impl FnOnce(&mut EscrowLedger<R>) -> Result<T>) -> Result<T> {
        let mut ledger = self.lock()?;
        f(&mut ledger)
    }

    pub fn list(
        &self,
        caller: PartyAddress,
        asset_id: AssetId,
        buyer: PartyAddress,
        purchase_price: Decimal,
        escrow_amount: Decimal,
    ) -> Result<()> {
        self.lock()?
            .list(caller, asset_id, buyer, purchase_price, escrow_amount)
    }

    pub fn deposit_earnest(
        &self,
        caller: PartyAddress,
        asset_id: AssetId,
        amount: Decimal,
    ) -> Result<()> {
        self.lock()?.deposit_earnest(caller, asset_id, amount)
    }

    pub fn provide_financing(
        &self,
        caller: PartyAddress,
        asset_id: AssetId,
        amount: Decimal,
    ) -> Result<()> {
        self.lock()?.provide_financing(caller, asset_id, amount)
    }

    pub fn update_inspection_status(
        &self,
        caller: PartyAddress,
        asset_id: AssetId,
        passed: bool,
    ) -> Result<()> {
        self.lock()?
            .update_inspection_status(caller, asset_id, passed)
    }

    pub fn approve_sale(&self, caller: PartyAddress, asset_id: AssetId) -> Result<()> {
        self.lock()?.approve_sale(caller, asset_id)
    }

    pub fn revoke_approval(&self, caller: PartyAddress, asset_id: AssetId) -> Result<()> {
        self.lock()?.revoke_approval(caller, asset_id)
    }

    pub fn finalize_sale(
        &self,
        caller: PartyAddress,
        asset_id: AssetId,
    ) -> Result<SettlementReceipt> {
        self.lock()?.finalize_sale(caller, asset_id)
    }

    pub fn cancel_sale(&self, caller: PartyAddress, asset_id: AssetId) -> Result<SettlementReceipt> {
        self.lock()?.cancel_sale(caller, asset_id)
    }

    pub fn get_balance(&self) -> Result<Decimal> {
        Ok(self.lock()?.get_balance())
    }

    pub fn held_for(&self, asset_id: AssetId) -> Result<Decimal> {
        Ok(self.lock()?.held_for(asset_id))
    }

    pub fn state(&self, asset_id: AssetId) -> Result<Option<ListingState>> {
        Ok(self.lock()?.state(asset_id))
    }

    pub fn wallet_balance(&self, party: PartyAddress) -> Result<Decimal> {
        Ok(self.lock()?.wallet_balance(party))
    }
}
