//! The Escrow Ledger: custody, funds, gating and settlement for listed deeds.
//!
//! Every mutating operation follows the same discipline:
//! 1. Validate caller role and every precondition against current state
//! 2. Stage fund movements on a copy of the [`FundsLedger`]
//! 3. Perform the single fallible external step (the registry transfer)
//! 4. Commit the staged funds and the listing update
//!
//! A failure at any step before commit leaves the ledger untouched.

use std::collections::{BTreeMap, VecDeque};

use deed_escrow_registry::AssetRegistry;
use deed_escrow_types::{
    AssetId, EscrowConfig, EscrowError, EscrowEvent, EscrowEventKind, Listing, ListingState,
    PartyAddress, Payout, ReceiptType, Result, SettlementReceipt, SettlementSummary, constants,
};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rust_decimal::Decimal;

use crate::conservation::FundsConservation;
use crate::funds::{FundsLedger, checked_total};

/// Stateful escrow authority over listed deeds and the funds paid for them.
///
/// Roles come from the immutable [`EscrowConfig`]; the buyer is recorded per
/// listing. The ledger owns its registry handle `R` and calls into it only
/// to take, deliver, or return custody.
pub struct EscrowLedger<R> {
    config: EscrowConfig,
    registry: R,
    funds: FundsLedger,
    conservation: FundsConservation,
    listings: BTreeMap<AssetId, Listing>,
    events: VecDeque<EscrowEvent>,
    receipts: Vec<SettlementReceipt>,
    signing_key: SigningKey,
}

impl<R: AssetRegistry> EscrowLedger<R> {
    /// Build a ledger over `registry`. Receipts are signed with `signing_key`.
    ///
    /// # Errors
    /// Returns `Configuration` if the role configuration is invalid.
    pub fn new(config: EscrowConfig, registry: R, signing_key: SigningKey) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            escrow = %config.escrow,
            seller = %config.seller,
            lender = %config.lender,
            inspector = %config.inspector,
            "Escrow ledger initialized"
        );
        Ok(Self {
            config,
            registry,
            funds: FundsLedger::new(),
            conservation: FundsConservation::new(),
            listings: BTreeMap::new(),
            events: VecDeque::new(),
            receipts: Vec::new(),
            signing_key,
        })
    }

    // =================================================================
    // Listing
    // =================================================================

    /// List a deed for sale to `buyer` and take custody of it.
    ///
    /// The seller must own the deed and have delegated transfer authority to
    /// the custodian beforehand.
    ///
    /// # Errors
    /// - `Unauthorized` if `caller` is not the seller
    /// - `AlreadyListed` / `AlreadySettled` if the deed has a listing
    /// - `InvalidTerms` if the amounts are inconsistent, or `buyer` is zero or
    ///   holds one of the configured roles
    /// - `AssetNotOwnedBySeller` if ownership or delegation is not confirmed
    pub fn list(
        &mut self,
        caller: PartyAddress,
        asset_id: AssetId,
        buyer: PartyAddress,
        purchase_price: Decimal,
        escrow_amount: Decimal,
    ) -> Result<()> {
        Self::require(caller, self.config.seller, "list a deed")?;

        if let Some(existing) = self.listings.get(&asset_id) {
            return Err(if existing.state.is_terminal() {
                EscrowError::AlreadySettled(asset_id)
            } else {
                EscrowError::AlreadyListed(asset_id)
            });
        }

        let listing = Listing::new(asset_id, buyer, purchase_price, escrow_amount)?;
        let roles = [
            self.config.seller,
            self.config.lender,
            self.config.inspector,
            self.config.escrow,
        ];
        if buyer.is_zero() || roles.contains(&buyer) {
            return Err(EscrowError::InvalidTerms {
                reason: format!("{buyer} cannot be the buyer"),
            });
        }

        let seller = self.config.seller;
        let escrow = self.config.escrow;
        match self.registry.owner_of(asset_id) {
            Some(owner) if owner == seller => {}
            Some(owner) => {
                return Err(EscrowError::AssetNotOwnedBySeller {
                    asset_id,
                    reason: format!("owned by {owner}"),
                });
            }
            None => {
                return Err(EscrowError::AssetNotOwnedBySeller {
                    asset_id,
                    reason: "not minted".into(),
                });
            }
        }
        if !self.registry.is_authorized(escrow, asset_id) {
            return Err(EscrowError::AssetNotOwnedBySeller {
                asset_id,
                reason: format!("transfer authority not delegated to {escrow}"),
            });
        }

        self.registry.transfer_from(escrow, seller, escrow, asset_id)?;

        tracing::info!(
            asset = %asset_id,
            buyer = %buyer,
            price = %purchase_price,
            escrow_amount = %escrow_amount,
            "Deed listed"
        );
        self.listings.insert(asset_id, listing);
        self.record(
            asset_id,
            caller,
            EscrowEventKind::Listed {
                buyer,
                purchase_price,
                escrow_amount,
            },
        );
        Ok(())
    }

    // =================================================================
    // Funds in
    // =================================================================

    /// Buyer pays earnest funds into escrow for a listing.
    ///
    /// The cumulative deposit must reach the listing's `escrow_amount`;
    /// anything above it is accepted.
    ///
    /// # Errors
    /// - `ListingNotFound` / `AlreadySettled`
    /// - `Unauthorized` if `caller` is not the listing's buyer
    /// - `InvalidAmount` if `amount` is not positive
    /// - `InsufficientFunds` if the earnest checkpoint is not reached or the
    ///   buyer's wallet cannot cover `amount`
    /// - `AmountOverflow` if a running total would leave the decimal range
    pub fn deposit_earnest(
        &mut self,
        caller: PartyAddress,
        asset_id: AssetId,
        amount: Decimal,
    ) -> Result<()> {
        let listing = self.open_listing(asset_id)?;
        Self::require(caller, listing.buyer, "deposit earnest funds")?;
        Self::require_positive(amount)?;

        let total = checked_total(listing.deposited_amount, amount)?;
        if total < listing.escrow_amount {
            return Err(EscrowError::InsufficientFunds {
                needed: listing.escrow_amount - listing.deposited_amount,
                available: amount,
            });
        }

        self.take_in(caller, amount)?;
        self.open_listing_mut(asset_id)?.deposited_amount = total;

        tracing::debug!(
            asset = %asset_id,
            buyer = %caller.short(),
            amount = %amount,
            total = %total,
            "Earnest deposited"
        );
        self.record(
            asset_id,
            caller,
            EscrowEventKind::EarnestDeposited {
                buyer: caller,
                amount,
                total,
            },
        );
        self.audit();
        Ok(())
    }

    /// Lender sends financing directly into escrow for a listing.
    ///
    /// # Errors
    /// - `ListingNotFound` / `AlreadySettled`
    /// - `Unauthorized` if `caller` is not the lender
    /// - `InvalidAmount` if `amount` is not positive
    /// - `InsufficientFunds` if the lender's wallet cannot cover `amount`
    /// - `AmountOverflow` if a running total would leave the decimal range
    pub fn provide_financing(
        &mut self,
        caller: PartyAddress,
        asset_id: AssetId,
        amount: Decimal,
    ) -> Result<()> {
        let listing = self.open_listing(asset_id)?;
        Self::require(caller, self.config.lender, "provide financing")?;
        Self::require_positive(amount)?;
        let total = checked_total(listing.financed_amount, amount)?;

        self.take_in(caller, amount)?;
        self.open_listing_mut(asset_id)?.financed_amount = total;

        tracing::debug!(
            asset = %asset_id,
            lender = %caller.short(),
            amount = %amount,
            total = %total,
            "Financing received"
        );
        self.record(
            asset_id,
            caller,
            EscrowEventKind::FinancingReceived {
                lender: caller,
                amount,
                total,
            },
        );
        self.audit();
        Ok(())
    }

    // =================================================================
    // Gates
    // =================================================================

    /// Record the inspection outcome. The last call wins.
    ///
    /// # Errors
    /// `ListingNotFound`, `AlreadySettled`, or `Unauthorized` for anyone but
    /// the inspector.
    pub fn update_inspection_status(
        &mut self,
        caller: PartyAddress,
        asset_id: AssetId,
        passed: bool,
    ) -> Result<()> {
        self.open_listing(asset_id)?;
        Self::require(caller, self.config.inspector, "record inspection")?;

        self.open_listing_mut(asset_id)?.inspection_passed = passed;
        tracing::debug!(asset = %asset_id, passed, "Inspection updated");
        self.record(
            asset_id,
            caller,
            EscrowEventKind::InspectionUpdated { passed },
        );
        Ok(())
    }

    /// Record the caller's approval. Repeated approvals are no-ops.
    ///
    /// # Errors
    /// `ListingNotFound`, `AlreadySettled`, or `Unauthorized` unless the
    /// caller is the listing's buyer, the seller, or the lender.
    pub fn approve_sale(&mut self, caller: PartyAddress, asset_id: AssetId) -> Result<()> {
        self.require_approver(caller, asset_id, "approve the sale")?;

        let listing = self.open_listing_mut(asset_id)?;
        if listing.approval(&caller) {
            return Ok(());
        }
        listing.approvals.insert(caller, true);

        tracing::debug!(asset = %asset_id, party = %caller.short(), "Sale approved");
        self.record(asset_id, caller, EscrowEventKind::SaleApproved { party: caller });
        Ok(())
    }

    /// Withdraw the caller's approval. A no-op if it was never given.
    ///
    /// # Errors
    /// Same as [`approve_sale`](Self::approve_sale).
    pub fn revoke_approval(&mut self, caller: PartyAddress, asset_id: AssetId) -> Result<()> {
        self.require_approver(caller, asset_id, "revoke approval")?;

        let listing = self.open_listing_mut(asset_id)?;
        if !listing.approval(&caller) {
            return Ok(());
        }
        listing.approvals.remove(&caller);

        tracing::debug!(asset = %asset_id, party = %caller.short(), "Approval revoked");
        self.record(
            asset_id,
            caller,
            EscrowEventKind::ApprovalRevoked { party: caller },
        );
        Ok(())
    }

    // =================================================================
    // Settlement
    // =================================================================

    /// Deliver the deed to the buyer and pay the seller.
    ///
    /// Requires a passed inspection, approval from buyer, seller and lender,
    /// held funds of at least the purchase price, and the deed still in the
    /// custodian's hands. The seller receives exactly the purchase price,
    /// paid from earnest funds first and financing second. Whatever is left
    /// goes back to whoever put it in.
    ///
    /// # Errors
    /// - `ListingNotFound` / `AlreadySettled`
    /// - `Unauthorized` if `caller` is not the seller
    /// - `ConditionsNotMet` listing every unmet precondition
    /// - `Registry` if the registry refuses the delivery; nothing changes
    pub fn finalize_sale(
        &mut self,
        caller: PartyAddress,
        asset_id: AssetId,
    ) -> Result<SettlementReceipt> {
        let listing = self.open_listing(asset_id)?;
        Self::require(caller, self.config.seller, "finalize the sale")?;

        let unmet = self.unmet_conditions(listing);
        if !unmet.is_empty() {
            let reason = unmet.join("; ");
            tracing::warn!(asset = %asset_id, reason = %reason, "Finalize rejected");
            return Err(EscrowError::ConditionsNotMet { asset_id, reason });
        }

        let buyer = listing.buyer;
        let price = listing.purchase_price;
        // Earnest pays first; financing covers the remainder.
        let earnest_used = listing.deposited_amount.min(price);
        let buyer_refund = listing.deposited_amount - earnest_used;
        let lender_refund = listing.financed_amount - (price - earnest_used);

        let mut payouts = vec![Payout {
            to: self.config.seller,
            amount: price,
        }];
        if buyer_refund > Decimal::ZERO {
            payouts.push(Payout {
                to: buyer,
                amount: buyer_refund,
            });
        }
        if lender_refund > Decimal::ZERO {
            payouts.push(Payout {
                to: self.config.lender,
                amount: lender_refund,
            });
        }
        let summary = SettlementSummary {
            asset_id,
            receipt_type: ReceiptType::SaleFinalized,
            deed_recipient: buyer,
            payouts,
        };

        let escrow = self.config.escrow;
        let receipt = self.settle(&summary, ListingState::Finalized, |registry| {
            registry.transfer_from(escrow, escrow, buyer, asset_id)
        })?;

        tracing::info!(
            asset = %asset_id,
            buyer = %buyer,
            seller_proceeds = %price,
            buyer_refund = %buyer_refund,
            lender_refund = %lender_refund,
            receipt_hash = hex::encode(receipt.payload_hash),
            "Sale finalized"
        );
        self.record(
            asset_id,
            caller,
            EscrowEventKind::SaleFinalized {
                buyer,
                seller_proceeds: price,
                buyer_refund,
                lender_refund,
            },
        );
        Ok(receipt)
    }

    /// Abort the sale: return custody to the seller and disburse held funds.
    ///
    /// The earnest deposit is refunded to the buyer if the inspection has not
    /// passed, and forfeited to the seller if it has. Lender financing always
    /// returns to the lender.
    ///
    /// # Errors
    /// - `ListingNotFound` / `AlreadySettled`
    /// - `Unauthorized` unless `caller` is the seller or the listing's buyer
    /// - `Registry` if the registry refuses to return the deed; nothing changes
    pub fn cancel_sale(
        &mut self,
        caller: PartyAddress,
        asset_id: AssetId,
    ) -> Result<SettlementReceipt> {
        let listing = self.open_listing(asset_id)?;
        if caller != self.config.seller && caller != listing.buyer {
            return Err(EscrowError::Unauthorized {
                caller,
                operation: "cancel the sale",
            });
        }

        let seller = self.config.seller;
        let lender = self.config.lender;
        let escrow = self.config.escrow;
        let deposit = listing.deposited_amount;
        let financing = listing.financed_amount;
        let deposit_recipient = if listing.inspection_passed {
            seller
        } else {
            listing.buyer
        };

        let mut payouts = Vec::new();
        if deposit > Decimal::ZERO {
            payouts.push(Payout {
                to: deposit_recipient,
                amount: deposit,
            });
        }
        if financing > Decimal::ZERO {
            payouts.push(Payout {
                to: lender,
                amount: financing,
            });
        }

        let current_owner = self.registry.owner_of(asset_id);
        let return_deed = current_owner == Some(escrow);
        let summary = SettlementSummary {
            asset_id,
            receipt_type: ReceiptType::SaleCancelled,
            deed_recipient: if return_deed {
                seller
            } else {
                current_owner.unwrap_or(seller)
            },
            payouts,
        };

        let receipt = self.settle(&summary, ListingState::Cancelled, |registry| {
            if return_deed {
                registry.transfer_from(escrow, escrow, seller, asset_id)
            } else {
                Ok(())
            }
        })?;

        tracing::info!(
            asset = %asset_id,
            deposit_recipient = %deposit_recipient,
            deposit = %deposit,
            financing_returned = %financing,
            deed_returned = return_deed,
            receipt_hash = hex::encode(receipt.payload_hash),
            "Sale cancelled"
        );
        self.record(
            asset_id,
            caller,
            EscrowEventKind::SaleCancelled {
                deposit_recipient,
                deposit,
                financing_returned: financing,
            },
        );
        Ok(receipt)
    }

    /// Shared terminal path for finalize and cancel.
    ///
    /// Stages the payouts, the outflow and the closed listing, signs the
    /// receipt, runs `custody` against the registry, and only then commits.
    /// Nothing after the registry call can fail.
    fn settle<F>(
        &mut self,
        summary: &SettlementSummary,
        target: ListingState,
        custody: F,
    ) -> Result<SettlementReceipt>
    where
        F: FnOnce(&mut R) -> std::result::Result<(), deed_escrow_types::RegistryError>,
    {
        let mut funds = self.funds.clone();
        for payout in &summary.payouts {
            funds.release(payout.to, payout.amount)?;
        }
        let mut flows = self.conservation.clone();
        flows.record_outflow(summary.total_paid())?;
        let mut closed = self.open_listing(summary.asset_id)?.clone();
        closed.deposited_amount = Decimal::ZERO;
        closed.financed_amount = Decimal::ZERO;
        closed.settle(target)?;
        let receipt = SettlementReceipt::issue(summary, &self.signing_key)?;

        custody(&mut self.registry)?;

        self.funds = funds;
        self.conservation = flows;
        self.listings.insert(summary.asset_id, closed);
        self.receipts.push(receipt.clone());
        tracing::debug!(asset = %summary.asset_id, state = %target, "Listing closed");
        self.audit();
        Ok(receipt)
    }

    fn unmet_conditions(&self, listing: &Listing) -> Vec<String> {
        let mut unmet = Vec::new();
        if !listing.inspection_passed {
            unmet.push("inspection not passed".to_string());
        }
        let approvers = [
            ("buyer", listing.buyer),
            ("seller", self.config.seller),
            ("lender", self.config.lender),
        ];
        for (role, party) in approvers {
            if !listing.approval(&party) {
                unmet.push(format!("{role} has not approved"));
            }
        }
        let held = listing.held_amount();
        if held < listing.purchase_price {
            unmet.push(format!(
                "held {held} below purchase price {}",
                listing.purchase_price
            ));
        }
        if self.registry.owner_of(listing.asset_id) != Some(self.config.escrow) {
            unmet.push("deed no longer in escrow custody".to_string());
        }
        unmet
    }

    // =================================================================
    // Queries
    // =================================================================

    /// `true` while the deed has a non-terminal listing.
    #[must_use]
    pub fn is_listed(&self, asset_id: AssetId) -> bool {
        self.listings.get(&asset_id).is_some_and(Listing::is_listed)
    }

    #[must_use]
    pub fn buyer(&self, asset_id: AssetId) -> Option<PartyAddress> {
        self.listings.get(&asset_id).map(|l| l.buyer)
    }

    #[must_use]
    pub fn purchase_price(&self, asset_id: AssetId) -> Option<Decimal> {
        self.listings.get(&asset_id).map(|l| l.purchase_price)
    }

    #[must_use]
    pub fn escrow_amount(&self, asset_id: AssetId) -> Option<Decimal> {
        self.listings.get(&asset_id).map(|l| l.escrow_amount)
    }

    #[must_use]
    pub fn inspection_passed(&self, asset_id: AssetId) -> bool {
        self.listings
            .get(&asset_id)
            .is_some_and(|l| l.inspection_passed)
    }

    #[must_use]
    pub fn approval(&self, asset_id: AssetId, party: PartyAddress) -> bool {
        self.listings
            .get(&asset_id)
            .is_some_and(|l| l.approval(&party))
    }

    /// Total funds held in escrow across all listings.
    #[must_use]
    pub fn get_balance(&self) -> Decimal {
        self.funds.held()
    }

    /// Funds held for one listing.
    #[must_use]
    pub fn held_for(&self, asset_id: AssetId) -> Decimal {
        self.listings
            .get(&asset_id)
            .map_or(Decimal::ZERO, Listing::held_amount)
    }

    #[must_use]
    pub fn listing(&self, asset_id: AssetId) -> Option<&Listing> {
        self.listings.get(&asset_id)
    }

    #[must_use]
    pub fn state(&self, asset_id: AssetId) -> Option<ListingState> {
        self.listings.get(&asset_id).map(|l| l.state)
    }

    /// Address of the registry instance deeds live in.
    #[must_use]
    pub fn nft_address(&self) -> PartyAddress {
        self.config.registry
    }

    #[must_use]
    pub fn seller(&self) -> PartyAddress {
        self.config.seller
    }

    #[must_use]
    pub fn lender(&self) -> PartyAddress {
        self.config.lender
    }

    #[must_use]
    pub fn inspector(&self) -> PartyAddress {
        self.config.inspector
    }

    #[must_use]
    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Event log, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &EscrowEvent> {
        self.events.iter()
    }

    #[must_use]
    pub fn receipts(&self) -> &[SettlementReceipt] {
        &self.receipts
    }

    /// Key that verifies this ledger's receipts.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    #[must_use]
    pub fn wallet_balance(&self, party: PartyAddress) -> Decimal {
        self.funds.balance_of(party)
    }

    #[must_use]
    pub fn funds(&self) -> &FundsLedger {
        &self.funds
    }

    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Direct access to the registry, for calls parties make on their own
    /// behalf (minting, approving the custodian).
    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    /// Credit a party's wallet with funds from outside the ledger.
    ///
    /// # Errors
    /// `InvalidAmount` unless `amount` is positive, `AmountOverflow` if the
    /// wallet would overflow.
    pub fn credit_wallet(&mut self, party: PartyAddress, amount: Decimal) -> Result<()> {
        Self::require_positive(amount)?;
        self.funds.credit(party, amount)
    }

    /// Verify held funds against recorded flows and against the sum of
    /// open listings.
    ///
    /// # Errors
    /// Returns `FundsInvariantViolation` on any mismatch.
    pub fn check_invariants(&self) -> Result<()> {
        let held = self.funds.held();
        self.conservation.verify(held)?;
        let attributed: Decimal = self
            .listings
            .values()
            .filter(|l| l.is_listed())
            .map(Listing::held_amount)
            .sum();
        if attributed != held {
            return Err(EscrowError::FundsInvariantViolation {
                reason: format!("held {held} != sum of open listings {attributed}"),
            });
        }
        Ok(())
    }

    // =================================================================
    // Helpers
    // =================================================================

    fn require(
        caller: PartyAddress,
        expected: PartyAddress,
        operation: &'static str,
    ) -> Result<()> {
        if caller == expected {
            Ok(())
        } else {
            Err(EscrowError::Unauthorized { caller, operation })
        }
    }

    fn require_approver(
        &self,
        caller: PartyAddress,
        asset_id: AssetId,
        operation: &'static str,
    ) -> Result<()> {
        let listing = self.open_listing(asset_id)?;
        if [listing.buyer, self.config.seller, self.config.lender].contains(&caller) {
            Ok(())
        } else {
            Err(EscrowError::Unauthorized { caller, operation })
        }
    }

    fn require_positive(amount: Decimal) -> Result<()> {
        if amount > Decimal::ZERO {
            Ok(())
        } else {
            Err(EscrowError::InvalidAmount(amount))
        }
    }

    /// Listing that still accepts mutations.
    fn open_listing(&self, asset_id: AssetId) -> Result<&Listing> {
        let listing = self
            .listings
            .get(&asset_id)
            .ok_or(EscrowError::ListingNotFound(asset_id))?;
        if listing.state.is_terminal() {
            return Err(EscrowError::AlreadySettled(asset_id));
        }
        Ok(listing)
    }

    fn open_listing_mut(&mut self, asset_id: AssetId) -> Result<&mut Listing> {
        let listing = self
            .listings
            .get_mut(&asset_id)
            .ok_or(EscrowError::ListingNotFound(asset_id))?;
        if listing.state.is_terminal() {
            return Err(EscrowError::AlreadySettled(asset_id));
        }
        Ok(listing)
    }

    /// Move `amount` from `from`'s wallet into escrow and record the inflow.
    /// Nothing changes unless both succeed.
    fn take_in(&mut self, from: PartyAddress, amount: Decimal) -> Result<()> {
        let mut flows = self.conservation.clone();
        flows.record_inflow(amount)?;
        self.funds.escrow_in(from, amount)?;
        self.conservation = flows;
        Ok(())
    }

    /// Post-commit invariant check. The operation has already taken effect,
    /// so a violation is logged rather than returned.
    fn audit(&self) {
        if let Err(err) = self.check_invariants() {
            tracing::error!(error = %err, "Ledger committed with inconsistent funds");
        }
    }

    fn record(&mut self, asset_id: AssetId, caller: PartyAddress, kind: EscrowEventKind) {
        if self.events.len() >= self.config.event_log_capacity {
            self.events.pop_front();
        }
        self.events
            .push_back(EscrowEvent::new(asset_id, caller, kind));
    }
}
