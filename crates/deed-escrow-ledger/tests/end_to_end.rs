//! End-to-end integration tests across registry and escrow ledger.
//!
//! These tests drive a complete sale the way the parties would: the seller
//! mints and delegates the deed, lists it, the buyer and lender fund it,
//! the inspector signs off, everyone approves, and the seller closes.

use deed_escrow_ledger::EscrowLedger;
use deed_escrow_registry::{AssetRegistry, InMemoryRegistry};
use deed_escrow_types::{
    AssetId, EscrowConfig, EscrowError, ListingState, PartyAddress, ReceiptType, RegistryError,
};
use ed25519_dalek::SigningKey;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Registry that counts transfer attempts and can be told to refuse them.
#[derive(Default)]
struct FailingRegistry {
    inner: InMemoryRegistry,
    fail_transfers: bool,
    transfer_calls: usize,
}

impl AssetRegistry for FailingRegistry {
    fn owner_of(&self, asset_id: AssetId) -> Option<PartyAddress> {
        self.inner.owner_of(asset_id)
    }

    fn get_approved(&self, asset_id: AssetId) -> Option<PartyAddress> {
        self.inner.get_approved(asset_id)
    }

    fn is_approved_for_all(&self, owner: PartyAddress, operator: PartyAddress) -> bool {
        self.inner.is_approved_for_all(owner, operator)
    }

    fn approve(
        &mut self,
        caller: PartyAddress,
        delegate: PartyAddress,
        asset_id: AssetId,
    ) -> Result<(), RegistryError> {
        self.inner.approve(caller, delegate, asset_id)
    }

    fn set_approval_for_all(
        &mut self,
        caller: PartyAddress,
        operator: PartyAddress,
        approved: bool,
    ) -> Result<(), RegistryError> {
        self.inner.set_approval_for_all(caller, operator, approved)
    }

    fn transfer_from(
        &mut self,
        caller: PartyAddress,
        from: PartyAddress,
        to: PartyAddress,
        asset_id: AssetId,
    ) -> Result<(), RegistryError> {
        self.transfer_calls += 1;
        if self.fail_transfers {
            return Err(RegistryError::NotAuthorized { asset_id, caller });
        }
        self.inner.transfer_from(caller, from, to, asset_id)
    }
}

struct Parties {
    buyer: PartyAddress,
    seller: PartyAddress,
    lender: PartyAddress,
    inspector: PartyAddress,
    escrow: PartyAddress,
}

fn config() -> (EscrowConfig, Parties) {
    let config = EscrowConfig::new(
        PartyAddress::from_label("registry"),
        PartyAddress::from_label("escrow"),
        PartyAddress::from_label("seller"),
        PartyAddress::from_label("lender"),
        PartyAddress::from_label("inspector"),
    );
    let parties = Parties {
        buyer: PartyAddress::from_label("buyer"),
        seller: config.seller,
        lender: config.lender,
        inspector: config.inspector,
        escrow: config.escrow,
    };
    (config, parties)
}

/// Mint a deed to the seller, delegate it to escrow, and list it at
/// price 10 with escrow 5. Buyer and lender start with 50 each.
fn listed<R: AssetRegistry>(
    registry: R,
    mint: impl FnOnce(&mut R, PartyAddress) -> AssetId,
) -> (EscrowLedger<R>, Parties, AssetId) {
    let (config, p) = config();
    let mut ledger = EscrowLedger::new(config, registry, SigningKey::from_bytes(&[42u8; 32]))
        .expect("valid config");
    let asset = mint(ledger.registry_mut(), p.seller);
    ledger
        .registry_mut()
        .approve(p.seller, p.escrow, asset)
        .expect("seller delegates to escrow");
    ledger.credit_wallet(p.buyer, dec(50)).expect("credit wallet");
    ledger.credit_wallet(p.lender, dec(50)).expect("credit wallet");
    ledger
        .list(p.seller, asset, p.buyer, dec(10), dec(5))
        .expect("listing should succeed");
    (ledger, p, asset)
}

fn in_memory() -> (EscrowLedger<InMemoryRegistry>, Parties, AssetId) {
    listed(InMemoryRegistry::new(), |reg, seller| {
        reg.mint(seller, "ipfs://deed/1").expect("mint")
    })
}

// =========================================================================
// Happy path
// =========================================================================

#[test]
fn full_sale_transfers_deed_and_pays_seller() {
    init_tracing();
    let (mut ledger, p, asset) = in_memory();

    assert_eq!(ledger.registry().owner_of(asset), Some(p.escrow));
    assert!(ledger.is_listed(asset));
    assert_eq!(ledger.nft_address(), PartyAddress::from_label("registry"));

    ledger.deposit_earnest(p.buyer, asset, dec(5)).unwrap();
    assert_eq!(ledger.get_balance(), dec(5));

    ledger
        .update_inspection_status(p.inspector, asset, true)
        .unwrap();
    assert!(ledger.inspection_passed(asset));

    for party in [p.buyer, p.seller, p.lender] {
        ledger.approve_sale(party, asset).unwrap();
        assert!(ledger.approval(asset, party));
    }

    ledger.provide_financing(p.lender, asset, dec(5)).unwrap();
    assert_eq!(ledger.get_balance(), dec(10));

    let receipt = ledger.finalize_sale(p.seller, asset).unwrap();

    assert_eq!(ledger.registry().owner_of(asset), Some(p.buyer));
    assert_eq!(ledger.get_balance(), Decimal::ZERO);
    assert_eq!(ledger.wallet_balance(p.seller), dec(10));
    assert_eq!(ledger.wallet_balance(p.buyer), dec(45));
    assert_eq!(ledger.wallet_balance(p.lender), dec(45));
    assert!(!ledger.is_listed(asset));

    receipt.verify(&ledger.verifying_key()).unwrap();
    assert_eq!(receipt.receipt_type, ReceiptType::SaleFinalized);
    assert_eq!(receipt.summary().unwrap().total_paid(), dec(10));

    let err = ledger.finalize_sale(p.seller, asset).unwrap_err();
    assert!(matches!(err, EscrowError::AlreadySettled(_)));
    ledger.check_invariants().unwrap();
}

#[test]
fn approvals_and_inspection_in_any_order() {
    let (mut ledger, p, asset) = in_memory();

    ledger.approve_sale(p.lender, asset).unwrap();
    ledger
        .update_inspection_status(p.inspector, asset, false)
        .unwrap();
    ledger.approve_sale(p.seller, asset).unwrap();
    ledger.deposit_earnest(p.buyer, asset, dec(10)).unwrap();
    ledger
        .update_inspection_status(p.inspector, asset, true)
        .unwrap();
    ledger.approve_sale(p.buyer, asset).unwrap();

    ledger.finalize_sale(p.seller, asset).unwrap();
    assert_eq!(ledger.registry().owner_of(asset), Some(p.buyer));
}

// =========================================================================
// Rejections leave state unchanged
// =========================================================================

#[test]
fn finalize_without_inspection_keeps_funds_and_deed() {
    init_tracing();
    let (mut ledger, p, asset) = in_memory();
    ledger.deposit_earnest(p.buyer, asset, dec(5)).unwrap();
    for party in [p.buyer, p.seller, p.lender] {
        ledger.approve_sale(party, asset).unwrap();
    }
    ledger.provide_financing(p.lender, asset, dec(5)).unwrap();

    let err = ledger.finalize_sale(p.seller, asset).unwrap_err();
    match err {
        EscrowError::ConditionsNotMet { asset_id, reason } => {
            assert_eq!(asset_id, asset);
            assert!(reason.contains("inspection"), "Got: {reason}");
        }
        other => panic!("Expected ConditionsNotMet, got {other:?}"),
    }
    assert_eq!(ledger.get_balance(), dec(10));
    assert_eq!(ledger.registry().owner_of(asset), Some(p.escrow));
    assert!(ledger.is_listed(asset));
    assert!(ledger.receipts().is_empty());
}

#[test]
fn unmet_conditions_are_all_reported() {
    let (mut ledger, p, asset) = in_memory();
    let err = ledger.finalize_sale(p.seller, asset).unwrap_err();
    let EscrowError::ConditionsNotMet { reason, .. } = err else {
        panic!("Expected ConditionsNotMet");
    };
    for needle in [
        "inspection",
        "buyer has not approved",
        "seller has not approved",
        "lender has not approved",
        "below purchase price",
    ] {
        assert!(reason.contains(needle), "Missing {needle:?} in {reason}");
    }
}

#[test]
fn registry_refusal_on_finalize_is_atomic() {
    init_tracing();
    let (mut ledger, p, asset) = listed(FailingRegistry::default(), |reg, seller| {
        reg.inner.mint(seller, "ipfs://deed/9").expect("mint")
    });
    ledger.deposit_earnest(p.buyer, asset, dec(10)).unwrap();
    ledger
        .update_inspection_status(p.inspector, asset, true)
        .unwrap();
    for party in [p.buyer, p.seller, p.lender] {
        ledger.approve_sale(party, asset).unwrap();
    }
    let events_before = ledger.events().count();

    ledger.registry_mut().fail_transfers = true;
    let err = ledger.finalize_sale(p.seller, asset).unwrap_err();
    assert!(matches!(err, EscrowError::Registry(_)));

    assert_eq!(ledger.get_balance(), dec(10));
    assert_eq!(ledger.wallet_balance(p.seller), Decimal::ZERO);
    assert_eq!(ledger.wallet_balance(p.buyer), dec(40));
    assert_eq!(ledger.registry().owner_of(asset), Some(p.escrow));
    assert_eq!(ledger.state(asset), Some(ListingState::Listed));
    assert_eq!(ledger.events().count(), events_before);
    assert!(ledger.receipts().is_empty());
    ledger.check_invariants().unwrap();

    ledger.registry_mut().fail_transfers = false;
    ledger.finalize_sale(p.seller, asset).unwrap();
    assert_eq!(ledger.registry().owner_of(asset), Some(p.buyer));
}

#[test]
fn settled_listing_never_reaches_registry() {
    let (mut ledger, p, asset) = listed(FailingRegistry::default(), |reg, seller| {
        reg.inner.mint(seller, "ipfs://deed/4").expect("mint")
    });
    ledger.deposit_earnest(p.buyer, asset, dec(10)).unwrap();
    ledger.cancel_sale(p.seller, asset).unwrap();
    // One transfer into custody, one back to the seller.
    assert_eq!(ledger.registry().transfer_calls, 2);

    for party in [p.buyer, p.seller, p.lender] {
        ledger.approve_sale(party, asset).unwrap_err();
    }
    let err = ledger.finalize_sale(p.seller, asset).unwrap_err();
    assert!(matches!(err, EscrowError::AlreadySettled(_)));
    let err = ledger.cancel_sale(p.buyer, asset).unwrap_err();
    assert!(matches!(err, EscrowError::AlreadySettled(_)));

    assert_eq!(ledger.registry().transfer_calls, 2);
    assert_eq!(ledger.receipts().len(), 1);
    assert_eq!(ledger.wallet_balance(p.buyer), dec(50));
    ledger.check_invariants().unwrap();
}

#[test]
fn registry_refusal_on_list_records_nothing() {
    let (config, p) = config();
    let mut registry = FailingRegistry::default();
    let asset = registry.inner.mint(p.seller, "ipfs://deed/3").unwrap();
    registry.inner.approve(p.seller, p.escrow, asset).unwrap();
    registry.fail_transfers = true;
    let mut ledger =
        EscrowLedger::new(config, registry, SigningKey::from_bytes(&[42u8; 32])).unwrap();

    let err = ledger
        .list(p.seller, asset, p.buyer, dec(10), dec(5))
        .unwrap_err();
    assert!(matches!(err, EscrowError::Registry(_)));
    assert!(ledger.listing(asset).is_none());
    assert_eq!(ledger.events().count(), 0);
}

// =========================================================================
// Cancellation
// =========================================================================

#[test]
fn cancel_returns_deed_and_splits_funds() {
    let (mut ledger, p, asset) = in_memory();
    ledger.deposit_earnest(p.buyer, asset, dec(5)).unwrap();
    ledger.provide_financing(p.lender, asset, dec(5)).unwrap();
    ledger
        .update_inspection_status(p.inspector, asset, true)
        .unwrap();

    let receipt = ledger.cancel_sale(p.buyer, asset).unwrap();
    let summary = receipt.summary().unwrap();

    // Inspection passed, so the earnest deposit is forfeited.
    assert_eq!(summary.paid_to(&p.seller), dec(5));
    assert_eq!(summary.paid_to(&p.lender), dec(5));
    assert_eq!(summary.deed_recipient, p.seller);
    assert_eq!(ledger.wallet_balance(p.seller), dec(5));
    assert_eq!(ledger.wallet_balance(p.lender), dec(50));
    assert_eq!(ledger.registry().owner_of(asset), Some(p.seller));
    assert_eq!(ledger.get_balance(), Decimal::ZERO);
    assert_eq!(ledger.state(asset), Some(ListingState::Cancelled));

    let tags: Vec<&str> = ledger.events().map(|e| e.kind.tag()).collect();
    assert_eq!(tags.last(), Some(&"SALE_CANCELLED"));
}

#[test]
fn several_listings_tracked_independently() {
    let (mut ledger, p, first) = in_memory();
    let second = ledger
        .registry_mut()
        .mint(p.seller, "ipfs://deed/2")
        .unwrap();
    ledger
        .registry_mut()
        .approve(p.seller, p.escrow, second)
        .unwrap();
    ledger
        .list(p.seller, second, p.buyer, dec(20), Decimal::ZERO)
        .unwrap();

    ledger.deposit_earnest(p.buyer, first, dec(5)).unwrap();
    ledger.deposit_earnest(p.buyer, second, dec(3)).unwrap();
    assert_eq!(ledger.held_for(first), dec(5));
    assert_eq!(ledger.held_for(second), dec(3));
    assert_eq!(ledger.get_balance(), dec(8));

    ledger.cancel_sale(p.seller, first).unwrap();
    assert_eq!(ledger.get_balance(), dec(3));
    assert!(ledger.is_listed(second));
    ledger.check_invariants().unwrap();
}

// =========================================================================
// Configuration
// =========================================================================

#[test]
fn ledger_built_from_json_config() {
    let (_, p) = config();
    let json = serde_json::json!({
        "registry": PartyAddress::from_label("registry"),
        "escrow": p.escrow,
        "seller": p.seller,
        "lender": p.lender,
        "inspector": p.inspector,
        "event_log_capacity": 16,
    })
    .to_string();
    let config = EscrowConfig::from_json(&json).unwrap();
    assert_eq!(config.event_log_capacity, 16);

    let ledger = EscrowLedger::new(
        config,
        InMemoryRegistry::new(),
        SigningKey::from_bytes(&[42u8; 32]),
    )
    .unwrap();
    assert_eq!(ledger.seller(), p.seller);
    assert_eq!(ledger.lender(), p.lender);
    assert_eq!(ledger.inspector(), p.inspector);
    assert_eq!(ledger.get_balance(), Decimal::ZERO);
}
