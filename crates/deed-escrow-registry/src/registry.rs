//! The registry capability the escrow ledger depends on.

use deed_escrow_types::{AssetId, PartyAddress, RegistryError};

/// Ownership and transfer-authority interface of a deed registry.
///
/// Semantics follow the usual non-fungible token rules:
/// - each deed has exactly one owner;
/// - an owner may name one approved delegate per deed, or approve an
///   operator for all of its deeds;
/// - a transfer clears the per-deed delegate.
pub trait AssetRegistry {
    /// Current owner, or `None` if the deed was never minted.
    fn owner_of(&self, asset_id: AssetId) -> Option<PartyAddress>;

    /// The per-deed approved delegate, if any.
    fn get_approved(&self, asset_id: AssetId) -> Option<PartyAddress>;

    /// Whether `operator` may move every deed owned by `owner`.
    fn is_approved_for_all(&self, owner: PartyAddress, operator: PartyAddress) -> bool;

    /// Name `delegate` as the approved mover of `asset_id`. Only the owner
    /// or an approved operator may do this.
    fn approve(
        &mut self,
        caller: PartyAddress,
        delegate: PartyAddress,
        asset_id: AssetId,
    ) -> Result<(), RegistryError>;

    /// Grant or revoke blanket operator rights over the caller's deeds.
    fn set_approval_for_all(
        &mut self,
        caller: PartyAddress,
        operator: PartyAddress,
        approved: bool,
    ) -> Result<(), RegistryError>;

    /// Move `asset_id` from `from` to `to` on behalf of `caller`.
    fn transfer_from(
        &mut self,
        caller: PartyAddress,
        from: PartyAddress,
        to: PartyAddress,
        asset_id: AssetId,
    ) -> Result<(), RegistryError>;

    /// Whether `spender` may move `asset_id` right now.
    fn is_authorized(&self, spender: PartyAddress, asset_id: AssetId) -> bool {
        let Some(owner) = self.owner_of(asset_id) else {
            return false;
        };
        spender == owner
            || self.get_approved(asset_id) == Some(spender)
            || self.is_approved_for_all(owner, spender)
    }
}
