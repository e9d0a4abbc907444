//! In-memory deed registry.
//!
//! Deeds are minted with sequential identifiers starting at 1 and carry a
//! metadata URI. All mutations are atomic: a rejected call changes nothing.

use std::collections::{HashMap, HashSet};

use deed_escrow_types::{AssetId, PartyAddress, RegistryError};

use crate::AssetRegistry;

/// A single minted deed.
#[derive(Debug, Clone)]
struct Deed {
    owner: PartyAddress,
    approved: Option<PartyAddress>,
    token_uri: String,
}

/// Registry state held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    deeds: HashMap<AssetId, Deed>,
    /// (owner, operator) pairs with blanket transfer rights.
    operators: HashSet<(PartyAddress, PartyAddress)>,
    /// Last minted identifier; 0 before the first mint.
    last_id: AssetId,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new deed to `owner` and return its identifier.
    ///
    /// # Errors
    /// Returns `InvalidRecipient` when minting to the zero address.
    pub fn mint(
        &mut self,
        owner: PartyAddress,
        token_uri: impl Into<String>,
    ) -> Result<AssetId, RegistryError> {
        if owner.is_zero() {
            return Err(RegistryError::InvalidRecipient);
        }
        let asset_id = self.last_id.next();
        self.last_id = asset_id;
        let token_uri = token_uri.into();
        tracing::debug!(asset = %asset_id, owner = %owner, uri = %token_uri, "Deed minted");
        self.deeds.insert(
            asset_id,
            Deed {
                owner,
                approved: None,
                token_uri,
            },
        );
        Ok(asset_id)
    }

    /// Metadata URI of a deed.
    #[must_use]
    pub fn token_uri(&self, asset_id: AssetId) -> Option<&str> {
        self.deeds.get(&asset_id).map(|d| d.token_uri.as_str())
    }

    /// Number of deeds ever minted.
    #[must_use]
    pub fn total_supply(&self) -> usize {
        self.deeds.len()
    }

    /// Number of deeds currently owned by `owner`.
    #[must_use]
    pub fn balance_of(&self, owner: PartyAddress) -> usize {
        self.deeds.values().filter(|d| d.owner == owner).count()
    }
}

impl AssetRegistry for InMemoryRegistry {
    fn owner_of(&self, asset_id: AssetId) -> Option<PartyAddress> {
        self.deeds.get(&asset_id).map(|d| d.owner)
    }

    fn get_approved(&self, asset_id: AssetId) -> Option<PartyAddress> {
        self.deeds.get(&asset_id).and_then(|d| d.approved)
    }

    fn is_approved_for_all(&self, owner: PartyAddress, operator: PartyAddress) -> bool {
        self.operators.contains(&(owner, operator))
    }

    fn approve(
        &mut self,
        caller: PartyAddress,
        delegate: PartyAddress,
        asset_id: AssetId,
    ) -> Result<(), RegistryError> {
        let owner = self
            .owner_of(asset_id)
            .ok_or(RegistryError::AssetNotFound(asset_id))?;
        if caller != owner && !self.is_approved_for_all(owner, caller) {
            return Err(RegistryError::NotAuthorized { asset_id, caller });
        }
        if delegate.is_zero() {
            return Err(RegistryError::InvalidRecipient);
        }
        if let Some(deed) = self.deeds.get_mut(&asset_id) {
            deed.approved = Some(delegate);
        }
        Ok(())
    }

    fn set_approval_for_all(
        &mut self,
        caller: PartyAddress,
        operator: PartyAddress,
        approved: bool,
    ) -> Result<(), RegistryError> {
        if operator.is_zero() {
            return Err(RegistryError::InvalidRecipient);
        }
        if approved {
            self.operators.insert((caller, operator));
        } else {
            self.operators.remove(&(caller, operator));
        }
        Ok(())
    }

    fn transfer_from(
        &mut self,
        caller: PartyAddress,
        from: PartyAddress,
        to: PartyAddress,
        asset_id: AssetId,
    ) -> Result<(), RegistryError> {
        let owner = self
            .owner_of(asset_id)
            .ok_or(RegistryError::AssetNotFound(asset_id))?;
        if owner != from {
            return Err(RegistryError::NotOwner { asset_id, from });
        }
        if !self.is_authorized(caller, asset_id) {
            return Err(RegistryError::NotAuthorized { asset_id, caller });
        }
        if to.is_zero() {
            return Err(RegistryError::InvalidRecipient);
        }
        if let Some(deed) = self.deeds.get_mut(&asset_id) {
            deed.owner = to;
            deed.approved = None;
        }
        tracing::debug!(asset = %asset_id, from = %from, to = %to, "Deed transferred");
        Ok(())
    }
}
