//! Explicit owner and grant mapping consulted before any decryption request.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{LedgerError, LedgerResult};
use crate::types::{Address, TargetId};

#[derive(Debug, Default)]
pub struct AccessControl {
    owners: BTreeMap<TargetId, Address>,
    grants: BTreeMap<TargetId, BTreeSet<Address>>,
}

impl AccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the owner of a freshly created target. Ownership never changes.
    pub fn register_owner(&mut self, target: TargetId, owner: Address) {
        self.owners.entry(target).or_insert(owner);
    }

    pub fn owner_of(&self, target: TargetId) -> LedgerResult<&Address> {
        self.owners.get(&target).ok_or(LedgerError::NotFound(target))
    }

    /// Validate that `caller` may grant access on `target`. Call before [`Self::grant`].
    pub fn ensure_owner(&self, target: TargetId, caller: &Address) -> LedgerResult<()> {
        if self.owner_of(target)? == caller {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                target,
            })
        }
    }

    /// Returns `false` when the grantee already had access.
    pub fn grant(&mut self, target: TargetId, grantee: Address) -> bool {
        self.grants.entry(target).or_default().insert(grantee)
    }

    pub fn is_authorized(&self, target: TargetId, caller: &Address) -> bool {
        match self.owners.get(&target) {
            Some(owner) if owner == caller => true,
            Some(_) => self
                .grants
                .get(&target)
                .is_some_and(|grantees| grantees.contains(caller)),
            None => false,
        }
    }

    pub fn ensure_can_decrypt(&self, target: TargetId, caller: &Address) -> LedgerResult<()> {
        self.owner_of(target)?;
        if self.is_authorized(target, caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                target,
            })
        }
    }
}
