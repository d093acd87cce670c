//! Security primitives: reentrancy guard and owner authority
//!
//! The engine's external ledger may run arbitrary logic before returning
//! control from a transfer, so every custody-affecting operation holds the
//! reentrancy guard for its full duration. Privileged operations compare
//! the caller against a single fixed authority account.

use crate::ids::AccountId;

/// Reentrancy guard preventing nested calls into protected operations.
///
/// An operation acquires the guard before executing state-changing logic
/// and releases it on completion. Any nested entry attempt fails.
#[derive(Debug, Clone)]
pub struct ReentrancyGuard {
    locked: bool,
}

impl ReentrancyGuard {
    /// Create a new unlocked guard.
    pub fn new() -> Self {
        Self { locked: false }
    }

    /// Acquire the guard. Returns `true` if successfully acquired.
    /// Returns `false` if already locked (reentrancy attempt).
    pub fn acquire(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    /// Release the guard.
    pub fn release(&mut self) {
        self.locked = false;
    }

    /// Check if currently locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// The single account permitted to change the fee policy.
///
/// Set once at engine construction and immutable thereafter. There is no
/// ownership transfer, multi-sig, or timelock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authority {
    owner: AccountId,
}

impl Authority {
    /// Create an authority for a fixed owner account.
    pub fn new(owner: AccountId) -> Self {
        Self { owner }
    }

    /// Check whether a caller is the owner.
    pub fn is_owner(&self, caller: &AccountId) -> bool {
        *caller == self.owner
    }

    /// Get the owner account.
    pub fn account(&self) -> &AccountId {
        &self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- ReentrancyGuard tests ---

    #[test]
    fn test_reentrancy_guard_acquire_release() {
        let mut guard = ReentrancyGuard::new();
        assert!(!guard.is_locked());
        assert!(guard.acquire());
        assert!(guard.is_locked());
        guard.release();
        assert!(!guard.is_locked());
    }

    #[test]
    fn test_reentrancy_guard_double_acquire_fails() {
        let mut guard = ReentrancyGuard::new();
        assert!(guard.acquire());
        assert!(!guard.acquire(), "Second acquire must fail");
    }

    #[test]
    fn test_reentrancy_guard_reacquire_after_release() {
        let mut guard = ReentrancyGuard::new();
        assert!(guard.acquire());
        guard.release();
        assert!(guard.acquire(), "Should succeed after release");
    }

    // --- Authority tests ---

    #[test]
    fn test_authority_recognizes_owner() {
        let owner = AccountId::new();
        let authority = Authority::new(owner);
        assert!(authority.is_owner(&owner));
        assert_eq!(authority.account(), &owner);
    }

    #[test]
    fn test_authority_rejects_non_owner() {
        let authority = Authority::new(AccountId::new());
        assert!(!authority.is_owner(&AccountId::new()));
    }
}
