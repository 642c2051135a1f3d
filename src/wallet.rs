/// ENFORCED WALLET TYPE - Used by the ledger store
///
/// This is the SINGLE source of truth for wallet mutations.
/// ALL balance changes MUST go through these methods.
///
/// # Enforcement Strategy:
/// 1. Fields are PRIVATE - no direct access
/// 2. All mutations return Result - errors are explicit
/// 3. Version auto-increments - audit trail
/// 4. checked_add/sub - overflow protection
use serde::{Deserialize, Serialize};

/// Wallet for a single user
///
/// # Invariants (ENFORCED by private fields):
/// - `avail` equals the running sum of completed, non-escrowed amounts
/// - `escrowed` equals the sum of active escrow locks not yet settled
/// - lifetime counters (`total_earned`, `total_spent`) only grow
/// - no overflow/underflow (checked arithmetic)
///
/// The wallet is a materialized view over the transaction log; the
/// ledger store mutates it in the same atomic unit as each append.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    avail: u64,        // PRIVATE - spendable balance
    escrowed: u64,     // PRIVATE - held in escrow on this user's behalf
    total_earned: u64, // PRIVATE - lifetime provider earnings
    total_spent: u64,  // PRIVATE - lifetime requester spend
    version: u64,      // PRIVATE - incremented on every mutation
}

impl Wallet {
    /// Fresh wallet, all counters zero
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================
    // READ-ONLY GETTERS (safe to expose)
    // ============================================================

    /// Spendable balance
    #[inline(always)]
    pub const fn avail(&self) -> u64 {
        self.avail
    }

    /// Amount currently locked in escrow
    #[inline(always)]
    pub const fn escrowed(&self) -> u64 {
        self.escrowed
    }

    /// Lifetime earnings credited as a provider
    #[inline(always)]
    pub const fn total_earned(&self) -> u64 {
        self.total_earned
    }

    /// Lifetime spend settled as a requester
    #[inline(always)]
    pub const fn total_spent(&self) -> u64 {
        self.total_spent
    }

    /// Total funds attributable to this user (avail + escrowed).
    /// Returns None on overflow (indicates data corruption).
    #[inline(always)]
    pub const fn total(&self) -> Option<u64> {
        self.avail.checked_add(self.escrowed)
    }

    /// Mutation counter
    #[inline(always)]
    pub const fn version(&self) -> u64 {
        self.version
    }

    // ============================================================
    // VALIDATED MUTATIONS (ENFORCED operations)
    // ============================================================

    /// Credit spendable balance (wallet top-up).
    pub fn deposit(&mut self, amount: u64) -> Result<(), &'static str> {
        self.avail = self.avail.checked_add(amount).ok_or("Deposit overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Debit spendable balance (payout to external destination).
    pub fn withdraw(&mut self, amount: u64) -> Result<(), &'static str> {
        if self.avail < amount {
            return Err("Insufficient funds");
        }
        self.avail = self.avail.checked_sub(amount).ok_or("Withdraw underflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Move funds from avail into escrow hold.
    pub fn lock_escrow(&mut self, amount: u64) -> Result<(), &'static str> {
        if self.avail < amount {
            return Err("Insufficient funds to lock");
        }
        self.avail = self
            .avail
            .checked_sub(amount)
            .ok_or("Lock avail underflow")?;
        self.escrowed = self
            .escrowed
            .checked_add(amount)
            .ok_or("Lock escrow overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Spend escrowed funds without returning them to avail.
    ///
    /// Payer side of a release: the gross leaves this wallet for good
    /// and counts toward lifetime spend.
    pub fn spend_escrow(&mut self, amount: u64) -> Result<(), &'static str> {
        if self.escrowed < amount {
            return Err("Insufficient escrowed funds");
        }
        self.escrowed = self
            .escrowed
            .checked_sub(amount)
            .ok_or("Spend escrow underflow")?;
        self.total_spent = self
            .total_spent
            .checked_add(amount)
            .ok_or("Total spent overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Return escrowed funds to avail (cancellation / dispute refund).
    pub fn refund_escrow(&mut self, amount: u64) -> Result<(), &'static str> {
        if self.escrowed < amount {
            return Err("Insufficient escrowed funds");
        }
        self.escrowed = self
            .escrowed
            .checked_sub(amount)
            .ok_or("Refund escrow underflow")?;
        self.avail = self
            .avail
            .checked_add(amount)
            .ok_or("Refund avail overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Credit provider earnings: avail and lifetime-earned together.
    pub fn credit_earnings(&mut self, amount: u64) -> Result<(), &'static str> {
        self.avail = self
            .avail
            .checked_add(amount)
            .ok_or("Earnings avail overflow")?;
        self.total_earned = self
            .total_earned
            .checked_add(amount)
            .ok_or("Total earned overflow")?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }
}
