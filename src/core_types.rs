//! Core types used throughout the system
//!
//! Fundamental type aliases shared by all modules. They give semantic
//! meaning to raw integers and leave room for type evolution.

/// User ID - globally unique, immutable after assignment.
///
/// Identifies both requesters and providers; a user can act in either
/// role across different sessions.
pub type UserId = u64;

/// Session ID - unique identifier for one paid engagement.
pub type SessionId = u64;

/// Dispute ID - unique within the system.
pub type DisputeId = u64;

/// Transaction ID - unique within the ledger.
pub type TxId = u64;

/// Listing ID - reference to the originating marketplace listing.
pub type ListingId = u64;

/// Monetary amount in paise (₹ × 100).
///
/// All internal arithmetic is exact integer math on this unit. The
/// decimal-string boundary lives in [`crate::money`].
pub type Amount = u64;

/// Reserved account that accumulates platform fee income.
///
/// Fee transactions settle into this account so that per-session
/// conservation (Σ completed amounts == 0) holds globally.
pub const PLATFORM_ID: UserId = 0;

/// Decimal places of the internal amount unit (paise).
pub const AMOUNT_DECIMALS: u32 = 2;
