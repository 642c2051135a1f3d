//! SkillPay - Escrow-backed session marketplace core
//!
//! A requester books a paid, scheduled session with a provider; the
//! payment is held in escrow until both parties confirm the outcome,
//! then released to the provider minus a platform fee, or returned to
//! the payer on cancellation or dispute.
//!
//! # Modules
//!
//! - [`core_types`] - Shared id and amount aliases
//! - [`money`] - Strict decimal-string parsing and paise formatting
//! - [`fee`] - Fixed-point platform fee math
//! - [`wallet`] - Enforced wallet balance type
//! - [`ledger`] - Wallets plus the append-only transaction journal
//! - [`session`] - Session entity and status/escrow state machines
//! - [`lifecycle`] - Pure transition planner
//! - [`dispute`] - Dispute entities, triage, and resolution protocol
//! - [`completion`] - Post-completion side-effect interface
//! - [`coordinator`] - Single-writer orchestrator over all state
//! - [`gateway`] - Axum HTTP surface

// Core types - must be first!
pub mod core_types;

// Money handling
pub mod fee;
pub mod money;
pub mod wallet;

// Domain
pub mod completion;
pub mod coordinator;
pub mod dispute;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod session;

// Service plumbing
pub mod config;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use completion::{CompletionHooks, CompletionRecord, NoopHooks};
pub use coordinator::{BookingRequest, SessionCoordinator, SessionFilter};
pub use core_types::{Amount, DisputeId, ListingId, SessionId, TxId, UserId, PLATFORM_ID};
pub use dispute::{Dispute, DisputeReason, DisputeStatus, ResolutionKind};
pub use error::CoreError;
pub use ledger::{LedgerStore, PaymentChannel, Transaction, TxFilter, TxKind, WalletSummary};
pub use session::{EscrowState, InteractionKind, Role, Session, SessionStatus};
pub use wallet::Wallet;
