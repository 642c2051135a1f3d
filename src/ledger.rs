//! In-memory ledger: wallets plus an append-only transaction journal
//!
//! Every operation appends exactly one transaction row per affected
//! wallet and mutates exactly the wallet fields that row implies, as one
//! unit. All amount checks run before any wallet is touched, so a
//! rejected operation leaves no partial writes.
//!
//! Single-writer: the store has no interior locking and expects to be
//! owned by one coordinator behind one mutex.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core_types::{Amount, SessionId, TxId, UserId, PLATFORM_ID};
use crate::error::CoreError;
use crate::wallet::Wallet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Payment,
    EscrowLock,
    EscrowRelease,
    Withdrawal,
    Refund,
    Commission,
    Fee,
    Bonus,
    Reward,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Payment => "payment",
            TxKind::EscrowLock => "escrow_lock",
            TxKind::EscrowRelease => "escrow_release",
            TxKind::Withdrawal => "withdrawal",
            TxKind::Refund => "refund",
            TxKind::Commission => "commission",
            TxKind::Fee => "fee",
            TxKind::Bonus => "bonus",
            TxKind::Reward => "reward",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Upi,
    Card,
    NetBanking,
    /// Internal book transfer (escrow moves, fees)
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub subtotal: Amount,
    pub fee: Amount,
    /// Rate in FEE_PRECISION units, frozen at lock time
    pub fee_rate: u64,
    pub net: Amount,
}

/// Immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: TxId,
    pub owner: UserId,
    pub kind: TxKind,
    /// Signed paise: positive credits the owner's wallet view, negative
    /// debits it
    pub amount: i64,
    pub status: TxStatus,
    pub session_id: Option<SessionId>,
    pub counterparty: Option<UserId>,
    pub channel: PaymentChannel,
    pub fees: Option<FeeBreakdown>,
    pub created_at: i64,
}

/// Active escrow hold for one session
#[derive(Debug, Clone, Copy)]
struct EscrowHold {
    payer: UserId,
    gross: Amount,
}

/// History query filter; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxFilter {
    pub kind: Option<TxKind>,
    pub from_ts: Option<i64>,
    pub to_ts: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WalletSummary {
    pub user_id: UserId,
    pub balance: Amount,
    pub pending_escrow: Amount,
    pub total_earned: Amount,
    pub total_spent: Amount,
}

pub struct LedgerStore {
    wallets: FxHashMap<UserId, Wallet>,
    journal: Vec<Transaction>,
    /// One live hold per session; presence means escrow is locked.
    holds: FxHashMap<SessionId, EscrowHold>,
    min_withdrawal: Amount,
    next_tx_id: TxId,
}

fn amount_err(e: &'static str) -> CoreError {
    // Wallet arithmetic errors surface as storage faults: prechecks make
    // them unreachable, so hitting one means the store is inconsistent.
    CoreError::Storage(e.to_string())
}

impl LedgerStore {
    pub fn new(min_withdrawal: Amount) -> Self {
        let mut wallets = FxHashMap::default();
        wallets.insert(PLATFORM_ID, Wallet::new());
        LedgerStore {
            wallets,
            journal: Vec::new(),
            holds: FxHashMap::default(),
            min_withdrawal,
            next_tx_id: 1,
        }
    }

    fn wallet_mut(&mut self, user_id: UserId) -> &mut Wallet {
        self.wallets.entry(user_id).or_insert_with(Wallet::new)
    }

    fn append(
        &mut self,
        owner: UserId,
        kind: TxKind,
        amount: i64,
        session_id: Option<SessionId>,
        counterparty: Option<UserId>,
        channel: PaymentChannel,
        fees: Option<FeeBreakdown>,
        now: i64,
    ) -> TxId {
        let tx_id = self.next_tx_id;
        self.next_tx_id += 1;
        self.journal.push(Transaction {
            tx_id,
            owner,
            kind,
            amount,
            status: TxStatus::Completed,
            session_id,
            counterparty,
            channel,
            fees,
            created_at: now,
        });
        tx_id
    }

    /// Credit external funds into a user's available balance.
    pub fn deposit(
        &mut self,
        user_id: UserId,
        amount: Amount,
        channel: PaymentChannel,
        now: i64,
    ) -> Result<TxId, CoreError> {
        if amount == 0 {
            return Err(CoreError::InvalidAmount);
        }
        self.wallet_mut(user_id).deposit(amount).map_err(amount_err)?;
        let tx_id = self.append(
            user_id,
            TxKind::Payment,
            amount as i64,
            None,
            None,
            channel,
            None,
            now,
        );
        info!(user_id, amount, tx_id, "deposit");
        Ok(tx_id)
    }

    /// Move `gross` from the payer's balance into escrow for a session.
    /// A second lock for the same session is rejected idempotently.
    pub fn lock(
        &mut self,
        payer: UserId,
        session_id: SessionId,
        gross: Amount,
        fees: FeeBreakdown,
        now: i64,
    ) -> Result<TxId, CoreError> {
        if gross == 0 {
            return Err(CoreError::InvalidAmount);
        }
        if self.holds.contains_key(&session_id) {
            return Err(CoreError::AlreadyActioned("escrow already locked"));
        }
        let wallet = self.wallet_mut(payer);
        if wallet.avail() < gross {
            return Err(CoreError::InsufficientFunds);
        }
        wallet.lock_escrow(gross).map_err(amount_err)?;
        self.holds.insert(session_id, EscrowHold { payer, gross });
        let tx_id = self.append(
            payer,
            TxKind::EscrowLock,
            -(gross as i64),
            Some(session_id),
            None,
            PaymentChannel::Internal,
            Some(fees),
            now,
        );
        info!(payer, session_id, gross, tx_id, "escrow locked");
        Ok(tx_id)
    }

    /// Settle a held session to the provider: the payer's escrow drops
    /// by gross, the provider gains `net`, the platform books `fee`.
    /// `net + fee` must equal the held gross.
    pub fn release(
        &mut self,
        session_id: SessionId,
        provider: UserId,
        net: Amount,
        fee: Amount,
        fee_rate: u64,
        now: i64,
    ) -> Result<(), CoreError> {
        let hold = *self
            .holds
            .get(&session_id)
            .ok_or(CoreError::AlreadyActioned("escrow not held"))?;
        let gross = net
            .checked_add(fee)
            .filter(|total| *total == hold.gross)
            .ok_or(CoreError::InvalidAmount)?;

        // Prechecks before any mutation
        let payer_wallet = self.wallet_mut(hold.payer);
        if payer_wallet.escrowed() < gross {
            return Err(CoreError::Storage("escrow below hold".to_string()));
        }

        self.wallet_mut(hold.payer)
            .spend_escrow(gross)
            .map_err(amount_err)?;
        self.wallet_mut(provider)
            .credit_earnings(net)
            .map_err(amount_err)?;
        self.wallet_mut(PLATFORM_ID)
            .credit_earnings(fee)
            .map_err(amount_err)?;
        self.holds.remove(&session_id);

        let fees = FeeBreakdown {
            subtotal: gross,
            fee,
            fee_rate,
            net,
        };
        self.append(
            provider,
            TxKind::EscrowRelease,
            net as i64,
            Some(session_id),
            Some(hold.payer),
            PaymentChannel::Internal,
            Some(fees),
            now,
        );
        self.append(
            PLATFORM_ID,
            TxKind::Fee,
            fee as i64,
            Some(session_id),
            Some(hold.payer),
            PaymentChannel::Internal,
            None,
            now,
        );
        info!(
            session_id,
            payer = hold.payer,
            provider,
            gross,
            net,
            fee,
            "escrow released"
        );
        Ok(())
    }

    /// Return the full held amount to the payer.
    pub fn refund(&mut self, session_id: SessionId, now: i64) -> Result<TxId, CoreError> {
        let hold = *self
            .holds
            .get(&session_id)
            .ok_or(CoreError::AlreadyActioned("escrow not held"))?;
        self.wallet_mut(hold.payer)
            .refund_escrow(hold.gross)
            .map_err(amount_err)?;
        self.holds.remove(&session_id);
        let tx_id = self.append(
            hold.payer,
            TxKind::Refund,
            hold.gross as i64,
            Some(session_id),
            None,
            PaymentChannel::Internal,
            None,
            now,
        );
        info!(
            session_id,
            payer = hold.payer,
            amount = hold.gross,
            tx_id,
            "escrow refunded"
        );
        Ok(tx_id)
    }

    /// Split a held session: `refund_amount` back to the payer, the
    /// remainder released to the provider minus `fee` on that remainder.
    pub fn partial_refund(
        &mut self,
        session_id: SessionId,
        provider: UserId,
        refund_amount: Amount,
        net: Amount,
        fee: Amount,
        fee_rate: u64,
        now: i64,
    ) -> Result<(), CoreError> {
        let hold = *self
            .holds
            .get(&session_id)
            .ok_or(CoreError::AlreadyActioned("escrow not held"))?;
        let settled = refund_amount
            .checked_add(net)
            .and_then(|v| v.checked_add(fee))
            .filter(|total| *total == hold.gross)
            .ok_or(CoreError::InvalidAmount)?;
        debug!(session_id, settled, refund_amount, net, fee, "partial split");

        self.wallet_mut(hold.payer)
            .refund_escrow(refund_amount)
            .map_err(amount_err)?;
        self.wallet_mut(hold.payer)
            .spend_escrow(net + fee)
            .map_err(amount_err)?;
        self.wallet_mut(provider)
            .credit_earnings(net)
            .map_err(amount_err)?;
        self.wallet_mut(PLATFORM_ID)
            .credit_earnings(fee)
            .map_err(amount_err)?;
        self.holds.remove(&session_id);

        self.append(
            hold.payer,
            TxKind::Refund,
            refund_amount as i64,
            Some(session_id),
            Some(provider),
            PaymentChannel::Internal,
            None,
            now,
        );
        let fees = FeeBreakdown {
            subtotal: hold.gross - refund_amount,
            fee,
            fee_rate,
            net,
        };
        self.append(
            provider,
            TxKind::EscrowRelease,
            net as i64,
            Some(session_id),
            Some(hold.payer),
            PaymentChannel::Internal,
            Some(fees),
            now,
        );
        self.append(
            PLATFORM_ID,
            TxKind::Fee,
            fee as i64,
            Some(session_id),
            Some(hold.payer),
            PaymentChannel::Internal,
            None,
            now,
        );
        info!(
            session_id,
            payer = hold.payer,
            provider,
            refund_amount,
            net,
            fee,
            "escrow split"
        );
        Ok(())
    }

    /// Pay out available balance to an external destination.
    pub fn withdraw(
        &mut self,
        user_id: UserId,
        amount: Amount,
        channel: PaymentChannel,
        now: i64,
    ) -> Result<TxId, CoreError> {
        if amount < self.min_withdrawal {
            return Err(CoreError::BelowMinimumWithdrawal);
        }
        let wallet = self.wallet_mut(user_id);
        if wallet.avail() < amount {
            return Err(CoreError::InsufficientFunds);
        }
        wallet.withdraw(amount).map_err(amount_err)?;
        let tx_id = self.append(
            user_id,
            TxKind::Withdrawal,
            -(amount as i64),
            None,
            None,
            channel,
            None,
            now,
        );
        info!(user_id, amount, tx_id, "withdrawal");
        Ok(tx_id)
    }

    pub fn is_held(&self, session_id: SessionId) -> bool {
        self.holds.contains_key(&session_id)
    }

    pub fn wallet(&self, user_id: UserId) -> Option<&Wallet> {
        self.wallets.get(&user_id)
    }

    pub fn summary(&self, user_id: UserId) -> WalletSummary {
        let wallet = self.wallets.get(&user_id).copied().unwrap_or_default();
        WalletSummary {
            user_id,
            balance: wallet.avail(),
            pending_escrow: wallet.escrowed(),
            total_earned: wallet.total_earned(),
            total_spent: wallet.total_spent(),
        }
    }

    pub fn transactions(&self, user_id: UserId, filter: TxFilter) -> Vec<Transaction> {
        self.journal
            .iter()
            .filter(|tx| tx.owner == user_id)
            .filter(|tx| filter.kind.map_or(true, |k| tx.kind == k))
            .filter(|tx| filter.from_ts.map_or(true, |t| tx.created_at >= t))
            .filter(|tx| filter.to_ts.map_or(true, |t| tx.created_at <= t))
            .cloned()
            .collect()
    }

    /// Sum of all wallet holdings plus nothing else: deposits in minus
    /// withdrawals out. Used by the conservation checks in tests.
    pub fn total_holdings(&self) -> Option<Amount> {
        self.wallets
            .values()
            .try_fold(0u64, |acc, w| w.total().and_then(|t| acc.checked_add(t)))
    }
}
