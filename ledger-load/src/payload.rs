//! Randomized request construction for each ledger operation.
use crate::error::PayloadError;
use crate::token::{IdempotencyToken, TokenGenerator};
use ledger_load_core::{
    OperationKind, CHARGE_AMOUNT, RELEASE_WINDOW, TRANSACTIONS_LIMIT, TRANSACTIONS_PAGE,
    WITHDRAW_AMOUNT,
};
use rand::Rng;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use time::macros::format_description;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeBody {
    pub user_id: u32,
    pub amount: i64,
    pub idempotency_key: IdempotencyToken,
    #[serde(serialize_with = "iso_millis")]
    pub release_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawBody {
    pub user_id: u32,
    pub idempotency_key: IdempotencyToken,
    pub amount: i64,
}

/// A fully-formed request, ready to be issued against the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerRequest {
    Charge(ChargeBody),
    Withdraw(WithdrawBody),
    GetBalance { user_id: u32 },
    GetTransactions { user_id: u32, page: u32, limit: u32 },
}

impl LedgerRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            LedgerRequest::Charge(_) => OperationKind::Charge,
            LedgerRequest::Withdraw(_) => OperationKind::Withdraw,
            LedgerRequest::GetBalance { .. } => OperationKind::GetBalance,
            LedgerRequest::GetTransactions { .. } => OperationKind::GetTransactions,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            LedgerRequest::Charge(_) => "/charge",
            LedgerRequest::Withdraw(_) => "/withdraw",
            LedgerRequest::GetBalance { .. } => "/balance",
            LedgerRequest::GetTransactions { .. } => "/transactions",
        }
    }

    pub fn query(&self) -> Vec<(&'static str, u32)> {
        match *self {
            LedgerRequest::GetBalance { user_id } => vec![("user_id", user_id)],
            LedgerRequest::GetTransactions {
                user_id,
                page,
                limit,
            } => vec![("user_id", user_id), ("page", page), ("limit", limit)],
            _ => vec![],
        }
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyToken> {
        match self {
            LedgerRequest::Charge(body) => Some(&body.idempotency_key),
            LedgerRequest::Withdraw(body) => Some(&body.idempotency_key),
            _ => None,
        }
    }
}

/// Builds randomized requests. Randomness comes from the caller's generator; tokens come from
/// the run-wide [`TokenGenerator`].
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    tokens: Arc<TokenGenerator>,
}

impl PayloadBuilder {
    pub fn new(tokens: Arc<TokenGenerator>) -> Self {
        Self { tokens }
    }

    pub fn build<R: Rng + ?Sized>(
        &self,
        kind: OperationKind,
        user_id: u32,
        rng: &mut R,
        now: OffsetDateTime,
    ) -> Result<LedgerRequest, PayloadError> {
        let request = match kind {
            OperationKind::Charge => {
                let amount = rng.gen_range(CHARGE_AMOUNT);
                let release_at = release_timestamp(rng, now)?;
                LedgerRequest::Charge(ChargeBody {
                    user_id,
                    amount,
                    idempotency_key: self.tokens.next()?,
                    release_at,
                })
            }
            OperationKind::Withdraw => LedgerRequest::Withdraw(WithdrawBody {
                user_id,
                idempotency_key: self.tokens.next()?,
                amount: rng.gen_range(WITHDRAW_AMOUNT),
            }),
            OperationKind::GetBalance => LedgerRequest::GetBalance { user_id },
            OperationKind::GetTransactions => LedgerRequest::GetTransactions {
                user_id,
                page: TRANSACTIONS_PAGE,
                limit: TRANSACTIONS_LIMIT,
            },
        };
        Ok(request)
    }
}

/// Uniform instant in `[now, now + RELEASE_WINDOW]`, at millisecond precision.
fn release_timestamp<R: Rng + ?Sized>(
    rng: &mut R,
    now: OffsetDateTime,
) -> Result<OffsetDateTime, PayloadError> {
    // Round up to a whole millisecond so the serialized value never precedes `now`.
    let sub_ms = now.nanosecond() % 1_000_000;
    let base = if sub_ms == 0 {
        Some(now)
    } else {
        now.checked_add(time::Duration::nanoseconds(i64::from(1_000_000 - sub_ms)))
    };

    let window_ms = RELEASE_WINDOW.as_millis() as i64;
    let offset = time::Duration::milliseconds(rng.gen_range(0..window_ms));
    base.and_then(|base| base.checked_add(offset))
        .ok_or(PayloadError::ReleaseOutOfRange)
}

fn iso_millis<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    let utc = value.to_offset(time::UtcOffset::UTC);
    let formatted = utc.format(&format).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}
