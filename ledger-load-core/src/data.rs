use std::fmt;
use std::time::{Duration, SystemTime};

/// The four ledger endpoints exercised by a virtual user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    Charge,
    Withdraw,
    GetBalance,
    GetTransactions,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Charge,
        OperationKind::Withdraw,
        OperationKind::GetBalance,
        OperationKind::GetTransactions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Charge => "charge",
            OperationKind::Withdraw => "withdraw",
            OperationKind::GetBalance => "balance",
            OperationKind::GetTransactions => "transactions",
        }
    }

    /// Label of the check applied to this operation's responses.
    pub fn check_name(&self) -> &'static str {
        match self {
            OperationKind::Charge => "charge success",
            OperationKind::Withdraw => "withdraw success",
            OperationKind::GetBalance => "balance success",
            OperationKind::GetTransactions => "transactions success",
        }
    }

    /// Whether `status` passes this operation's check.
    ///
    /// Withdrawals may be settled asynchronously, in which case the ledger answers
    /// `202 Accepted`.
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            OperationKind::Withdraw => status == 200 || status == 202,
            _ => status == 200,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one issued request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSample {
    pub kind: OperationKind,
    pub issued_at: SystemTime,
    pub latency: Duration,
    /// `None` when no response arrived (connection error, timeout).
    pub status: Option<u16>,
    pub check_passed: bool,
}

impl RequestSample {
    pub fn new(
        kind: OperationKind,
        issued_at: SystemTime,
        latency: Duration,
        status: Option<u16>,
    ) -> Self {
        let check_passed = status.map(|s| kind.accepts(s)).unwrap_or(false);
        Self {
            kind,
            issued_at,
            latency,
            status,
            check_passed,
        }
    }
}
