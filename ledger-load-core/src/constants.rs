use std::num::NonZeroUsize;
use std::ops::{Range, RangeInclusive};
use std::time::Duration;

/// Number of virtual users when none is configured.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(100) };

/// Identities are drawn uniformly from this pool on every iteration.
pub const DEFAULT_USER_POOL: RangeInclusive<u32> = RangeInclusive::new(1, 100);

/// Charge amounts, upper bound exclusive.
pub const CHARGE_AMOUNT: Range<i64> = 1_000..10_000;

/// Withdraw amounts, upper bound exclusive.
pub const WITHDRAW_AMOUNT: Range<i64> = 1_000..5_000;

/// Charges request settlement somewhere in `[now, now + RELEASE_WINDOW]`.
pub const RELEASE_WINDOW: Duration = Duration::from_secs(3 * 60 * 60);

/// Pause between two iterations of a single virtual user.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cadence of the streaming statistics log line.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

pub const TRANSACTIONS_PAGE: u32 = 1;
pub const TRANSACTIONS_LIMIT: u32 = 10;

/// Allowed deviation of the mix weights' sum from 1.0.
pub const MIX_SUM_TOLERANCE: f64 = 1e-6;
