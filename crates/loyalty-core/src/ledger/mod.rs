//! Ledger rules: the commit plan every balance change goes through, the
//! row filter used by listings, and the purchase arithmetic.

mod commit;
pub mod earning;
mod filter;

pub use commit::{
    checked_balance, BalanceDelta, CommitGuard, LedgerCommit, PoolDraw, MAX_POINT_AMOUNT,
};
pub use filter::{AmountComparison, TransactionFilter};
