//! Transaction listing filter

use crate::entities::{Transaction, TransactionKind};
use crate::value_objects::{PromotionId, Utorid};

/// Numeric comparison on a row's `amount`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountComparison {
    Gte(i64),
    Lte(i64),
}

impl AmountComparison {
    pub fn matches(&self, amount: Option<i64>) -> bool {
        match (self, amount) {
            (Self::Gte(bound), Some(v)) => v >= *bound,
            (Self::Lte(bound), Some(v)) => v <= *bound,
            (_, None) => false,
        }
    }
}

/// Filter for ledger queries. `None` means "don't care".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilter {
    pub utorid: Option<Utorid>,
    /// Restrict to any of these subjects (resolved from a name search)
    pub utorids: Option<Vec<Utorid>>,
    pub kind: Option<TransactionKind>,
    pub created_by: Option<Utorid>,
    pub suspicious: Option<bool>,
    pub promotion_id: Option<PromotionId>,
    pub related_id: Option<i64>,
    pub amount: Option<AmountComparison>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            utorid: None,
            utorids: None,
            kind: None,
            created_by: None,
            suspicious: None,
            promotion_id: None,
            related_id: None,
            amount: None,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl TransactionFilter {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    /// Filter scoped to one ledger subject
    pub fn for_utorid(utorid: Utorid) -> Self {
        Self {
            utorid: Some(utorid),
            ..Self::default()
        }
    }

    /// In-memory predicate mirroring the SQL the Postgres repository builds
    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.utorid.as_ref().is_some_and(|u| *u != tx.utorid) {
            return false;
        }
        if self
            .utorids
            .as_ref()
            .is_some_and(|set| !set.contains(&tx.utorid))
        {
            return false;
        }
        if self.kind.is_some_and(|k| k != tx.kind) {
            return false;
        }
        if self.created_by.as_ref().is_some_and(|c| *c != tx.created_by) {
            return false;
        }
        if self.suspicious.is_some_and(|s| s != tx.suspicious) {
            return false;
        }
        if self
            .promotion_id
            .is_some_and(|p| !tx.promotion_ids.contains(&p))
        {
            return false;
        }
        if self.related_id.is_some_and(|r| tx.related_id != Some(r)) {
            return false;
        }
        if self.amount.is_some_and(|cmp| !cmp.matches(tx.amount)) {
            return false;
        }
        true
    }
}
