//! Transaction entity - one row of the points ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::{PromotionId, TransactionId, Utorid};

/// Ledger row type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Purchase,
    Adjustment,
    Transfer,
    Redemption,
    Event,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Adjustment => "adjustment",
            Self::Transfer => "transfer",
            Self::Redemption => "redemption",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(Self::Purchase),
            "adjustment" => Ok(Self::Adjustment),
            "transfer" => Ok(Self::Transfer),
            "redemption" => Ok(Self::Redemption),
            "event" => Ok(Self::Event),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Ledger row.
///
/// Which point field is authoritative depends on `kind`:
/// purchases carry `earned` (or `amount` when withheld), every other kind
/// carries a signed `amount`. `related_id` points at the original
/// transaction (adjustment), the counterparty user (transfer) or the event
/// (event award).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub utorid: Utorid,
    pub kind: TransactionKind,
    pub spent: Option<Decimal>,
    pub amount: Option<i64>,
    pub earned: Option<i64>,
    pub related_id: Option<i64>,
    pub promotion_ids: Vec<PromotionId>,
    pub suspicious: bool,
    pub processed_by: Option<Utorid>,
    pub remark: String,
    pub created_by: Utorid,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Points this row moves when its suspicious flag is toggled
    #[inline]
    pub fn base_points(&self) -> i64 {
        self.amount.or(self.earned).unwrap_or(0)
    }

    #[inline]
    pub fn is_redemption(&self) -> bool {
        self.kind == TransactionKind::Redemption
    }

    /// Redemption rows start pending and flip once to processed
    #[inline]
    pub fn is_processed(&self) -> bool {
        self.processed_by.is_some()
    }
}

/// A ledger row about to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub utorid: Utorid,
    pub kind: TransactionKind,
    pub spent: Option<Decimal>,
    pub amount: Option<i64>,
    pub earned: Option<i64>,
    pub related_id: Option<i64>,
    pub promotion_ids: Vec<PromotionId>,
    pub suspicious: bool,
    pub remark: String,
    pub created_by: Utorid,
}

impl NewTransaction {
    /// Row with only the common fields filled in
    pub fn new(kind: TransactionKind, utorid: Utorid, created_by: Utorid) -> Self {
        Self {
            utorid,
            kind,
            spent: None,
            amount: None,
            earned: None,
            related_id: None,
            promotion_ids: Vec::new(),
            suspicious: false,
            remark: String::new(),
            created_by,
        }
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_related(mut self, related_id: i64) -> Self {
        self.related_id = Some(related_id);
        self
    }

    pub fn with_remark(mut self, remark: Option<String>) -> Self {
        self.remark = remark.unwrap_or_default();
        self
    }

    pub fn with_promotions(mut self, promotion_ids: Vec<PromotionId>) -> Self {
        self.promotion_ids = promotion_ids;
        self
    }
}
