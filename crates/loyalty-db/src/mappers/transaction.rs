//! Transaction model -> entity mapper

use loyalty_core::entities::{Transaction, TransactionKind};
use loyalty_core::error::DomainError;
use loyalty_core::value_objects::{PromotionId, TransactionId, Utorid};

use crate::models::TransactionModel;

use super::corrupt;

impl TryFrom<TransactionModel> for Transaction {
    type Error = DomainError;

    fn try_from(model: TransactionModel) -> Result<Self, Self::Error> {
        let kind = model
            .kind
            .parse::<TransactionKind>()
            .map_err(|_| corrupt("transaction kind", &model.kind))?;
        Ok(Transaction {
            id: TransactionId::new(model.id),
            utorid: Utorid::new_unchecked(model.utorid),
            kind,
            spent: model.spent,
            amount: model.amount,
            earned: model.earned,
            related_id: model.related_id,
            promotion_ids: model.promotion_ids.into_iter().map(PromotionId::new).collect(),
            suspicious: model.suspicious,
            processed_by: model.processed_by.map(Utorid::new_unchecked),
            remark: model.remark,
            created_by: Utorid::new_unchecked(model.created_by),
            created_at: model.created_at,
        })
    }
}
