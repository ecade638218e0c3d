//! Promotion model -> entity mapper

use loyalty_core::entities::{Promotion, PromotionKind};
use loyalty_core::error::DomainError;
use loyalty_core::value_objects::PromotionId;

use crate::models::PromotionModel;

use super::corrupt;

impl TryFrom<PromotionModel> for Promotion {
    type Error = DomainError;

    fn try_from(model: PromotionModel) -> Result<Self, Self::Error> {
        let kind = model
            .kind
            .parse::<PromotionKind>()
            .map_err(|_| corrupt("promotion kind", &model.kind))?;
        Ok(Promotion {
            id: PromotionId::new(model.id),
            name: model.name,
            description: model.description,
            kind,
            start_time: model.start_time,
            end_time: model.end_time,
            min_spending: model.min_spending,
            rate: model.rate,
            points: model.points,
        })
    }
}
