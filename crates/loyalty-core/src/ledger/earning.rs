//! Points arithmetic for purchases
//!
//! A purchase earns one point per 25 cents spent, plus each applied
//! promotion's flat bonus and `rate` points per cent. Every product is rounded
//! half away from zero before summing.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::entities::Promotion;
use crate::error::DomainError;

/// Points per dollar before promotions
pub const POINTS_PER_DOLLAR: i64 = 4;

fn out_of_range() -> DomainError {
    DomainError::InvalidAmount("spent is out of range".to_string())
}

fn round_points(value: Decimal) -> Result<i64, DomainError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(out_of_range)
}

/// `round(spent * 4)`
pub fn base_points(spent: Decimal) -> Result<i64, DomainError> {
    let product = spent
        .checked_mul(Decimal::from(POINTS_PER_DOLLAR))
        .ok_or_else(out_of_range)?;
    round_points(product)
}

/// `points + round(spent * rate * 100)` for one promotion
pub fn promotion_bonus(promotion: &Promotion, spent: Decimal) -> Result<i64, DomainError> {
    let flat = promotion.points.unwrap_or(0);
    let rated = match promotion.rate {
        Some(rate) => {
            let product = spent
                .checked_mul(rate)
                .and_then(|v| v.checked_mul(Decimal::ONE_HUNDRED))
                .ok_or_else(out_of_range)?;
            round_points(product)?
        }
        None => 0,
    };
    flat.checked_add(rated)
        .ok_or_else(|| DomainError::InvalidAmount("promotion bonus overflow".to_string()))
}

/// Total points a purchase earns with the given promotions applied
pub fn purchase_earnings(spent: Decimal, promotions: &[Promotion]) -> Result<i64, DomainError> {
    promotions.iter().try_fold(base_points(spent)?, |acc, promotion| {
        let bonus = promotion_bonus(promotion, spent)?;
        acc.checked_add(bonus)
            .ok_or_else(|| DomainError::InvalidAmount("earned points overflow".to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PromotionKind;
    use crate::value_objects::PromotionId;
    use chrono::{Duration, Utc};

    fn promo(rate: Option<Decimal>, points: Option<i64>) -> Promotion {
        let now = Utc::now();
        Promotion {
            id: PromotionId::new(1),
            name: "p".to_string(),
            description: "d".to_string(),
            kind: PromotionKind::Automatic,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            min_spending: None,
            rate,
            points,
        }
    }

    #[test]
    fn test_base_points() {
        assert_eq!(base_points(Decimal::from(10)).unwrap(), 40);
        assert_eq!(base_points(Decimal::ZERO).unwrap(), 0);
        // 19.99 * 4 = 79.96
        assert_eq!(base_points(Decimal::new(1999, 2)).unwrap(), 80);
        // 0.125 * 4 = 0.5 rounds up
        assert_eq!(base_points(Decimal::new(125, 3)).unwrap(), 1);
    }

    #[test]
    fn test_rate_bonus() {
        // 10 * 0.02 * 100 = 20
        let p = promo(Some(Decimal::new(2, 2)), Some(5));
        assert_eq!(promotion_bonus(&p, Decimal::from(10)).unwrap(), 25);
    }

    #[test]
    fn test_purchase_earnings_sum() {
        let promos = vec![promo(None, Some(10)), promo(Some(Decimal::new(1, 2)), None)];
        // 40 + 10 + round(10 * 0.01 * 100) = 60
        assert_eq!(purchase_earnings(Decimal::from(10), &promos).unwrap(), 60);
    }

    #[test]
    fn test_overflow_is_error() {
        assert!(base_points(Decimal::MAX).is_err());
    }
}
