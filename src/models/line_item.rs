use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;

/// One priced line on an invoice, quotation, order or proforma invoice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct LineItem {
    #[validate(length(min = 1, message = "Line item description is required"))]
    pub description: String,
    #[validate(custom = "validate_non_negative")]
    pub quantity: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    pub fn total(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

/// Sum of `quantity * unit_price` over all items.
pub fn items_total(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::total).sum()
}

/// Counterparty must be named and every item must be valid.
pub fn validate_document(counterparty: &str, items: &[LineItem]) -> Result<(), ServiceError> {
    if counterparty.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Customer name is required".to_string(),
        ));
    }
    for item in items {
        item.validate()?;
    }
    Ok(())
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("negative_value");
        err.message = Some("Quantities and prices must not be negative".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_multiplies_quantity_and_price() {
        let item = LineItem::new("Cable 5m", dec!(3), dec!(12.50));
        assert_eq!(item.total(), dec!(37.50));
    }

    #[test]
    fn items_total_sums_lines() {
        let items = vec![
            LineItem::new("Router", dec!(1), dec!(249.00)),
            LineItem::new("Patch cable", dec!(10), dec!(4.20)),
        ];
        assert_eq!(items_total(&items), dec!(291.00));
    }

    #[test]
    fn empty_items_total_is_zero() {
        assert_eq!(items_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn negative_quantity_fails_validation() {
        let item = LineItem::new("Refund", dec!(-1), dec!(10));
        assert!(item.validate().is_err());
    }

    #[test]
    fn empty_description_fails_validation() {
        let item = LineItem::new("", dec!(1), dec!(10));
        assert!(item.validate().is_err());
    }

    #[test]
    fn document_needs_a_customer() {
        let items = vec![LineItem::new("Router", dec!(1), dec!(10))];
        assert!(validate_document("TechCorp", &items).is_ok());
        assert!(matches!(
            validate_document("  ", &items),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_price_is_allowed() {
        let item = LineItem::new("Free sample", dec!(2), dec!(0));
        assert!(item.validate().is_ok());
    }
}
