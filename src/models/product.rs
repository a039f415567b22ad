use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;
use validator::Validate;

use super::DocumentRecord;
use crate::errors::ServiceError;
use crate::store::{Collection, StoredDocument};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProductStatus {
    Active,
    Inactive,
    Discontinued,
}

/// Warehouse product. Listed alongside documents: the name is the display
/// identifier, the supplier the counterparty and the unit price the amount.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Product {
    pub id: Uuid,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    /// Generated stock-keeping code, `PRD-<millis>` by default.
    pub sku: String,
    pub supplier_name: String,
    pub unit_price: Decimal,
    #[validate(range(min = 0))]
    pub stock_quantity: i64,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        sku: impl Into<String>,
        supplier_name: impl Into<String>,
        unit_price: Decimal,
        stock_quantity: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            sku: sku.into(),
            supplier_name: supplier_name.into(),
            unit_price,
            stock_quantity,
            status: ProductStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn stock_value(&self) -> Decimal {
        self.unit_price * Decimal::from(self.stock_quantity)
    }
}

impl DocumentRecord for Product {
    type Status = ProductStatus;

    fn id(&self) -> Uuid {
        self.id
    }

    fn number(&self) -> &str {
        &self.name
    }

    fn counterparty_name(&self) -> &str {
        &self.supplier_name
    }

    fn amount(&self) -> Decimal {
        self.unit_price
    }

    fn status(&self) -> ProductStatus {
        self.status
    }

    fn set_status(&mut self, status: ProductStatus) {
        self.status = status;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl StoredDocument for Product {
    const COLLECTION: Collection = Collection::Products;
    const NUMBER_FIELD: &'static str = "name";

    fn validate_record(&self) -> Result<(), ServiceError> {
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(ServiceError::ValidationError(
                "Unit price must not be negative".to_string(),
            ));
        }
        Ok(self.validate()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn product_maps_onto_document_shape() {
        let product = Product::new("Cat6 cable", "PRD-1", "CableCorp", dec!(4.20), 500);
        assert_eq!(product.number(), "Cat6 cable");
        assert_eq!(product.counterparty_name(), "CableCorp");
        assert_eq!(product.amount(), dec!(4.20));
        assert_eq!(product.secondary_date(), None);
        assert_eq!(product.stock_value(), dec!(2100.00));
    }

    #[test]
    fn negative_stock_fails_validation() {
        let product = Product::new("Cat6 cable", "PRD-1", "CableCorp", dec!(4.20), -1);
        assert!(product.validate().is_err());
    }
}
