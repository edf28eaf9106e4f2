//! Inventory item record.

use crate::error::RepositoryError;
use crate::value::SqlRow;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the `items` table, with the unit label joined in from `units`.
///
/// `amount == None` is the soft-delete marker: the row is kept, but listing
/// queries skip it. Never encode deletion as a zero or negative amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Decimal string of the database id; empty until the item is stored
    pub id: String,
    pub vendor: String,
    pub name: String,
    /// Unit-of-measure label, e.g. `kg`
    pub unit: String,
    pub weight: Decimal,
    pub amount: Option<i32>,
    pub reserve_rate: i32,
}

impl Item {
    pub fn builder() -> ItemBuilder {
        ItemBuilder::default()
    }

    pub fn is_deleted(&self) -> bool {
        self.amount.is_none()
    }

    /// Map a joined `id, vendor, name, unit, weight, amount, reserve_rate` row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conversion` when a column is missing, NULL
    /// where it may not be, or of the wrong type.
    pub fn from_row(row: &SqlRow) -> Result<Self, RepositoryError> {
        Ok(Self {
            id: row.get_i32("id")?.to_string(),
            vendor: row.get_string("vendor")?,
            name: row.get_string("name")?,
            unit: row.get_string("unit")?,
            weight: row.get_decimal("weight")?,
            amount: row.get_opt_i32("amount")?,
            reserve_rate: row.get_i32("reserve_rate")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemBuilder {
    id: String,
    vendor: String,
    name: String,
    unit: String,
    weight: Decimal,
    amount: Option<i32>,
    reserve_rate: i32,
}

impl ItemBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn weight(mut self, weight: Decimal) -> Self {
        self.weight = weight;
        self
    }

    pub fn amount(mut self, amount: i32) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn reserve_rate(mut self, reserve_rate: i32) -> Self {
        self.reserve_rate = reserve_rate;
        self
    }

    pub fn build(self) -> Item {
        Item {
            id: self.id,
            vendor: self.vendor,
            name: self.name,
            unit: self.unit,
            weight: self.weight,
            amount: self.amount,
            reserve_rate: self.reserve_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::decimal_value;
    use sea_query::Value;

    fn joined_row(amount: Option<i32>) -> SqlRow {
        SqlRow::new()
            .with("id", 42)
            .with("vendor", "ACME-001")
            .with("name", "Bolt M6")
            .with("unit", "box")
            .with("weight", decimal_value(Decimal::new(125, 2)))
            .with("amount", Value::Int(amount))
            .with("reserve_rate", 3)
    }

    #[test]
    fn test_from_row_maps_every_column() {
        let item = Item::from_row(&joined_row(Some(17))).unwrap();
        assert_eq!(
            item,
            Item::builder()
                .id("42")
                .vendor("ACME-001")
                .name("Bolt M6")
                .unit("box")
                .weight(Decimal::new(125, 2))
                .amount(17)
                .reserve_rate(3)
                .build()
        );
        assert!(!item.is_deleted());
    }

    #[test]
    fn test_from_row_null_amount_is_deleted() {
        let item = Item::from_row(&joined_row(None)).unwrap();
        assert_eq!(item.amount, None);
        assert!(item.is_deleted());
    }

    #[test]
    fn test_from_row_without_unit_fails() {
        let row = SqlRow::new()
            .with("id", 1)
            .with("vendor", "v")
            .with("name", "n")
            .with("weight", decimal_value(Decimal::ONE))
            .with("amount", 1)
            .with("reserve_rate", 0);
        assert!(matches!(
            Item::from_row(&row),
            Err(RepositoryError::Conversion(msg)) if msg.contains("unit")
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let item = Item::builder().name("Nut").build();
        assert!(item.id.is_empty());
        assert_eq!(item.weight, Decimal::ZERO);
        assert!(item.is_deleted());
        assert_eq!(item.reserve_rate, 0);
    }

    #[test]
    fn test_json_uses_camel_case_and_null_amount() {
        let item = Item::builder()
            .id("5")
            .vendor("V")
            .name("Washer")
            .unit("pcs")
            .weight(Decimal::new(5, 1))
            .reserve_rate(2)
            .build();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["reserveRate"], 2);
        assert!(json["amount"].is_null());
        assert!(json.get("reserve_rate").is_none());
    }
}
