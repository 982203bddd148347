//! Menu item model and stock scopes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A dish offered by a restaurant, with its on-hand stock.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub category: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl MenuItem {
    /// True iff at least `quantity` units are on hand.
    pub fn is_in_stock(&self, quantity: i32) -> bool {
        self.stock >= quantity
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock <= 0
    }
}

/// Listing filter over menu stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockScope {
    /// stock > 0
    Available,
    /// stock <= 0
    OutOfStock,
}

impl StockScope {
    pub fn matches(&self, item: &MenuItem) -> bool {
        match self {
            StockScope::Available => !item.is_out_of_stock(),
            StockScope::OutOfStock => item.is_out_of_stock(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockScope::Available => "available",
            StockScope::OutOfStock => "out_of_stock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(stock: i32) -> MenuItem {
        MenuItem {
            id: 1,
            restaurant_id: 1,
            name: "Nasi Goreng".to_string(),
            description: None,
            price: Decimal::new(25000, 0),
            stock,
            category: Some("main".to_string()),
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn in_stock_is_inclusive() {
        assert!(item(3).is_in_stock(3));
        assert!(!item(2).is_in_stock(3));
    }

    #[test]
    fn scopes_partition_items() {
        for stock in [-1, 0, 1, 5] {
            let menu = item(stock);
            assert_ne!(
                StockScope::Available.matches(&menu),
                StockScope::OutOfStock.matches(&menu)
            );
        }
        assert!(StockScope::OutOfStock.matches(&item(0)));
        assert!(StockScope::Available.matches(&item(1)));
    }
}
