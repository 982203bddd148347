//! Inventory ledger: per-menu-item stock with availability checks.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::store::Store;
use crate::error::OrderingError;
use crate::models::MenuItem;

#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn Store>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Look up the item and check that `quantity` units are on hand.
    ///
    /// Returns the item on success so callers can snapshot its price.
    pub async fn check_available(
        &self,
        menu_id: i64,
        quantity: i32,
    ) -> Result<MenuItem, OrderingError> {
        let item = self
            .store
            .get_menu_item(menu_id)
            .await?
            .ok_or_else(|| OrderingError::validation("menu_id", "exists"))?;

        if !item.is_in_stock(quantity) {
            return Err(OrderingError::InsufficientStock {
                menu_id,
                menu_name: item.name,
                available: item.stock,
                requested: quantity,
            });
        }

        Ok(item)
    }
}

/// Upper bound on the quantity of a single order line.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Total requested quantity per menu item, in ascending menu id order.
///
/// Stock is reserved in this order so concurrent placements lock rows
/// consistently. A sum that does not fit in `i32` is a validation error.
pub fn requested_quantities<I>(lines: I) -> Result<BTreeMap<i64, i32>, OrderingError>
where
    I: IntoIterator<Item = (i64, i32)>,
{
    let mut requested: BTreeMap<i64, i32> = BTreeMap::new();
    for (menu_id, quantity) in lines {
        let entry = requested.entry(menu_id).or_insert(0);
        *entry = entry
            .checked_add(quantity)
            .ok_or_else(|| OrderingError::validation("order_items.quantity", "max"))?;
    }
    Ok(requested)
}
