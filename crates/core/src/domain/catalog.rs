use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub i64);

/// A catalog product. Name and price are mutable; order lines snapshot the
/// unit price at purchase time, so catalog edits never rewrite history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: Option<String>,
    pub current_price: Decimal,
    pub category: Option<String>,
    pub stock_quantity: i64,
}

impl Item {
    /// Out-of-stock is a display flag, not an enforcement gate.
    pub fn is_out_of_stock(&self) -> bool {
        self.stock_quantity == 0
    }
}
