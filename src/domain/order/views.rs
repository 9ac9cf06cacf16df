use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::catalog::Product;

use super::value_objects::{LineItem, Order, Payment};

// ============================================================================
// Order Read Models - what the API returns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub name: String,
    pub unit_price: Decimal,
    pub in_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemView {
    pub id: Uuid,
    pub order: Uuid,
    pub flower: Option<Uuid>,
    pub bouquet: Option<Uuid>,
    pub product: ProductSummary,
    pub quantity: u32,
    pub price: Decimal,
}

impl LineItemView {
    pub fn new(item: &LineItem, product: &Product) -> Self {
        Self {
            id: item.id,
            order: item.order_id,
            flower: item.product.flower_id(),
            bouquet: item.product.bouquet_id(),
            product: ProductSummary {
                name: product.name().to_string(),
                unit_price: product.unit_price(),
                in_stock: product.is_available(),
            },
            quantity: item.quantity,
            price: product.price_for(item.quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<LineItemView>,
    pub total_price: Decimal,
    pub payments: Vec<Payment>,
}

impl OrderView {
    pub fn new(order: Order, items: Vec<LineItemView>, payments: Vec<Payment>) -> Self {
        let total_price = items.iter().map(|item| item.price).sum();
        Self {
            order,
            items,
            total_price,
            payments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Bouquet, Flower};

    #[test]
    fn test_total_is_sum_of_line_prices() {
        let order = Order::new(Uuid::new_v4());
        let tulip = Product::Flower(Flower::new("Tulip", Decimal::new(500, 2)));
        let bouquet = Product::Bouquet(Bouquet::new("Spring", Decimal::new(4999, 2)));

        let items = vec![
            LineItemView::new(&LineItem::new(order.id, tulip.reference(), 5), &tulip),
            LineItemView::new(&LineItem::new(order.id, bouquet.reference(), 2), &bouquet),
        ];

        let view = OrderView::new(order, items, Vec::new());
        assert_eq!(view.items[0].price, Decimal::new(2500, 2));
        assert_eq!(view.total_price, Decimal::new(12498, 2));
    }

    #[test]
    fn test_empty_order_total_is_zero() {
        let view = OrderView::new(Order::new(Uuid::new_v4()), Vec::new(), Vec::new());
        assert_eq!(view.total_price, Decimal::ZERO);
    }

    #[test]
    fn test_line_view_exposes_exactly_one_reference() {
        let tulip = Product::Flower(Flower::new("Tulip", Decimal::ONE));
        let item = LineItem::new(Uuid::new_v4(), tulip.reference(), 1);
        let json = serde_json::to_value(LineItemView::new(&item, &tulip)).unwrap();

        assert!(json["flower"].is_string());
        assert!(json["bouquet"].is_null());
    }
}
