use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Catalog Value Objects
// ============================================================================

/// Largest quantity of a single flower one line item may hold.
pub const FLOWER_MAX_ORDER_QUANTITY: u32 = 10_000;

/// Largest quantity of a single bouquet one line item may hold.
pub const BOUQUET_MAX_ORDER_QUANTITY: u32 = 50;

/// Reference to exactly one sellable product.
///
/// Line items store this instead of a pair of nullable ids, so the
/// "flower XOR bouquet" rule holds by construction once a reference exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ProductRef {
    Flower(Uuid),
    Bouquet(Uuid),
}

impl ProductRef {
    pub fn id(&self) -> Uuid {
        match self {
            ProductRef::Flower(id) | ProductRef::Bouquet(id) => *id,
        }
    }

    pub fn flower_id(&self) -> Option<Uuid> {
        match self {
            ProductRef::Flower(id) => Some(*id),
            ProductRef::Bouquet(_) => None,
        }
    }

    pub fn bouquet_id(&self) -> Option<Uuid> {
        match self {
            ProductRef::Bouquet(id) => Some(*id),
            ProductRef::Flower(_) => None,
        }
    }

    /// Name of the request field that carries this kind of reference.
    pub fn field(&self) -> &'static str {
        match self {
            ProductRef::Flower(_) => "flower",
            ProductRef::Bouquet(_) => "bouquet",
        }
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field(), self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flower {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub in_stock: bool,
    pub eligible_for_individual_sale: bool,
    pub created_at: DateTime<Utc>,
}

impl Flower {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            price,
            description: None,
            in_stock: true,
            eligible_for_individual_sale: true,
            created_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub fn out_of_stock(mut self) -> Self {
        self.in_stock = false;
        self
    }

    pub fn bouquet_only(mut self) -> Self {
        self.eligible_for_individual_sale = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BouquetCategory {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// One flower kind inside a bouquet, with how many stems of it are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BouquetComponent {
    pub flower: Flower,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bouquet {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub components: Vec<BouquetComponent>,
    pub categories: Vec<BouquetCategory>,
    pub created_at: DateTime<Utc>,
}

impl Bouquet {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            price,
            description: None,
            components: Vec::new(),
            categories: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_flower(mut self, flower: Flower, quantity: u32) -> Self {
        self.components.push(BouquetComponent { flower, quantity });
        self
    }

    /// A bouquet can be sold only while every flower it is made of is in stock.
    pub fn in_stock(&self) -> bool {
        self.components.iter().all(|c| c.flower.in_stock)
    }
}

/// A sellable product resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Product {
    Flower(Flower),
    Bouquet(Bouquet),
}

impl Product {
    pub fn reference(&self) -> ProductRef {
        match self {
            Product::Flower(f) => ProductRef::Flower(f.id),
            Product::Bouquet(b) => ProductRef::Bouquet(b.id),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Product::Flower(f) => &f.name,
            Product::Bouquet(b) => &b.name,
        }
    }

    pub fn unit_price(&self) -> Decimal {
        match self {
            Product::Flower(f) => f.price,
            Product::Bouquet(b) => b.price,
        }
    }

    pub fn max_order_quantity(&self) -> u32 {
        match self {
            Product::Flower(_) => FLOWER_MAX_ORDER_QUANTITY,
            Product::Bouquet(_) => BOUQUET_MAX_ORDER_QUANTITY,
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Product::Flower(f) => f.in_stock,
            Product::Bouquet(b) => b.in_stock(),
        }
    }

    /// Whether the product may appear on its own line item.
    /// Bouquets always may; flowers only when flagged for individual sale.
    pub fn sold_individually(&self) -> bool {
        match self {
            Product::Flower(f) => f.eligible_for_individual_sale,
            Product::Bouquet(_) => true,
        }
    }

    pub fn price_for(&self, quantity: u32) -> Decimal {
        self.unit_price() * Decimal::from(quantity)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bouquet_in_stock_requires_every_component() {
        let rose = Flower::new("Rose", Decimal::new(500, 2));
        let tulip = Flower::new("Tulip", Decimal::new(300, 2)).out_of_stock();

        let fresh = Bouquet::new("Roses", Decimal::new(4000, 2)).with_flower(rose.clone(), 7);
        assert!(fresh.in_stock());

        let wilted = Bouquet::new("Spring", Decimal::new(6000, 2))
            .with_flower(rose, 3)
            .with_flower(tulip, 5);
        assert!(!wilted.in_stock());
        assert!(!Product::Bouquet(wilted).is_available());
    }

    #[test]
    fn test_empty_bouquet_is_available() {
        let bouquet = Bouquet::new("Greens", Decimal::new(1000, 2));
        assert!(Product::Bouquet(bouquet).is_available());
    }

    #[test]
    fn test_max_order_quantity_by_variant() {
        let flower = Product::Flower(Flower::new("Lily", Decimal::new(700, 2)));
        let bouquet = Product::Bouquet(Bouquet::new("Lilies", Decimal::new(5000, 2)));

        assert_eq!(flower.max_order_quantity(), 10_000);
        assert_eq!(bouquet.max_order_quantity(), 50);
    }

    #[test]
    fn test_price_for_quantity() {
        let flower = Product::Flower(Flower::new("Tulip", Decimal::new(500, 2)));
        assert_eq!(flower.price_for(5), Decimal::new(2500, 2));
    }

    #[test]
    fn test_only_flowers_can_be_restricted_to_bouquets() {
        let flower = Product::Flower(Flower::new("Gypsophila", Decimal::ONE).bouquet_only());
        let bouquet = Product::Bouquet(Bouquet::new("Mix", Decimal::TEN));

        assert!(!flower.sold_individually());
        assert!(bouquet.sold_individually());
    }

    #[test]
    fn test_product_ref_accessors() {
        let id = Uuid::new_v4();
        let flower = ProductRef::Flower(id);
        assert_eq!(flower.flower_id(), Some(id));
        assert_eq!(flower.bouquet_id(), None);
        assert_eq!(flower.field(), "flower");
        assert_eq!(flower.to_string(), format!("flower {}", id));
    }

    #[test]
    fn test_product_ref_serialization() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(ProductRef::Bouquet(id)).unwrap();
        assert_eq!(json["type"], "bouquet");
        assert_eq!(json["id"], id.to_string());
    }
}
