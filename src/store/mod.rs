// ============================================================================
// Persistence - transactional order store and catalog lookup
// ============================================================================
//
// The order workflow talks to storage only through these traits:
// - `OrderStore` hands out transactions (`OrderTx`)
// - `OrderTx` reads and writes orders, line items and payments, and resolves
//   product references on the same connection
//
// A transaction that is dropped without `commit` is rolled back.
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::{MemoryCatalog, MemoryOrderStore};
pub use postgres::{connect, PgOrderStore};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::{Product, ProductRef};
use crate::domain::order::{DeliveryDetails, LineItem, Order, OrderStatus, Payment};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.constraint().unwrap_or("unknown").to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn OrderTx>>;
}

#[async_trait]
pub trait OrderTx: Send {
    /// Read an order and hold a write lock on it until the transaction ends.
    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>>;

    async fn get_order(&mut self, order_id: Uuid) -> Result<Option<Order>>;

    async fn orders_for_user(&mut self, user_id: Uuid) -> Result<Vec<Order>>;

    /// Oldest `waiting_payment` order of the user that has no line items.
    async fn find_empty_cart(&mut self, user_id: Uuid) -> Result<Option<Order>>;

    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn update_order_details(&mut self, order_id: Uuid, details: &DeliveryDetails) -> Result<()>;

    /// Writes the status column only.
    async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> Result<()>;

    async fn delete_order(&mut self, order_id: Uuid) -> Result<()>;

    async fn items(&mut self, order_id: Uuid) -> Result<Vec<LineItem>>;

    /// Every line of the order that references `product`, oldest first.
    async fn items_for_product(&mut self, order_id: Uuid, product: ProductRef) -> Result<Vec<LineItem>>;

    /// Fails with `StoreError::UniqueViolation` if the order already has a line for the product.
    async fn insert_item(&mut self, item: &LineItem) -> Result<()>;

    /// Current price, limits and stock of a product, or `None` if it does not exist.
    async fn product(&mut self, product: ProductRef) -> Result<Option<Product>>;

    async fn update_item_quantity(&mut self, item_id: Uuid, quantity: u32) -> Result<()>;

    async fn delete_items(&mut self, item_ids: &[Uuid]) -> Result<()>;

    async fn payments(&mut self, order_id: Uuid) -> Result<Vec<Payment>>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};

    #[derive(Debug)]
    struct ConstraintError {
        unique: bool,
        constraint: Option<&'static str>,
    }

    impl std::fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "constraint violated")
        }
    }

    impl std::error::Error for ConstraintError {}

    impl DatabaseError for ConstraintError {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::CheckViolation
            }
        }
    }

    #[test]
    fn test_unique_violation_keeps_constraint_name() {
        let err = StoreError::from(sqlx::Error::from(ConstraintError {
            unique: true,
            constraint: Some("order_items_order_flower_key"),
        }));
        match err {
            StoreError::UniqueViolation(constraint) => assert_eq!(constraint, "order_items_order_flower_key"),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[test]
    fn test_unnamed_unique_violation() {
        let err = StoreError::from(sqlx::Error::from(ConstraintError {
            unique: true,
            constraint: None,
        }));
        assert!(matches!(err, StoreError::UniqueViolation(name) if name == "unknown"));
    }

    #[test]
    fn test_other_database_errors_stay_database_errors() {
        let check = StoreError::from(sqlx::Error::from(ConstraintError {
            unique: false,
            constraint: Some("order_items_quantity_check"),
        }));
        assert!(matches!(check, StoreError::Database(_)));

        let timeout = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(timeout, StoreError::Database(sqlx::Error::PoolTimedOut)));
    }
}
