use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::domain::catalog::{Bouquet, Flower, Product, ProductRef};
use crate::domain::order::{DeliveryDetails, LineItem, Order, OrderStatus, Payment};

use super::{OrderStore, OrderTx, Result, StoreError};

// ============================================================================
// In-memory order store
// ============================================================================
//
// Transactions hold the store-wide lock for their whole lifetime and work on
// a copy of the state; `commit` swaps the copy in. That gives serializable
// isolation and rollback-on-drop with no extra bookkeeping. Product lookups
// read the attached catalog.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: BTreeMap<Uuid, Order>,
    items: Vec<LineItem>,
    payments: Vec<Payment>,
}

#[derive(Clone)]
pub struct MemoryOrderStore {
    state: Arc<Mutex<MemoryState>>,
    catalog: MemoryCatalog,
}

impl MemoryOrderStore {
    pub fn new(catalog: MemoryCatalog) -> Self {
        Self {
            state: Arc::default(),
            catalog,
        }
    }

    /// Insert a line item bypassing the (order, product) uniqueness check, to
    /// reproduce rows written before the constraint existed.
    #[cfg(test)]
    pub(crate) async fn force_insert_item(&self, item: LineItem) {
        self.state.lock().await.items.push(item);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn begin(&self) -> Result<Box<dyn OrderTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryOrderTx {
            guard,
            working,
            catalog: self.catalog.clone(),
        }))
    }
}

pub struct MemoryOrderTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    catalog: MemoryCatalog,
}

impl MemoryOrderTx {
    fn order_mut(&mut self, order_id: Uuid) -> Result<&mut Order> {
        self.working
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::Corrupt(format!("order {order_id} vanished mid-transaction")))
    }
}

#[async_trait]
impl OrderTx for MemoryOrderTx {
    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        self.get_order(order_id).await
    }

    async fn get_order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn orders_for_user(&mut self, user_id: Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|o| o.is_owned_by(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_empty_cart(&mut self, user_id: Uuid) -> Result<Option<Order>> {
        let items = &self.working.items;
        Ok(self
            .working
            .orders
            .values()
            .filter(|o| o.is_owned_by(user_id) && o.status == OrderStatus::WaitingPayment)
            .filter(|o| !items.iter().any(|i| i.order_id == o.id))
            .min_by_key(|o| o.created_at)
            .cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.working.orders.contains_key(&order.id) {
            return Err(StoreError::UniqueViolation("orders_pkey".to_string()));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order_details(&mut self, order_id: Uuid, details: &DeliveryDetails) -> Result<()> {
        let order = self.order_mut(order_id)?;
        order.details = details.clone();
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> Result<()> {
        self.order_mut(order_id)?.status = status;
        Ok(())
    }

    async fn delete_order(&mut self, order_id: Uuid) -> Result<()> {
        self.working.orders.remove(&order_id);
        self.working.items.retain(|i| i.order_id != order_id);
        self.working.payments.retain(|p| p.order_id != order_id);
        Ok(())
    }

    async fn items(&mut self, order_id: Uuid) -> Result<Vec<LineItem>> {
        Ok(self
            .working
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn items_for_product(&mut self, order_id: Uuid, product: ProductRef) -> Result<Vec<LineItem>> {
        Ok(self
            .working
            .items
            .iter()
            .filter(|i| i.order_id == order_id && i.product == product)
            .cloned()
            .collect())
    }

    async fn insert_item(&mut self, item: &LineItem) -> Result<()> {
        let duplicate = self
            .working
            .items
            .iter()
            .any(|i| i.order_id == item.order_id && i.product == item.product);
        if duplicate {
            let constraint = match item.product {
                ProductRef::Flower(_) => "order_items_order_flower_key",
                ProductRef::Bouquet(_) => "order_items_order_bouquet_key",
            };
            return Err(StoreError::UniqueViolation(constraint.to_string()));
        }
        self.working.items.push(item.clone());
        Ok(())
    }

    async fn product(&mut self, product: ProductRef) -> Result<Option<Product>> {
        Ok(self.catalog.product(product).await)
    }

    async fn update_item_quantity(&mut self, item_id: Uuid, quantity: u32) -> Result<()> {
        if let Some(item) = self.working.items.iter_mut().find(|i| i.id == item_id) {
            item.quantity = quantity;
        }
        Ok(())
    }

    async fn delete_items(&mut self, item_ids: &[Uuid]) -> Result<()> {
        self.working.items.retain(|i| !item_ids.contains(&i.id));
        Ok(())
    }

    async fn payments(&mut self, order_id: Uuid) -> Result<Vec<Payment>> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryOrderTx { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }
}

// ============================================================================
// In-memory catalog
// ============================================================================

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    flowers: Arc<RwLock<HashMap<Uuid, Flower>>>,
    bouquets: Arc<RwLock<HashMap<Uuid, Bouquet>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_flower(&self, flower: Flower) -> ProductRef {
        let id = flower.id;
        self.flowers.write().await.insert(id, flower);
        ProductRef::Flower(id)
    }

    /// Component flowers are registered too, so later stock changes reach the bouquet.
    pub async fn add_bouquet(&self, bouquet: Bouquet) -> ProductRef {
        let id = bouquet.id;
        {
            let mut flowers = self.flowers.write().await;
            for component in &bouquet.components {
                flowers
                    .entry(component.flower.id)
                    .or_insert_with(|| component.flower.clone());
            }
        }
        self.bouquets.write().await.insert(id, bouquet);
        ProductRef::Bouquet(id)
    }

    /// A handful of products so a database-less run has something to sell.
    pub async fn seed_sample(&self) {
        let rose = Flower::new("Red rose", Decimal::new(850, 2));
        let tulip = Flower::new("Yellow tulip", Decimal::new(450, 2));
        let eucalyptus = Flower::new("Eucalyptus", Decimal::new(300, 2)).bouquet_only();

        self.add_flower(rose.clone()).await;
        self.add_flower(tulip.clone()).await;
        self.add_bouquet(
            Bouquet::new("Spring mix", Decimal::new(12900, 2))
                .with_flower(rose, 5)
                .with_flower(tulip, 7)
                .with_flower(eucalyptus, 3),
        )
        .await;
    }

    #[cfg(test)]
    pub async fn set_in_stock(&self, flower_id: Uuid, in_stock: bool) {
        if let Some(flower) = self.flowers.write().await.get_mut(&flower_id) {
            flower.in_stock = in_stock;
        }
    }

    /// Bouquet components reflect the current state of their flowers.
    pub async fn product(&self, product: ProductRef) -> Option<Product> {
        match product {
            ProductRef::Flower(id) => self.flowers.read().await.get(&id).cloned().map(Product::Flower),
            ProductRef::Bouquet(id) => {
                let mut bouquet = self.bouquets.read().await.get(&id).cloned()?;
                let flowers = self.flowers.read().await;
                for component in &mut bouquet.components {
                    if let Some(current) = flowers.get(&component.flower.id) {
                        component.flower = current.clone();
                    }
                }
                Some(Product::Bouquet(bouquet))
            }
        }
    }
}
