use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::catalog::{Product, ProductRef};
use crate::metrics::Metrics;
use crate::store::{OrderStore, OrderTx};
use crate::utils::{retry_on_transient, RetryConfig};

use super::commands::{AddLineItem, PayOrder, TransitionStatus, UpdateLineItem, UpdateOrderDetails};
use super::errors::OrderError;
use super::validation;
use super::value_objects::{LineItem, Order, OrderStatus, Payment};
use super::views::{LineItemView, OrderView};

type Result<T> = std::result::Result<T, OrderError>;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Validation → Transaction (order row locked) → Commit
//
// Every operation takes the acting user explicitly and runs inside its own
// store transaction. Products are read through that same transaction, so one
// request never holds more than one connection. Orders owned by someone else
// are reported as not found.
//
// ============================================================================

pub struct OrderCommandHandler {
    store: Arc<dyn OrderStore>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl OrderCommandHandler {
    pub fn new(store: Arc<dyn OrderStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            retry: RetryConfig::single_retry(),
        }
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Reuse the user's open empty cart or start a new one.
    /// The flag is true when a new order was created.
    pub async fn open_cart(&self, user_id: Uuid) -> Result<(Order, bool)> {
        self.instrumented("open_cart", async {
            let mut tx = self.store.begin().await?;

            if let Some(order) = tx.find_empty_cart(user_id).await? {
                debug!(%user_id, order_id = %order.id, "Reusing empty cart");
                return Ok((order, false));
            }

            let order = Order::new(user_id);
            tx.insert_order(&order).await?;
            tx.commit().await?;

            info!(%user_id, order_id = %order.id, "Cart opened");
            Ok((order, true))
        })
        .await
    }

    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<OrderView>> {
        let mut tx = self.store.begin().await?;
        let orders = tx.orders_for_user(user_id).await?;

        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            views.push(self.order_view(tx.as_mut(), order).await?);
        }
        Ok(views)
    }

    pub async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView> {
        let mut tx = self.store.begin().await?;
        let order = visible_order(tx.as_mut(), user_id, order_id).await?;
        self.order_view(tx.as_mut(), order).await
    }

    pub async fn update_order_details(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        update: UpdateOrderDetails,
    ) -> Result<OrderView> {
        self.instrumented("update_order_details", async {
            let mut tx = self.store.begin().await?;
            let order = locked_order(tx.as_mut(), user_id, order_id).await?;
            validation::ensure_mutable(&order)?;

            let details = validation::apply_details(&order.details, &update)?;
            tx.update_order_details(order_id, &details).await?;

            let order = tx
                .get_order(order_id)
                .await?
                .ok_or_else(|| OrderError::order_not_found(order_id))?;
            let view = self.order_view(tx.as_mut(), order).await?;
            tx.commit().await?;

            info!(%order_id, "Order details updated");
            Ok(view)
        })
        .await
    }

    /// Only an unpaid order can be thrown away.
    pub async fn delete_order(&self, user_id: Uuid, order_id: Uuid) -> Result<()> {
        self.instrumented("delete_order", async {
            let mut tx = self.store.begin().await?;
            let order = locked_order(tx.as_mut(), user_id, order_id).await?;

            if order.status != OrderStatus::WaitingPayment {
                return Err(OrderError::InvalidState(format!(
                    "Order is {} and can no longer be deleted",
                    order.status
                )));
            }

            tx.delete_order(order_id).await?;
            tx.commit().await?;

            info!(%order_id, "Order deleted");
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Line items
    // ========================================================================

    pub async fn list_line_items(&self, user_id: Uuid, order_id: Uuid) -> Result<Vec<LineItemView>> {
        let mut tx = self.store.begin().await?;
        visible_order(tx.as_mut(), user_id, order_id).await?;
        self.item_views(tx.as_mut(), order_id).await
    }

    pub async fn get_line_item(&self, user_id: Uuid, order_id: Uuid, item_id: Uuid) -> Result<LineItemView> {
        let mut tx = self.store.begin().await?;
        visible_order(tx.as_mut(), user_id, order_id).await?;
        let item = order_item(tx.as_mut(), order_id, item_id).await?;
        let product = find_product(tx.as_mut(), item.product).await?;
        Ok(LineItemView::new(&item, &product))
    }

    /// Add a product to an order, folding it into the line that already holds
    /// that product. A lost race on the (order, product) uniqueness constraint
    /// is retried once, and the retry merges into the winner's row.
    pub async fn add_line_item(&self, user_id: Uuid, order_id: Uuid, command: AddLineItem) -> Result<LineItemView> {
        let this = self;
        let command = &command;

        self.instrumented("add_line_item", async {
            let (view, merged) = retry_on_transient(self.retry.clone(), move |attempt| async move {
                if attempt > 1 {
                    this.metrics.record_merge_retry();
                }
                this.try_add_line_item(user_id, order_id, command).await
            })
            .await?;

            self.metrics.record_line_item(merged);
            Ok(view)
        })
        .await
    }

    async fn try_add_line_item(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        command: &AddLineItem,
    ) -> Result<(LineItemView, bool)> {
        let reference = validation::product_reference(command)?;

        let mut tx = self.store.begin().await?;
        let order = locked_order(tx.as_mut(), user_id, order_id).await?;
        validation::ensure_mutable(&order)?;

        let product = find_product(tx.as_mut(), reference).await?;
        validation::ensure_in_stock(&product)?;
        validation::validate_line_item(&product, command.quantity)?;

        let existing = tx.items_for_product(order_id, reference).await?;

        let Some((survivor, duplicates)) = existing.split_first() else {
            let item = LineItem::new(order_id, reference, command.quantity);
            tx.insert_item(&item).await?;
            tx.commit().await?;

            info!(%order_id, item_id = %item.id, product = %reference, quantity = item.quantity, "Line item created");
            return Ok((LineItemView::new(&item, &product), false));
        };

        let quantity = existing
            .iter()
            .fold(command.quantity, |total, item| total.saturating_add(item.quantity));
        validation::validate_quantity(&product, quantity)?;

        if !duplicates.is_empty() {
            warn!(
                %order_id,
                product = %reference,
                duplicates = duplicates.len(),
                "Collapsing duplicate line items"
            );
            let ids: Vec<Uuid> = duplicates.iter().map(|item| item.id).collect();
            tx.delete_items(&ids).await?;
        }

        tx.update_item_quantity(survivor.id, quantity).await?;
        tx.commit().await?;

        let item = LineItem {
            quantity,
            ..survivor.clone()
        };
        info!(%order_id, item_id = %item.id, product = %reference, quantity, "Line item merged");
        Ok((LineItemView::new(&item, &product), true))
    }

    /// Change the quantity of an existing line. The product itself is fixed.
    pub async fn update_line_item(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        item_id: Uuid,
        update: UpdateLineItem,
    ) -> Result<LineItemView> {
        self.instrumented("update_line_item", async {
            let mut tx = self.store.begin().await?;
            let order = locked_order(tx.as_mut(), user_id, order_id).await?;
            validation::ensure_mutable(&order)?;

            let mut item = order_item(tx.as_mut(), order_id, item_id).await?;
            let product = find_product(tx.as_mut(), item.product).await?;
            validation::validate_line_item(&product, update.quantity)?;

            tx.update_item_quantity(item_id, update.quantity).await?;
            tx.commit().await?;

            item.quantity = update.quantity;
            info!(%order_id, %item_id, quantity = item.quantity, "Line item updated");
            Ok(LineItemView::new(&item, &product))
        })
        .await
    }

    pub async fn remove_line_item(&self, user_id: Uuid, order_id: Uuid, item_id: Uuid) -> Result<()> {
        self.instrumented("remove_line_item", async {
            let mut tx = self.store.begin().await?;
            let order = locked_order(tx.as_mut(), user_id, order_id).await?;
            validation::ensure_mutable(&order)?;

            order_item(tx.as_mut(), order_id, item_id).await?;
            tx.delete_items(&[item_id]).await?;
            tx.commit().await?;

            info!(%order_id, %item_id, "Line item removed");
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Payment and status
    // ========================================================================

    /// The only way an order moves from `waiting_payment` to `paid`.
    pub async fn complete_payment(&self, user_id: Uuid, order_id: Uuid, command: PayOrder) -> Result<Payment> {
        self.instrumented("complete_payment", async {
            let mut tx = self.store.begin().await?;
            let order = locked_order(tx.as_mut(), user_id, order_id).await?;

            if order.status != OrderStatus::WaitingPayment {
                return Err(OrderError::InvalidState(format!(
                    "Order is {}: already paid or cannot be paid",
                    order.status
                )));
            }

            let items = tx.items(order_id).await?;
            if items.is_empty() {
                return Err(OrderError::EmptyOrder);
            }

            for item in &items {
                match tx.product(item.product).await? {
                    Some(product) => validation::ensure_available(&product)?,
                    None => return Err(OrderError::ProductUnavailable(item.product)),
                }
            }

            let payment = Payment::completed(order_id, command.method);
            tx.insert_payment(&payment).await?;
            tx.update_order_status(order_id, OrderStatus::Paid).await?;
            tx.commit().await?;

            self.metrics.record_payment(command.method.as_str());
            info!(%order_id, payment_id = %payment.id, method = %command.method.as_str(), "Order paid");
            Ok(payment)
        })
        .await
    }

    /// Back-office progression: preparation, delivery, cancellation, refund.
    pub async fn transition_status(&self, order_id: Uuid, command: TransitionStatus) -> Result<Order> {
        let next = command.status;
        self.instrumented("transition_status", async {
            let mut tx = self.store.begin().await?;
            let mut order = tx
                .lock_order(order_id)
                .await?
                .ok_or_else(|| OrderError::order_not_found(order_id))?;

            if order.status.is_terminal() {
                return Err(OrderError::InvalidState(format!(
                    "Order is {} and its status is final",
                    order.status
                )));
            }
            if next == OrderStatus::Paid {
                return Err(OrderError::InvalidState(
                    "Orders become paid only by completing a payment".to_string(),
                ));
            }
            if !order.status.can_transition_to(next) {
                return Err(OrderError::InvalidState(format!(
                    "Cannot move order from {} to {}",
                    order.status, next
                )));
            }

            tx.update_order_status(order_id, next).await?;
            tx.commit().await?;

            info!(%order_id, from = %order.status, to = %next, "Order status changed");
            order.status = next;
            Ok(order)
        })
        .await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn instrumented<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = work.await;
        self.metrics.observe_duration(operation, started.elapsed().as_secs_f64());

        if let Err(error) = &result {
            self.metrics.record_rejection(operation, error.code());
            warn!(operation, code = error.code(), error = %error, "Order operation rejected");
        }
        result
    }

    async fn item_views(&self, tx: &mut dyn OrderTx, order_id: Uuid) -> Result<Vec<LineItemView>> {
        let items = tx.items(order_id).await?;
        let mut views = Vec::with_capacity(items.len());
        for item in &items {
            let product = find_product(tx, item.product).await?;
            views.push(LineItemView::new(item, &product));
        }
        Ok(views)
    }

    async fn order_view(&self, tx: &mut dyn OrderTx, order: Order) -> Result<OrderView> {
        let items = self.item_views(tx, order.id).await?;
        let payments = tx.payments(order.id).await?;
        Ok(OrderView::new(order, items, payments))
    }
}

async fn find_product(tx: &mut dyn OrderTx, reference: ProductRef) -> Result<Product> {
    tx.product(reference)
        .await?
        .ok_or_else(|| OrderError::product_not_found(reference))
}

async fn visible_order(tx: &mut dyn OrderTx, user_id: Uuid, order_id: Uuid) -> Result<Order> {
    match tx.get_order(order_id).await? {
        Some(order) if order.is_owned_by(user_id) => Ok(order),
        _ => Err(OrderError::order_not_found(order_id)),
    }
}

/// Like `visible_order`, but the row stays locked until the transaction ends.
async fn locked_order(tx: &mut dyn OrderTx, user_id: Uuid, order_id: Uuid) -> Result<Order> {
    match tx.lock_order(order_id).await? {
        Some(order) if order.is_owned_by(user_id) => Ok(order),
        _ => Err(OrderError::order_not_found(order_id)),
    }
}

async fn order_item(tx: &mut dyn OrderTx, order_id: Uuid, item_id: Uuid) -> Result<LineItem> {
    tx.items(order_id)
        .await?
        .into_iter()
        .find(|item| item.id == item_id)
        .ok_or_else(|| OrderError::item_not_found(item_id))
}

// ============================================================================
// Unit Tests
// ============================================================================
