use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

use crate::settings::DatabaseSettings;
use crate::domain::catalog::{Bouquet, BouquetCategory, BouquetComponent, Flower, Product, ProductRef};
use crate::domain::order::{DeliveryDetails, DeliveryMethod, LineItem, Order, OrderStatus, Payment};

use super::{OrderStore, OrderTx, Result, StoreError};

// ============================================================================
// PostgreSQL order store
// ============================================================================
//
// - `lock_order` uses SELECT ... FOR UPDATE, so merges and payments on the
//   same order queue behind each other
// - partial unique indexes on (order_id, flower_id) and (order_id, bouquet_id)
//   back the one-line-per-product rule
// - only the columns an operation changes are written
// - catalog reads run on the transaction's own connection, so a request
//   never waits on the pool for a second one
//
// ============================================================================

const ORDER_COLUMNS: &str = "id, user_id, status, delivery_method, notes, address_line1, \
                             address_line2, city, postal_code, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, flower_id, bouquet_id, quantity";

const PAYMENT_COLUMNS: &str = "id, order_id, method, status, created_at, completed_at";

/// Open the connection pool and, if configured, bring the schema up to date.
pub async fn connect(settings: &DatabaseSettings, url: &str) -> Result<PgPool> {
    tracing::info!(max_connections = settings.max_connections, "Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(url)
        .await?;

    if settings.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Option<Uuid>,
    status: String,
    delivery_method: Option<String>,
    notes: Option<String>,
    address_line1: Option<String>,
    address_line2: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self> {
        let delivery_method = row
            .delivery_method
            .map(|m| m.parse::<DeliveryMethod>())
            .transpose()
            .map_err(StoreError::Corrupt)?;

        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            details: DeliveryDetails {
                delivery_method,
                notes: row.notes,
                address_line1: row.address_line1,
                address_line2: row.address_line2,
                city: row.city,
                postal_code: row.postal_code,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineItemRow {
    id: Uuid,
    order_id: Uuid,
    flower_id: Option<Uuid>,
    bouquet_id: Option<Uuid>,
    quantity: i32,
}

impl TryFrom<LineItemRow> for LineItem {
    type Error = StoreError;

    fn try_from(row: LineItemRow) -> Result<Self> {
        let product = match (row.flower_id, row.bouquet_id) {
            (Some(id), None) => ProductRef::Flower(id),
            (None, Some(id)) => ProductRef::Bouquet(id),
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "order item {} must reference exactly one product",
                    row.id
                )))
            }
        };
        let quantity = u32::try_from(row.quantity)
            .map_err(|_| StoreError::Corrupt(format!("order item {} has quantity {}", row.id, row.quantity)))?;

        Ok(LineItem {
            id: row.id,
            order_id: row.order_id,
            product,
            quantity,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    method: String,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            method: row.method.parse().map_err(StoreError::Corrupt)?,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| StoreError::Corrupt(format!("quantity {quantity} out of range")))
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn begin(&self) -> Result<Box<dyn OrderTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgOrderTx { tx }))
    }
}

pub struct PgOrderTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTx for PgOrderTx {
    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let row: Option<OrderRow> = sqlx::query_as(&query)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn get_order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&query)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn orders_for_user(&mut self, user_id: Uuid) -> Result<Vec<Order>> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&query)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        convert(rows)
    }

    async fn find_empty_cart(&mut self, user_id: Uuid) -> Result<Option<Order>> {
        // Serialize cart lookups of one user until this transaction ends, so two
        // concurrent "open cart" calls cannot both miss and both create.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders o \
             WHERE o.user_id = $1 AND o.status = $2 \
               AND NOT EXISTS (SELECT 1 FROM order_items i WHERE i.order_id = o.id) \
             ORDER BY o.created_at LIMIT 1"
        );
        let row: Option<OrderRow> = sqlx::query_as(&query)
            .bind(user_id)
            .bind(OrderStatus::WaitingPayment.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let details = &order.details;
        sqlx::query(
            "INSERT INTO orders (id, user_id, status, delivery_method, notes, address_line1, \
             address_line2, city, postal_code, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.status.as_str())
        .bind(details.delivery_method.map(|m| m.as_str()))
        .bind(&details.notes)
        .bind(&details.address_line1)
        .bind(&details.address_line2)
        .bind(&details.city)
        .bind(&details.postal_code)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order_details(&mut self, order_id: Uuid, details: &DeliveryDetails) -> Result<()> {
        sqlx::query(
            "UPDATE orders SET delivery_method = $2, notes = $3, address_line1 = $4, \
             address_line2 = $5, city = $6, postal_code = $7, updated_at = now() \
             WHERE id = $1",
        )
        .bind(order_id)
        .bind(details.delivery_method.map(|m| m.as_str()))
        .bind(&details.notes)
        .bind(&details.address_line1)
        .bind(&details.address_line2)
        .bind(&details.city)
        .bind(&details.postal_code)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_order(&mut self, order_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn items(&mut self, order_id: Uuid) -> Result<Vec<LineItem>> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id");
        let rows: Vec<LineItemRow> = sqlx::query_as(&query)
            .bind(order_id)
            .fetch_all(&mut *self.tx)
            .await?;
        convert(rows)
    }

    async fn items_for_product(&mut self, order_id: Uuid, product: ProductRef) -> Result<Vec<LineItem>> {
        let column = match product {
            ProductRef::Flower(_) => "flower_id",
            ProductRef::Bouquet(_) => "bouquet_id",
        };
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 AND {column} = $2 ORDER BY id"
        );
        let rows: Vec<LineItemRow> = sqlx::query_as(&query)
            .bind(order_id)
            .bind(product.id())
            .fetch_all(&mut *self.tx)
            .await?;
        convert(rows)
    }

    async fn insert_item(&mut self, item: &LineItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, flower_id, bouquet_id, quantity) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(item.id)
        .bind(item.order_id)
        .bind(item.product.flower_id())
        .bind(item.product.bouquet_id())
        .bind(db_quantity(item.quantity)?)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn product(&mut self, product: ProductRef) -> Result<Option<Product>> {
        match product {
            ProductRef::Flower(id) => Ok(fetch_flower(&mut self.tx, id).await?.map(Product::Flower)),
            ProductRef::Bouquet(id) => Ok(fetch_bouquet(&mut self.tx, id).await?.map(Product::Bouquet)),
        }
    }

    async fn update_item_quantity(&mut self, item_id: Uuid, quantity: u32) -> Result<()> {
        sqlx::query("UPDATE order_items SET quantity = $2 WHERE id = $1")
            .bind(item_id)
            .bind(db_quantity(quantity)?)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_items(&mut self, item_ids: &[Uuid]) -> Result<()> {
        if item_ids.is_empty() {
            return Ok(());
        }
        sqlx::query("DELETE FROM order_items WHERE id = ANY($1)")
            .bind(item_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn payments(&mut self, order_id: Uuid) -> Result<Vec<Payment>> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at"
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&query)
            .bind(order_id)
            .fetch_all(&mut *self.tx)
            .await?;
        convert(rows)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            "INSERT INTO payments (id, order_id, method, status, created_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.completed_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// PostgreSQL catalog
// ============================================================================

#[derive(sqlx::FromRow)]
struct FlowerRow {
    id: Uuid,
    name: String,
    price: Decimal,
    description: Option<String>,
    in_stock: bool,
    eligible_for_individual_sale: bool,
    created_at: DateTime<Utc>,
}

impl From<FlowerRow> for Flower {
    fn from(row: FlowerRow) -> Self {
        Flower {
            id: row.id,
            name: row.name,
            price: row.price,
            description: row.description,
            in_stock: row.in_stock,
            eligible_for_individual_sale: row.eligible_for_individual_sale,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ComponentRow {
    #[sqlx(flatten)]
    flower: FlowerRow,
    quantity: i32,
}

impl TryFrom<ComponentRow> for BouquetComponent {
    type Error = StoreError;

    fn try_from(row: ComponentRow) -> Result<Self> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            StoreError::Corrupt(format!("bouquet component {} has quantity {}", row.flower.id, row.quantity))
        })?;
        Ok(BouquetComponent {
            flower: row.flower.into(),
            quantity,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BouquetRow {
    id: Uuid,
    name: String,
    price: Decimal,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
}

async fn fetch_flower(conn: &mut PgConnection, id: Uuid) -> Result<Option<Flower>> {
    let row: Option<FlowerRow> = sqlx::query_as(
        "SELECT id, name, price, description, in_stock, eligible_for_individual_sale, created_at \
         FROM flowers WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Flower::from))
}

async fn fetch_bouquet(conn: &mut PgConnection, id: Uuid) -> Result<Option<Bouquet>> {
    let row: Option<BouquetRow> = sqlx::query_as(
        "SELECT id, name, price, description, created_at FROM bouquets WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let components: Vec<ComponentRow> = sqlx::query_as(
        "SELECT f.id, f.name, f.price, f.description, f.in_stock, \
                f.eligible_for_individual_sale, f.created_at, bf.quantity \
         FROM bouquet_flowers bf JOIN flowers f ON f.id = bf.flower_id \
         WHERE bf.bouquet_id = $1 ORDER BY f.name",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let categories: Vec<CategoryRow> = sqlx::query_as(
        "SELECT c.id, c.name, c.slug \
         FROM bouquet_categories c JOIN bouquet_category_links l ON l.category_id = c.id \
         WHERE l.bouquet_id = $1 ORDER BY c.name",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(Bouquet {
        id: row.id,
        name: row.name,
        price: row.price,
        description: row.description,
        components: convert(components)?,
        categories: categories
            .into_iter()
            .map(|c| BouquetCategory {
                id: c.id,
                name: c.name,
                slug: c.slug,
            })
            .collect(),
        created_at: row.created_at,
    }))
}
