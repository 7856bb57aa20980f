//! PostgreSQL order store.

use async_trait::async_trait;
use domain::{NewOrder, Order, OrderItem, OrderPatch, OrderStatus, order::record::now};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Committed, OrderId, OutboxEntry, OutboxId, OutboxKind, Result, StoreError, Version,
    store::OrderStore,
};

const ORDER_COLUMNS: &str = "id, items, status, total_cents, version, created_at, updated_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let items_json: serde_json::Value = row.try_get("items")?;
        let items: Vec<OrderItem> = serde_json::from_value(items_json)?;
        let total_cents: i64 = row.try_get("total_cents")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            items,
            status: OrderStatus::new(row.try_get::<String, _>("status")?),
            total: domain::Money::from_cents(total_cents),
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_outbox(row: PgRow) -> Result<OutboxEntry> {
        let kind: String = row.try_get("kind")?;
        let kind = OutboxKind::parse(&kind).ok_or_else(|| {
            StoreError::Serialization(serde_json::Error::io(std::io::Error::other(format!(
                "unknown outbox kind '{kind}'"
            ))))
        })?;
        let attempts: i32 = row.try_get("attempts")?;

        Ok(OutboxEntry {
            id: OutboxId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            kind,
            created_at: row.try_get("created_at")?,
            attempts: u32::try_from(attempts).unwrap_or_default(),
            last_error: row.try_get("last_error")?,
            delivered_at: row.try_get("delivered_at")?,
        })
    }

    async fn insert_outbox(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        kind: OutboxKind,
    ) -> Result<OutboxId> {
        let entry = OutboxEntry::new(order_id, kind, now());

        sqlx::query(
            r#"
            INSERT INTO order_outbox (id, order_id, kind, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(order_id.as_uuid())
        .bind(kind.as_str())
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(entry.id)
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, input))]
    async fn create(&self, input: NewOrder) -> Result<Committed<Order>> {
        let order = Order::create(OrderId::new(), input, now());
        let items_json = serde_json::to_value(&order.items)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, items, status, total_cents, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(items_json)
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(order.version.as_i64())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        let outbox_id = Self::insert_outbox(&mut tx, order.id, OutboxKind::Created).await?;

        tx.commit().await?;
        Ok(Committed::new(order, outbox_id))
    }

    async fn get(&self, id: OrderId) -> Result<Order> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<Committed<Order>> {
        let mut tx = self.pool.begin().await?;

        // Row lock held until commit; concurrent writers of this id queue here.
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let mut order = match row {
            Some(row) => Self::row_to_order(row)?,
            None => return Err(StoreError::NotFound(id)),
        };
        let expected = order.version;
        order.apply(patch, now());
        let items_json = serde_json::to_value(&order.items)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET items = $2, status = $3, total_cents = $4, version = $5, updated_at = $6
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(id.as_uuid())
        .bind(items_json)
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(order.version.as_i64())
        .bind(order.updated_at)
        .bind(expected.as_i64())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConcurrencyConflict {
                order_id: id,
                expected,
                actual: order.version,
            });
        }

        let outbox_id = Self::insert_outbox(&mut tx, id, OutboxKind::Updated).await?;

        tx.commit().await?;
        Ok(Committed::new(order, outbox_id))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: OrderId) -> Result<Committed<()>> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM orders WHERE id = $1 RETURNING id")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        if deleted.is_none() {
            return Err(StoreError::NotFound(id));
        }

        let outbox_id = Self::insert_outbox(&mut tx, id, OutboxKind::Deleted).await?;

        tx.commit().await?;
        Ok(Committed::new((), outbox_id))
    }

    async fn pending_outbox(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, kind, created_at, attempts, last_error, delivered_at
            FROM order_outbox
            WHERE delivered_at IS NULL AND attempts < $2
            ORDER BY seq ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_outbox).collect()
    }

    async fn mark_delivered(&self, id: OutboxId) -> Result<()> {
        sqlx::query("UPDATE order_outbox SET delivered_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_failure(&self, id: OutboxId, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE order_outbox SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
