//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate id or internal batch code |
//! | Database (foreign key violation) | `23503` | `Domain(InvariantViolation)` | Batch or transaction pointing at a missing row |
//! | Database (check constraint violation) | `23514` | `Domain(InvariantViolation)` | Negative stock, non-positive quantity, bad type |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / RowNotFound / other | N/A | `Backend` | Connection failures etc. |
//!
//! ## Sales
//!
//! `allocate_sale` runs in one SQL transaction: the product's batches are
//! locked with `SELECT ... FOR UPDATE` in FEFO order, the plan is computed in
//! Rust, and each deduction is a conditional
//! `UPDATE ... WHERE quantity_remaining >= $n`. Zero affected rows means the
//! batch changed under us: the transaction is rolled back and the caller sees
//! `StaleBatchState`.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction as SqlTransaction};
use tracing::{instrument, Span};

use pharmatrack_ai::SaleRecord;
use pharmatrack_core::{BatchId, DomainError, ProductId, TransactionId};
use pharmatrack_inventory::{plan_fefo, AllocationError, Batch};
use pharmatrack_products::Product;
use pharmatrack_sales::{
    net_sold, return_outcome, sale_transactions, LedgerEntry, ReturnOutcome, ReturnReceipt,
    SaleReceipt, Transaction, TransactionType,
};

use super::{clamp_limit, InventoryStore, ReturnUnit, SaleUnit, StoreError};

const BATCH_COLUMNS: &str = "id, product_id, supplier_batch_number, internal_batch_code, \
     manufacture_date, expiry_date, quantity_remaining, created_at";

const TRANSACTION_COLUMNS: &str = "t.id, t.product_id, t.batch_id, t.quantity, t.transaction_type, \
     t.unit_price, t.total_amount, t.transaction_date, t.customer_phone";

/// Open a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Apply the bundled schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<SqlTransaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

#[async_trait::async_trait]
impl InventoryStore for PostgresStore {
    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, seasonal_tag, requires_prescription, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.name())
        .bind(product.category())
        .bind(product.seasonal_tag())
        .bind(product.requires_prescription())
        .bind(product.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, category, seasonal_tag, requires_prescription, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, category, seasonal_tag, requires_prescription, created_at
            FROM products
            ORDER BY name ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn batches_for_product(&self, id: ProductId) -> Result<Vec<Batch>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE product_id = $1 \
             ORDER BY expiry_date ASC, created_at ASC, id ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("batches_for_product", e))?;

        rows.iter().map(batch_from_row).collect()
    }

    #[instrument(skip(self), fields(batch_id = %id), err)]
    async fn batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        let row = sqlx::query(&format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("batch", e))?;

        row.as_ref().map(batch_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn batch_by_code(&self, code: &str) -> Result<Option<Batch>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE internal_batch_code = $1"
        ))
        .bind(code)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("batch_by_code", e))?;

        row.as_ref().map(batch_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn batch_codes_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // starts_with() avoids LIKE wildcard escaping.
        let rows = sqlx::query(
            "SELECT internal_batch_code FROM batches WHERE starts_with(internal_batch_code, $1)",
        )
        .bind(prefix)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("batch_codes_with_prefix", e))?;

        rows.iter()
            .map(|r| r.try_get("internal_batch_code").map_err(row_error))
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn batches_in_stock(&self) -> Result<Vec<(Batch, String)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.product_id, b.supplier_batch_number, b.internal_batch_code,
                   b.manufacture_date, b.expiry_date, b.quantity_remaining, b.created_at,
                   p.name AS product_name
            FROM batches b
            JOIN products p ON p.id = b.product_id
            WHERE b.quantity_remaining > 0
            ORDER BY b.expiry_date ASC, b.created_at ASC, b.id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("batches_in_stock", e))?;

        rows.iter()
            .map(|r| {
                let name: String = r.try_get("product_name").map_err(row_error)?;
                Ok((batch_from_row(r)?, name))
            })
            .collect()
    }

    #[instrument(
        skip(self, batch, stock_in),
        fields(batch_id = %batch.id, product_id = %batch.product_id, code = %batch.internal_batch_code),
        err
    )]
    async fn receive_batch(&self, batch: &Batch, stock_in: &Transaction) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        if !product_exists(&mut tx, batch.product_id).await? {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::UnknownProduct(batch.product_id));
        }

        sqlx::query(
            r#"
            INSERT INTO batches (
                id,
                product_id,
                supplier_batch_number,
                internal_batch_code,
                manufacture_date,
                expiry_date,
                quantity_remaining,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(batch.id.as_uuid())
        .bind(batch.product_id.as_uuid())
        .bind(batch.supplier_batch_number.as_deref())
        .bind(&batch.internal_batch_code)
        .bind(batch.manufacture_date)
        .bind(batch.expiry_date)
        .bind(batch.quantity_remaining)
        .bind(batch.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_batch", e))?;

        insert_transaction(&mut tx, stock_in).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, sale),
        fields(
            product_id = %sale.product_id,
            quantity = sale.quantity.get(),
            lines = tracing::field::Empty
        ),
        err
    )]
    async fn allocate_sale(&self, sale: &SaleUnit) -> Result<SaleReceipt, StoreError> {
        let span = Span::current();
        let mut tx = self.begin().await?;

        if !product_exists(&mut tx, sale.product_id).await? {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::UnknownProduct(sale.product_id));
        }

        let rows = sqlx::query(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE product_id = $1 \
             ORDER BY expiry_date ASC, created_at ASC, id ASC FOR UPDATE"
        ))
        .bind(sale.product_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_batches", e))?;
        let batches = rows.iter().map(batch_from_row).collect::<Result<Vec<_>, _>>()?;

        let plan = match plan_fefo(
            sale.product_id,
            sale.quantity,
            &batches,
            sale.occurred_at.date_naive(),
        ) {
            Ok(plan) => plan,
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(e.into());
            }
        };
        let transactions = sale_transactions(
            &plan,
            sale.unit_price,
            sale.customer_phone.as_deref(),
            sale.occurred_at,
        )?;

        for line in &plan.lines {
            let result = sqlx::query(
                r#"
                UPDATE batches
                SET quantity_remaining = quantity_remaining - $1
                WHERE id = $2 AND quantity_remaining >= $1
                "#,
            )
            .bind(line.quantity.get())
            .bind(line.batch_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("deduct_batch", e))?;

            if result.rows_affected() == 0 {
                let found: i64 =
                    sqlx::query("SELECT quantity_remaining FROM batches WHERE id = $1")
                        .bind(line.batch_id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("reread_batch", e))?
                        .map(|r| r.try_get("quantity_remaining"))
                        .transpose()
                        .map_err(row_error)?
                        .unwrap_or(0);
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(AllocationError::StaleBatchState {
                    batch_id: line.batch_id,
                    expected: line.remaining_before,
                    found,
                }
                .into());
            }
        }

        for t in &transactions {
            insert_transaction(&mut tx, t).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        span.record("lines", plan.lines.len());
        Ok(SaleReceipt::new(plan, sale.unit_price, transactions))
    }

    #[instrument(skip(self, ret), fields(batch_id = %ret.batch_id, quantity = ret.quantity.get()), err)]
    async fn record_return(&self, ret: &ReturnUnit) -> Result<ReturnReceipt, StoreError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE id = $1 FOR UPDATE"
        ))
        .bind(ret.batch_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_batch", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::UnknownBatch(ret.batch_id.to_string()));
        };
        let mut batch = batch_from_row(&row)?;

        let history = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t WHERE t.batch_id = $1"
        ))
        .bind(ret.batch_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("batch_history", e))?
        .iter()
        .map(transaction_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let on = ret.occurred_at.date_naive();
        let outcome = match return_outcome(&batch, net_sold(&history), ret.quantity, on) {
            Ok(outcome) => outcome,
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(e.into());
            }
        };

        let transaction = Transaction::record(
            TransactionType::Return,
            batch.product_id,
            Some(batch.id),
            ret.quantity,
            ret.unit_price,
            ret.occurred_at,
            ret.customer_phone.clone(),
        )?;

        if outcome == ReturnOutcome::Restocked {
            sqlx::query("UPDATE batches SET quantity_remaining = quantity_remaining + $1 WHERE id = $2")
                .bind(ret.quantity.get())
                .bind(batch.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("restock_batch", e))?;
            batch.restock(ret.quantity, on)?;
        }
        insert_transaction(&mut tx, &transaction).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(ReturnReceipt {
            outcome,
            internal_batch_code: batch.internal_batch_code,
            quantity_remaining: batch.quantity_remaining,
            transaction,
        })
    }

    #[instrument(skip(self), err)]
    async fn recent_transactions(&self, limit: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS}, p.name AS product_name, b.internal_batch_code \
             FROM transactions t \
             JOIN products p ON p.id = t.product_id \
             LEFT JOIN batches b ON b.id = t.batch_id \
             ORDER BY t.transaction_date DESC, t.id DESC \
             LIMIT $1"
        ))
        .bind(clamp_limit(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_transactions", e))?;

        rows.iter()
            .map(|r| {
                Ok(LedgerEntry {
                    transaction: transaction_from_row(r)?,
                    product_name: r.try_get("product_name").map_err(row_error)?,
                    internal_batch_code: r.try_get("internal_batch_code").map_err(row_error)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn transaction_count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM transactions")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("transaction_count", e))?;
        row.try_get("total").map_err(row_error)
    }

    #[instrument(skip(self), fields(batch_id = %id), err)]
    async fn transactions_for_batch(&self, id: BatchId) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t \
             WHERE t.batch_id = $1 ORDER BY t.transaction_date ASC, t.id ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transactions_for_batch", e))?;

        rows.iter().map(transaction_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn sale_history(&self) -> Result<Vec<SaleRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.transaction_date, t.quantity, p.name AS product_name
            FROM transactions t
            JOIN products p ON p.id = t.product_id
            WHERE t.transaction_type = 'SALE'
            ORDER BY t.transaction_date ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sale_history", e))?;

        rows.iter()
            .map(|r| {
                Ok(SaleRecord {
                    occurred_at: r.try_get("transaction_date").map_err(row_error)?,
                    product_name: r.try_get("product_name").map_err(row_error)?,
                    quantity: r.try_get("quantity").map_err(row_error)?,
                })
            })
            .collect()
    }
}

async fn product_exists(
    tx: &mut SqlTransaction<'_, Postgres>,
    id: ProductId,
) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT 1 AS one FROM products WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("product_exists", e))?;
    Ok(row.is_some())
}

async fn insert_transaction(
    tx: &mut SqlTransaction<'_, Postgres>,
    t: &Transaction,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id,
            product_id,
            batch_id,
            quantity,
            transaction_type,
            unit_price,
            total_amount,
            transaction_date,
            customer_phone
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(t.id.as_uuid())
    .bind(t.product_id.as_uuid())
    .bind(t.batch_id.map(|id| *id.as_uuid()))
    .bind(t.quantity)
    .bind(t.transaction_type.as_str())
    .bind(t.unit_price)
    .bind(t.total_amount)
    .bind(t.transaction_date)
    .bind(t.customer_phone.as_deref())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;
    Ok(())
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(row_error)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(row_error)?;
    Ok(Product::restore(
        ProductId::from_uuid(id),
        row.try_get("name").map_err(row_error)?,
        row.try_get("category").map_err(row_error)?,
        row.try_get("seasonal_tag").map_err(row_error)?,
        row.try_get("requires_prescription").map_err(row_error)?,
        created_at,
    ))
}

fn batch_from_row(row: &PgRow) -> Result<Batch, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(row_error)?;
    let product_id: uuid::Uuid = row.try_get("product_id").map_err(row_error)?;
    let manufacture_date: Option<NaiveDate> = row.try_get("manufacture_date").map_err(row_error)?;
    Ok(Batch {
        id: BatchId::from_uuid(id),
        product_id: ProductId::from_uuid(product_id),
        supplier_batch_number: row.try_get("supplier_batch_number").map_err(row_error)?,
        internal_batch_code: row.try_get("internal_batch_code").map_err(row_error)?,
        manufacture_date,
        expiry_date: row.try_get("expiry_date").map_err(row_error)?,
        quantity_remaining: row.try_get("quantity_remaining").map_err(row_error)?,
        created_at: row.try_get("created_at").map_err(row_error)?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(row_error)?;
    let product_id: uuid::Uuid = row.try_get("product_id").map_err(row_error)?;
    let batch_id: Option<uuid::Uuid> = row.try_get("batch_id").map_err(row_error)?;
    let kind: String = row.try_get("transaction_type").map_err(row_error)?;
    let unit_price: Decimal = row.try_get("unit_price").map_err(row_error)?;
    let total_amount: Decimal = row.try_get("total_amount").map_err(row_error)?;
    Ok(Transaction {
        id: TransactionId::from_uuid(id),
        product_id: ProductId::from_uuid(product_id),
        batch_id: batch_id.map(BatchId::from_uuid),
        quantity: row.try_get("quantity").map_err(row_error)?,
        transaction_type: TransactionType::from_str(&kind)
            .map_err(|e| StoreError::Backend(format!("corrupt transaction row: {e}")))?,
        unit_price,
        total_amount,
        transaction_date: row.try_get("transaction_date").map_err(row_error)?,
        customer_phone: row.try_get("customer_phone").map_err(row_error)?,
    })
}

fn row_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Domain(DomainError::invariant(msg)),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Backend(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
