use std::collections::HashMap;
use std::sync::RwLock;

use pharmatrack_ai::SaleRecord;
use pharmatrack_core::{BatchId, ProductId};
use pharmatrack_inventory::{plan_fefo, Batch};
use pharmatrack_products::Product;
use pharmatrack_sales::{
    net_sold, return_outcome, sale_transactions, LedgerEntry, ReturnOutcome, ReturnReceipt,
    SaleReceipt, Transaction, TransactionType,
};

use super::{clamp_limit, InventoryStore, ReturnUnit, SaleUnit, StoreError};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    batches: Vec<Batch>,
    transactions: Vec<Transaction>,
}

impl State {
    fn product_name(&self, id: ProductId) -> String {
        self.products
            .get(&id)
            .map(|p| p.name().to_string())
            .unwrap_or_default()
    }
}

/// In-memory store.
///
/// Intended for tests/dev. One `RwLock` guards all tables, so every write
/// method holds a single write guard from read through apply.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl InventoryStore for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.products.contains_key(&product.id_typed()) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id_typed()
            )));
        }
        state.products.insert(product.id_typed(), product.clone());
        Ok(())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self.read()?.products.values().cloned().collect();
        products.sort_by(|a, b| a.name().cmp(b.name()).then(a.id_typed().cmp(&b.id_typed())));
        Ok(products)
    }

    async fn batches_for_product(&self, id: ProductId) -> Result<Vec<Batch>, StoreError> {
        let mut batches: Vec<Batch> = self
            .read()?
            .batches
            .iter()
            .filter(|b| b.product_id == id)
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.fefo_key());
        Ok(batches)
    }

    async fn batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self.read()?.batches.iter().find(|b| b.id == id).cloned())
    }

    async fn batch_by_code(&self, code: &str) -> Result<Option<Batch>, StoreError> {
        Ok(self
            .read()?
            .batches
            .iter()
            .find(|b| b.internal_batch_code == code)
            .cloned())
    }

    async fn batch_codes_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read()?
            .batches
            .iter()
            .filter(|b| b.internal_batch_code.starts_with(prefix))
            .map(|b| b.internal_batch_code.clone())
            .collect())
    }

    async fn batches_in_stock(&self) -> Result<Vec<(Batch, String)>, StoreError> {
        let state = self.read()?;
        let mut rows: Vec<(Batch, String)> = state
            .batches
            .iter()
            .filter(|b| b.quantity_remaining > 0)
            .map(|b| (b.clone(), state.product_name(b.product_id)))
            .collect();
        rows.sort_by_key(|(b, _)| b.fefo_key());
        Ok(rows)
    }

    async fn receive_batch(&self, batch: &Batch, stock_in: &Transaction) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.products.contains_key(&batch.product_id) {
            return Err(StoreError::UnknownProduct(batch.product_id));
        }
        if state
            .batches
            .iter()
            .any(|b| b.internal_batch_code == batch.internal_batch_code)
        {
            return Err(StoreError::Conflict(format!(
                "batch code {} already exists",
                batch.internal_batch_code
            )));
        }
        state.batches.push(batch.clone());
        state.transactions.push(stock_in.clone());
        Ok(())
    }

    async fn allocate_sale(&self, sale: &SaleUnit) -> Result<SaleReceipt, StoreError> {
        let mut state = self.write()?;
        if !state.products.contains_key(&sale.product_id) {
            return Err(StoreError::UnknownProduct(sale.product_id));
        }

        let snapshot: Vec<Batch> = state
            .batches
            .iter()
            .filter(|b| b.product_id == sale.product_id)
            .cloned()
            .collect();
        let plan = plan_fefo(
            sale.product_id,
            sale.quantity,
            &snapshot,
            sale.occurred_at.date_naive(),
        )?;
        let transactions = sale_transactions(
            &plan,
            sale.unit_price,
            sale.customer_phone.as_deref(),
            sale.occurred_at,
        )?;

        plan.apply_to(&mut state.batches)?;
        state.transactions.extend(transactions.iter().cloned());

        Ok(SaleReceipt::new(plan, sale.unit_price, transactions))
    }

    async fn record_return(&self, ret: &ReturnUnit) -> Result<ReturnReceipt, StoreError> {
        let mut state = self.write()?;
        let pos = state
            .batches
            .iter()
            .position(|b| b.id == ret.batch_id)
            .ok_or_else(|| StoreError::UnknownBatch(ret.batch_id.to_string()))?;

        let sold = net_sold(
            state
                .transactions
                .iter()
                .filter(|t| t.batch_id == Some(ret.batch_id)),
        );
        let on = ret.occurred_at.date_naive();
        let outcome = return_outcome(&state.batches[pos], sold, ret.quantity, on)?;

        let transaction = Transaction::record(
            TransactionType::Return,
            state.batches[pos].product_id,
            Some(ret.batch_id),
            ret.quantity,
            ret.unit_price,
            ret.occurred_at,
            ret.customer_phone.clone(),
        )?;

        if outcome == ReturnOutcome::Restocked {
            state.batches[pos].restock(ret.quantity, on)?;
        }
        state.transactions.push(transaction.clone());

        let batch = &state.batches[pos];
        Ok(ReturnReceipt {
            outcome,
            internal_batch_code: batch.internal_batch_code.clone(),
            quantity_remaining: batch.quantity_remaining,
            transaction,
        })
    }

    async fn recent_transactions(&self, limit: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.read()?;
        let mut txs: Vec<&Transaction> = state.transactions.iter().collect();
        txs.sort_by(|a, b| {
            b.transaction_date
                .cmp(&a.transaction_date)
                .then(b.id.cmp(&a.id))
        });

        Ok(txs
            .into_iter()
            .take(clamp_limit(limit) as usize)
            .map(|t| LedgerEntry {
                transaction: t.clone(),
                product_name: state.product_name(t.product_id),
                internal_batch_code: t.batch_id.and_then(|id| {
                    state
                        .batches
                        .iter()
                        .find(|b| b.id == id)
                        .map(|b| b.internal_batch_code.clone())
                }),
            })
            .collect())
    }

    async fn transaction_count(&self) -> Result<i64, StoreError> {
        Ok(self.read()?.transactions.len() as i64)
    }

    async fn transactions_for_batch(&self, id: BatchId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .filter(|t| t.batch_id == Some(id))
            .cloned()
            .collect())
    }

    async fn sale_history(&self) -> Result<Vec<SaleRecord>, StoreError> {
        let state = self.read()?;
        let mut history: Vec<SaleRecord> = state
            .transactions
            .iter()
            .filter(|t| t.transaction_type == TransactionType::Sale)
            .map(|t| SaleRecord {
                occurred_at: t.transaction_date,
                product_name: state.product_name(t.product_id),
                quantity: t.quantity,
            })
            .collect();
        history.sort_by_key(|r| r.occurred_at);
        Ok(history)
    }
}
