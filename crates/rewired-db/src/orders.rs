use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

use rewired_types::api::CreateTransactionRequest;
use rewired_types::models::{TradeSide, Transaction, TransactionStatus};

use crate::models::enum_col;
use crate::{Database, Result, StoreError};

const TX_SELECT: &str = "SELECT t.id, t.product_id, t.buyer_id, t.seller_id, t.quantity, t.total_price,
        t.status, t.payment_method, t.shipping_address, t.tracking_number, t.notes,
        t.created_at, t.completed_at,
        p.title, p.image_url, u1.username, u2.username
 FROM transactions t
 JOIN products p ON t.product_id = p.id
 JOIN users u1 ON t.buyer_id = u1.id
 JOIN users u2 ON t.seller_id = u2.id";

fn map_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        product_id: row.get(1)?,
        buyer_id: row.get(2)?,
        seller_id: row.get(3)?,
        quantity: row.get(4)?,
        total_price: row.get(5)?,
        status: enum_col(row, 6)?,
        payment_method: row.get(7)?,
        shipping_address: row.get(8)?,
        tracking_number: row.get(9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
        completed_at: row.get(12)?,
        product_title: row.get(13)?,
        image_url: row.get(14)?,
        buyer_name: row.get(15)?,
        seller_name: row.get(16)?,
        side: None,
    })
}

fn fetch_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let sql = format!("{} WHERE t.id = ?1", TX_SELECT);
    conn.query_row(&sql, [id], map_transaction)
        .optional()?
        .ok_or_else(|| StoreError::not_found("Transaction not found"))
}

impl Database {
    /// Creates a pending purchase and decrements inventory. The availability
    /// check, the insert, and the quantity update run in one immediate SQLite
    /// transaction, so two concurrent purchases cannot both pass the check.
    pub fn create_transaction(
        &self,
        buyer_id: i64,
        req: &CreateTransactionRequest,
    ) -> Result<Transaction> {
        let quantity = req.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(StoreError::invalid("Quantity must be at least 1"));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let product: Option<(i64, f64, i64)> = tx
                .query_row(
                    "SELECT seller_id, price, quantity FROM products
                     WHERE id = ?1 AND status = 'available'",
                    [req.product_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let (seller_id, price, available) =
                product.ok_or_else(|| StoreError::not_found("Product not available"))?;

            if seller_id == buyer_id {
                return Err(StoreError::invalid("You cannot buy your own product"));
            }
            if quantity > available {
                return Err(StoreError::invalid("Insufficient quantity available"));
            }

            let total_price = price * quantity as f64;

            tx.execute(
                "INSERT INTO transactions (product_id, buyer_id, seller_id, quantity,
                                           total_price, payment_method, shipping_address, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    req.product_id,
                    buyer_id,
                    seller_id,
                    quantity,
                    total_price,
                    req.payment_method,
                    req.shipping_address,
                    req.notes,
                ],
            )?;
            let id = tx.last_insert_rowid();

            let remaining = available - quantity;
            tx.execute(
                "UPDATE products SET quantity = ?1, status = ?2, updated_at = datetime('now')
                 WHERE id = ?3",
                params![
                    remaining,
                    if remaining == 0 { "sold" } else { "available" },
                    req.product_id,
                ],
            )?;

            let record = fetch_transaction(&tx, id)?;
            tx.commit()?;
            Ok(record)
        })
    }

    /// Visible to the buyer or the seller only.
    pub fn get_transaction(&self, id: i64, user_id: i64) -> Result<Transaction> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE t.id = ?1 AND (t.buyer_id = ?2 OR t.seller_id = ?2)",
                TX_SELECT
            );
            conn.query_row(&sql, params![id, user_id], map_transaction)
                .optional()?
                .ok_or_else(|| StoreError::not_found("Transaction not found"))
        })
    }

    /// Buyer-or-seller listing, optionally status-filtered and paginated.
    /// Each row is tagged purchase/sale relative to the caller.
    pub fn my_transactions(
        &self,
        user_id: i64,
        status: Option<TransactionStatus>,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Transaction>, i64)> {
        self.with_conn(|conn| {
            let mut filter = String::from("(t.buyer_id = ? OR t.seller_id = ?)");
            let mut values: Vec<Value> = vec![user_id.into(), user_id.into()];
            if let Some(status) = status {
                filter.push_str(" AND t.status = ?");
                values.push(status.as_str().to_string().into());
            }

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM transactions t WHERE {}", filter),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
            let sql = format!(
                "{} WHERE {} ORDER BY t.created_at DESC LIMIT ? OFFSET ?",
                TX_SELECT, filter
            );
            values.push(i64::from(limit).into());
            values.push(offset.into());

            let mut stmt = conn.prepare(&sql)?;
            let transactions = stmt
                .query_map(params_from_iter(values.iter()), map_transaction)?
                .collect::<rusqlite::Result<Vec<_>>>()?
                .into_iter()
                .map(|mut t| {
                    t.side = Some(if t.buyer_id == user_id {
                        TradeSide::Purchase
                    } else {
                        TradeSide::Sale
                    });
                    t
                })
                .collect();

            Ok((transactions, total))
        })
    }

    pub fn my_purchases(&self, user_id: i64) -> Result<Vec<Transaction>> {
        self.one_sided(user_id, TradeSide::Purchase)
    }

    pub fn my_sales(&self, user_id: i64) -> Result<Vec<Transaction>> {
        self.one_sided(user_id, TradeSide::Sale)
    }

    fn one_sided(&self, user_id: i64, side: TradeSide) -> Result<Vec<Transaction>> {
        let column = match side {
            TradeSide::Purchase => "t.buyer_id",
            TradeSide::Sale => "t.seller_id",
        };
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE {} = ?1 ORDER BY t.created_at DESC",
                TX_SELECT, column
            );
            let mut stmt = conn.prepare(&sql)?;
            let transactions = stmt
                .query_map([user_id], map_transaction)?
                .collect::<rusqlite::Result<Vec<_>>>()?
                .into_iter()
                .map(|mut t| {
                    t.side = Some(side);
                    t
                })
                .collect();
            Ok(transactions)
        })
    }

    /// Seller-only status transition. Cancelling a pending transaction
    /// restores the product quantity and flips its status back to available;
    /// the restock never fires for refunds of completed sales.
    pub fn update_transaction_status(
        &self,
        id: i64,
        seller_id: i64,
        new_status: TransactionStatus,
    ) -> Result<Transaction> {
        if new_status == TransactionStatus::Pending {
            return Err(StoreError::invalid(
                "A transaction cannot return to pending",
            ));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let row: Option<(i64, String, i64, i64)> = tx
                .query_row(
                    "SELECT seller_id, status, product_id, quantity
                     FROM transactions WHERE id = ?1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let (owner, current, product_id, quantity) =
                row.ok_or_else(|| StoreError::not_found("Transaction not found"))?;
            if owner != seller_id {
                return Err(StoreError::forbidden("You can only update your own sales"));
            }

            let current: TransactionStatus =
                current.parse().map_err(StoreError::Invalid)?;

            let allowed = match current {
                TransactionStatus::Pending => true,
                // A completed sale may still be refunded.
                TransactionStatus::Completed => new_status == TransactionStatus::Refunded,
                TransactionStatus::Cancelled | TransactionStatus::Refunded => false,
            };
            if !allowed {
                return Err(StoreError::conflict(format!(
                    "Transaction is already {}",
                    current
                )));
            }

            if new_status == TransactionStatus::Completed {
                tx.execute(
                    "UPDATE transactions SET status = ?1, completed_at = datetime('now')
                     WHERE id = ?2",
                    params![new_status.as_str(), id],
                )?;
            } else {
                tx.execute(
                    "UPDATE transactions SET status = ?1 WHERE id = ?2",
                    params![new_status.as_str(), id],
                )?;
            }

            // Restock only when a pending purchase is cancelled.
            if new_status == TransactionStatus::Cancelled && current == TransactionStatus::Pending {
                tx.execute(
                    "UPDATE products
                     SET quantity = quantity + ?1, status = 'available',
                         updated_at = datetime('now')
                     WHERE id = ?2",
                    params![quantity, product_id],
                )?;
            }

            let record = fetch_transaction(&tx, id)?;
            tx.commit()?;
            Ok(record)
        })
    }

    /// Seller-only, independent of status.
    pub fn set_tracking_number(&self, id: i64, seller_id: i64, tracking: &str) -> Result<()> {
        self.with_conn(|conn| {
            let owner: Option<i64> = conn
                .query_row(
                    "SELECT seller_id FROM transactions WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;

            let owner = owner.ok_or_else(|| StoreError::not_found("Transaction not found"))?;
            if owner != seller_id {
                return Err(StoreError::forbidden(
                    "You can only add tracking to your own sales",
                ));
            }

            conn.execute(
                "UPDATE transactions SET tracking_number = ?1 WHERE id = ?2",
                params![tracking, id],
            )?;
            Ok(())
        })
    }
}
