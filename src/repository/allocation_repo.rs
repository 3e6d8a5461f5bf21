// ==========================================
// 库存成本核算系统 - 销售分配数据仓储
// ==========================================
// 对齐: sale_batch_allocations 表（创建后不可变，仅随批次级联删除）
// 红线: 批次扣减与分配写入同一事务
// 红线: Repository 不含业务逻辑（分配规划由 FifoAllocator 提供）
// ==========================================

use crate::domain::batch::{
    AllocationDraft, BatchCandidate, ProfitSummary, SaleAllocation,
};
use crate::repository::error::{
    parse_date_column, RepositoryError, RepositoryResult, DATE_FMT, DATETIME_FMT,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Result as SqliteResult, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

const ALLOCATION_COLUMNS: &str = "id, batch_id, product_id, sale_date, category, subcategory, \
     quantity_from_batch, unit_cost, unit_sale_price, profit_per_unit";

// ==========================================
// SaleAllocationRepository - 销售分配仓储
// ==========================================
pub struct SaleAllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SaleAllocationRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在单个 IMMEDIATE 事务内完成：读取候选批次 → 规划 → 扣减 → 写入分配
    ///
    /// # 参数
    /// - planner: 接收按 (batch_date, id) 升序、remaining > 0 的候选批次，返回分配草案
    ///
    /// # 返回
    /// - Ok(Vec<SaleAllocation>): 已提交的分配行（与草案同序）
    /// - Err: 数据库错误；或草案超出批次剩余数量（整体回滚）
    pub fn commit_fifo<F>(
        &self,
        category: &str,
        subcategory: &str,
        product_id: &str,
        sale_date: NaiveDate,
        created_at: NaiveDateTime,
        planner: F,
    ) -> RepositoryResult<Vec<SaleAllocation>>
    where
        F: FnOnce(&[BatchCandidate]) -> Vec<AllocationDraft>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidates = {
            let mut stmt = tx.prepare(
                r#"
                SELECT id, batch_date, remaining_quantity, unit_cost
                FROM import_batches
                WHERE category = ?1 AND subcategory = ?2 AND remaining_quantity > 0
                ORDER BY batch_date ASC, id ASC
                "#,
            )?;
            let rows = stmt
                .query_map(params![category, subcategory], |row| {
                    Ok(BatchCandidate {
                        batch_id: row.get(0)?,
                        batch_date: parse_date_column(1, row.get(1)?)?,
                        remaining_quantity: row.get(2)?,
                        unit_cost_base: row.get(3)?,
                    })
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        let drafts = planner(&candidates);
        let sale_date_str = sale_date.format(DATE_FMT).to_string();
        let created_at_str = created_at.format(DATETIME_FMT).to_string();

        let mut allocations = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let updated = tx.execute(
                r#"
                UPDATE import_batches
                SET remaining_quantity = remaining_quantity - ?1
                WHERE id = ?2 AND remaining_quantity >= ?1
                "#,
                params![draft.quantity_from_batch, draft.batch_id],
            )?;
            if updated == 0 {
                return Err(RepositoryError::DatabaseTransactionError(format!(
                    "批次剩余数量不足: batch_id={}, requested={}",
                    draft.batch_id, draft.quantity_from_batch
                )));
            }

            tx.execute(
                r#"
                INSERT INTO sale_batch_allocations (
                    product_id, sale_date, category, subcategory, batch_id,
                    quantity_from_batch, unit_cost, unit_sale_price, profit_per_unit, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    product_id,
                    sale_date_str,
                    category,
                    subcategory,
                    draft.batch_id,
                    draft.quantity_from_batch,
                    draft.unit_cost,
                    draft.unit_sale_price,
                    draft.profit_per_unit,
                    created_at_str,
                ],
            )?;

            allocations.push(SaleAllocation {
                id: tx.last_insert_rowid(),
                batch_id: draft.batch_id,
                product_id: product_id.to_string(),
                sale_date,
                category: category.to_string(),
                subcategory: subcategory.to_string(),
                quantity_from_batch: draft.quantity_from_batch,
                unit_cost: draft.unit_cost,
                unit_sale_price: draft.unit_sale_price,
                profit_per_unit: draft.profit_per_unit,
            });
        }

        tx.commit()?;
        Ok(allocations)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询批次的全部分配
    pub fn list_by_batch(&self, batch_id: i64) -> RepositoryResult<Vec<SaleAllocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sale_batch_allocations WHERE batch_id = ?1 ORDER BY id",
            ALLOCATION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![batch_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询商品编号的全部分配
    pub fn list_by_product(&self, product_id: &str) -> RepositoryResult<Vec<SaleAllocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sale_batch_allocations WHERE product_id = ?1 ORDER BY id",
            ALLOCATION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![product_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 分配总行数
    pub fn count_all(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sale_batch_allocations", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// 已实现利润汇总（按品类/子品类，可选日期区间）
    pub fn profit_summary(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> RepositoryResult<Vec<ProfitSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT category, subcategory,
                   SUM(quantity_from_batch),
                   SUM(quantity_from_batch * unit_sale_price),
                   SUM(quantity_from_batch * unit_cost),
                   SUM(quantity_from_batch * profit_per_unit)
            FROM sale_batch_allocations
            WHERE (?1 IS NULL OR sale_date >= ?1)
              AND (?2 IS NULL OR sale_date <= ?2)
            GROUP BY category, subcategory
            ORDER BY category, subcategory
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![
                    from.map(|d| d.format(DATE_FMT).to_string()),
                    to.map(|d| d.format(DATE_FMT).to_string()),
                ],
                |row| {
                    Ok(ProfitSummary {
                        category: row.get(0)?,
                        subcategory: row.get(1)?,
                        quantity_sold: row.get(2)?,
                        revenue: row.get(3)?,
                        cost: row.get(4)?,
                        profit: row.get(5)?,
                    })
                },
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

fn map_row(row: &Row) -> SqliteResult<SaleAllocation> {
    Ok(SaleAllocation {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        product_id: row.get(2)?,
        sale_date: parse_date_column(3, row.get(3)?)?,
        category: row.get(4)?,
        subcategory: row.get(5)?,
        quantity_from_batch: row.get(6)?,
        unit_cost: row.get(7)?,
        unit_sale_price: row.get(8)?,
        profit_per_unit: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<Mutex<Connection>>, SaleAllocationRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO imports (id, date, ordered_price, quantity, category, subcategory, currency)
            VALUES (1, '2024-01-01', 10.0, 5, 'Widgets', 'Blue', 'TRY'),
                   (2, '2024-01-01', 12.0, 5, 'Widgets', 'Blue', 'TRY');
            INSERT INTO import_batches (id, import_id, batch_date, category, subcategory,
                original_quantity, remaining_quantity, unit_cost, unit_cost_orig, currency, created_at)
            VALUES (2, 1, '2024-01-01', 'Widgets', 'Blue', 5, 5, 10.0, 10.0, 'TRY', '2024-01-01 00:00:00'),
                   (1, 2, '2024-01-01', 'Widgets', 'Blue', 5, 0, 12.0, 12.0, 'TRY', '2024-01-01 00:00:00');
            "#,
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), SaleAllocationRepository::new(conn))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    }

    fn now() -> NaiveDateTime {
        day().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_commit_fifo_only_offers_stocked_batches() {
        let (_conn, repo) = setup();

        let mut seen = Vec::new();
        let allocations = repo
            .commit_fifo("Widgets", "Blue", "P1", day(), now(), |candidates| {
                seen = candidates.to_vec();
                Vec::new()
            })
            .unwrap();

        assert!(allocations.is_empty());
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].batch_id, 2);
    }

    #[test]
    fn test_commit_fifo_overdraw_rolls_back() {
        let (conn, repo) = setup();

        let result = repo.commit_fifo("Widgets", "Blue", "P1", day(), now(), |_| {
            vec![AllocationDraft {
                batch_id: 2,
                quantity_from_batch: 6,
                unit_cost: 10.0,
                unit_sale_price: 12.0,
                profit_per_unit: 2.0,
            }]
        });
        assert!(result.is_err());

        let remaining: i64 = conn
            .lock()
            .unwrap()
            .query_row("SELECT remaining_quantity FROM import_batches WHERE id = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 5);
        assert_eq!(repo.count_all().unwrap(), 0);
    }

    #[test]
    fn test_profit_summary() {
        let (_conn, repo) = setup();

        repo.commit_fifo("Widgets", "Blue", "P1", day(), now(), |_| {
            vec![AllocationDraft {
                batch_id: 2,
                quantity_from_batch: 4,
                unit_cost: 10.0,
                unit_sale_price: 12.0,
                profit_per_unit: 2.0,
            }]
        })
        .unwrap();

        let summary = repo.profit_summary(None, None).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].quantity_sold, 4);
        assert!((summary[0].profit - 8.0).abs() < 1e-9);
        assert!((summary[0].revenue - 48.0).abs() < 1e-9);

        let later = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(repo.profit_summary(Some(later), None).unwrap().is_empty());
        assert_eq!(repo.list_by_product("P1").unwrap().len(), 1);
        assert_eq!(repo.list_by_batch(2).unwrap().len(), 1);
    }
}
