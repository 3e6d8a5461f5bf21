// ==========================================
// 库存成本核算系统 - 库存快照数据仓储
// ==========================================
// 对齐: inventory 表（派生数据，由 InventoryAggregate 独占写入）
// ==========================================

use crate::domain::inventory::{InventorySnapshot, StockValuation};
use crate::repository::error::{
    parse_datetime_column, RepositoryError, RepositoryResult, DATETIME_FMT,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// InventoryRepository - 库存快照仓储
// ==========================================
pub struct InventoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryRepository {
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

    /// 找到或创建快照行并累加数量
    pub fn add_quantity(
        &self,
        category: &str,
        subcategory: &str,
        delta: i64,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO inventory (category, subcategory, quantity, last_updated)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(category, subcategory) DO UPDATE SET
                quantity = inventory.quantity + excluded.quantity,
                last_updated = excluded.last_updated
            "#,
            params![category, subcategory, delta, now.format(DATETIME_FMT).to_string()],
        )?;
        Ok(())
    }

    /// 以 imports 表为准整体重建快照（删除全部行后按组汇总写入）
    ///
    /// # 返回
    /// - Ok(usize): 重建后的快照行数
    pub fn rebuild_from_imports(&self, now: NaiveDateTime) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM inventory", [])?;
        let rows = tx.execute(
            r#"
            INSERT INTO inventory (category, subcategory, quantity, last_updated)
            SELECT category, subcategory, SUM(quantity), ?1
            FROM imports
            GROUP BY category, subcategory
            "#,
            params![now.format(DATETIME_FMT).to_string()],
        )?;

        tx.commit()?;
        Ok(rows)
    }

    /// 查询单个品类/子品类的快照
    pub fn find(
        &self,
        category: &str,
        subcategory: &str,
    ) -> RepositoryResult<Option<InventorySnapshot>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT category, subcategory, quantity, last_updated
                FROM inventory
                WHERE category = ?1 AND subcategory = ?2
                "#,
                params![category, subcategory],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询全部快照
    pub fn list_all(&self) -> RepositoryResult<Vec<InventorySnapshot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT category, subcategory, quantity, last_updated
            FROM inventory
            ORDER BY category, subcategory
            "#,
        )?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 可售库存估值：SUM(remaining_quantity * 本位币单价)，按品类/子品类
    pub fn stock_valuation(&self) -> RepositoryResult<Vec<StockValuation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT category, subcategory,
                   SUM(remaining_quantity),
                   SUM(remaining_quantity * unit_cost)
            FROM import_batches
            GROUP BY category, subcategory
            ORDER BY category, subcategory
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StockValuation {
                    category: row.get(0)?,
                    subcategory: row.get(1)?,
                    remaining_quantity: row.get(2)?,
                    value_base: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

fn map_row(row: &Row) -> SqliteResult<InventorySnapshot> {
    Ok(InventorySnapshot {
        category: row.get(0)?,
        subcategory: row.get(1)?,
        quantity: row.get(2)?,
        last_updated: parse_datetime_column(3, row.get(3)?)?,
    })
}
