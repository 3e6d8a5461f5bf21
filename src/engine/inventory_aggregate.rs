// ==========================================
// 库存成本核算系统 - 库存汇总引擎
// ==========================================
// 职责: 维护 (品类, 子品类) 的派生库存快照
// 快路径: 新建进货时增量累加 apply_delta
// 恢复路径: 编辑/删除后以 imports 为准整体重建 rebuild
// 说明: 快照反映累计进货数量，与批次 remaining_quantity 解耦
// ==========================================

use crate::domain::inventory::{InventorySnapshot, StockValuation};
use crate::engine::error::EngineResult;
use crate::repository::inventory_repo::InventoryRepository;
use std::sync::Arc;

// ==========================================
// InventoryAggregate - 库存汇总
// ==========================================
pub struct InventoryAggregate {
    repo: Arc<InventoryRepository>,
}

impl InventoryAggregate {
    pub fn new(repo: Arc<InventoryRepository>) -> Self {
        Self { repo }
    }

    /// 增量累加（找不到快照行时创建）
    pub fn apply_delta(&self, category: &str, subcategory: &str, delta_quantity: i64) -> EngineResult<()> {
        self.repo.add_quantity(
            category,
            subcategory,
            delta_quantity,
            chrono::Local::now().naive_local(),
        )?;
        tracing::debug!(category, subcategory, delta_quantity, "库存快照已增量更新");
        Ok(())
    }

    /// 整体重建，返回重建后的快照行数
    pub fn rebuild(&self) -> EngineResult<usize> {
        let rows = self.repo.rebuild_from_imports(chrono::Local::now().naive_local())?;
        tracing::info!(rows, "库存快照已重建");
        Ok(rows)
    }

    /// 当前快照数量；无快照行时为 0
    pub fn quantity_on_hand(&self, category: &str, subcategory: &str) -> EngineResult<i64> {
        Ok(self
            .repo
            .find(category, subcategory)?
            .map(|s| s.quantity)
            .unwrap_or(0))
    }

    pub fn list(&self) -> EngineResult<Vec<InventorySnapshot>> {
        Ok(self.repo.list_all()?)
    }

    /// 按批次剩余数量计算的本位币库存估值
    pub fn valuation(&self) -> EngineResult<Vec<StockValuation>> {
        Ok(self.repo.stock_valuation()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{params, Connection};
    use std::sync::Mutex;

    fn setup() -> (Arc<Mutex<Connection>>, InventoryAggregate) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let aggregate = InventoryAggregate::new(Arc::new(InventoryRepository::new(conn.clone())));
        (conn, aggregate)
    }

    fn insert_import(conn: &Arc<Mutex<Connection>>, category: &str, subcategory: &str, quantity: i64) {
        conn.lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO imports (date, ordered_price, quantity, category, subcategory, currency)
                VALUES ('2024-01-01', 1.0, ?1, ?2, ?3, 'TRY')
                "#,
                params![quantity, category, subcategory],
            )
            .unwrap();
    }

    #[test]
    fn test_apply_delta_creates_then_accumulates() {
        let (_conn, aggregate) = setup();
        assert_eq!(aggregate.quantity_on_hand("Widgets", "Blue").unwrap(), 0);

        aggregate.apply_delta("Widgets", "Blue", 10).unwrap();
        aggregate.apply_delta("Widgets", "Blue", 5).unwrap();
        assert_eq!(aggregate.quantity_on_hand("Widgets", "Blue").unwrap(), 15);
    }

    #[test]
    fn test_rebuild_discards_drift() {
        let (conn, aggregate) = setup();
        insert_import(&conn, "Widgets", "Blue", 10);
        insert_import(&conn, "Widgets", "Blue", 4);
        insert_import(&conn, "Gadgets", "Red", 7);

        aggregate.apply_delta("Widgets", "Blue", 999).unwrap();
        aggregate.apply_delta("Ghost", "None", 3).unwrap();

        assert_eq!(aggregate.rebuild().unwrap(), 2);
        assert_eq!(aggregate.quantity_on_hand("Widgets", "Blue").unwrap(), 14);
        assert_eq!(aggregate.quantity_on_hand("Gadgets", "Red").unwrap(), 7);
        assert_eq!(aggregate.quantity_on_hand("Ghost", "None").unwrap(), 0);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let (conn, aggregate) = setup();
        insert_import(&conn, "Widgets", "Blue", 10);
        insert_import(&conn, "Gadgets", "Red", 7);

        aggregate.rebuild().unwrap();
        let first: Vec<(String, String, i64)> = aggregate
            .list()
            .unwrap()
            .into_iter()
            .map(|s| (s.category, s.subcategory, s.quantity))
            .collect();

        aggregate.rebuild().unwrap();
        let second: Vec<(String, String, i64)> = aggregate
            .list()
            .unwrap()
            .into_iter()
            .map(|s| (s.category, s.subcategory, s.quantity))
            .collect();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
