// ==========================================
// 库存成本核算系统 - 进货与库存 API
// ==========================================
// 职责: 进货新建/编辑/删除（同步批次）、库存快照与估值查询
// 流程: 新建 → 批次台账 → 库存增量；编辑/删除 → 批次台账 → 库存重建
// 权限: 删除需要管理员角色
// 审计: 每次写操作追加操作日志（尽力而为）
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionType;
use crate::domain::batch::ImportBatch;
use crate::domain::import::{ImportRecord, NewImport};
use crate::domain::inventory::{InventorySnapshot, StockValuation};
use crate::domain::types::{Session, ROLE_ADMIN};
use crate::engine::{AccessGuard, BatchLedger, InventoryAggregate};
use crate::repository::import_repo::ImportRepository;

const ENTITY_IMPORT: &str = "import";
const ENTITY_INVENTORY: &str = "inventory";

// ==========================================
// InventoryApi - 进货与库存 API
// ==========================================
pub struct InventoryApi {
    import_repo: Arc<ImportRepository>,
    ledger: Arc<BatchLedger>,
    aggregate: Arc<InventoryAggregate>,
    guard: Arc<AccessGuard>,
}

impl InventoryApi {
    pub fn new(
        import_repo: Arc<ImportRepository>,
        ledger: Arc<BatchLedger>,
        aggregate: Arc<InventoryAggregate>,
        guard: Arc<AccessGuard>,
    ) -> Self {
        Self {
            import_repo,
            ledger,
            aggregate,
            guard,
        }
    }

    // ==========================================
    // 写操作
    // ==========================================

    /// 新建进货
    ///
    /// # 返回
    /// - Ok((ImportRecord, ImportBatch)): 进货记录与其成本批次
    /// - Err(ApiError): 输入无效或存储失败（此时未写入任何记录）
    pub async fn add_import(
        &self,
        session: &Session,
        import: NewImport,
    ) -> ApiResult<(ImportRecord, ImportBatch)> {
        let (record, batch) = self.ledger.create_batch(import).await?;

        // 快照是派生数据：增量失败时以重建兜底
        if let Err(e) = self
            .aggregate
            .apply_delta(&record.category, &record.subcategory, record.quantity)
        {
            tracing::warn!(import_id = record.id, error = %e, "库存增量更新失败，改为整体重建");
            self.rebuild_quietly();
        }

        self.guard.record(
            session,
            ActionType::CreateImport,
            ENTITY_IMPORT,
            Some(&record.id.to_string()),
            Some(serde_json::json!({
                "category": record.category,
                "subcategory": record.subcategory,
                "quantity": record.quantity,
                "ordered_price": record.ordered_price,
                "currency": record.currency,
                "unit_cost_base": batch.unit_cost_base,
                "fx_to_base": batch.fx_to_base,
            })),
        );

        Ok((record, batch))
    }

    /// 编辑进货并同步其批次，随后重建库存快照
    pub async fn edit_import(
        &self,
        session: &Session,
        import_id: i64,
        import: NewImport,
    ) -> ApiResult<ImportBatch> {
        let batch = self.ledger.edit_batch(import_id, import).await?;
        self.rebuild_quietly();

        self.guard.record(
            session,
            ActionType::UpdateImport,
            ENTITY_IMPORT,
            Some(&import_id.to_string()),
            Some(serde_json::json!({
                "original_quantity": batch.original_quantity,
                "remaining_quantity": batch.remaining_quantity,
                "unit_cost": batch.unit_cost,
                "currency": batch.currency,
                "unit_cost_base": batch.unit_cost_base,
            })),
        );

        Ok(batch)
    }

    /// 删除进货（管理员）；批次及其销售分配级联删除，随后重建库存快照
    pub fn delete_import(&self, session: &Session, import_id: i64) -> ApiResult<ImportRecord> {
        self.guard.require_role(session, ROLE_ADMIN)?;

        let deleted = self.ledger.delete_batch(import_id)?;
        self.rebuild_quietly();

        self.guard.record(
            session,
            ActionType::DeleteImport,
            ENTITY_IMPORT,
            Some(&import_id.to_string()),
            Some(serde_json::json!({
                "category": deleted.category,
                "subcategory": deleted.subcategory,
                "quantity": deleted.quantity,
            })),
        );

        Ok(deleted)
    }

    /// 手动重建库存快照
    pub fn rebuild_inventory(&self, session: &Session) -> ApiResult<usize> {
        let rows = self.aggregate.rebuild()?;
        self.guard.record(
            session,
            ActionType::RebuildInventory,
            ENTITY_INVENTORY,
            None,
            Some(serde_json::json!({ "rows": rows })),
        );
        Ok(rows)
    }

    // 编辑/删除已提交后，重建失败不回滚主操作
    fn rebuild_quietly(&self) {
        if let Err(e) = self.aggregate.rebuild() {
            tracing::warn!(error = %e, "库存快照重建失败，将在下次启动时重建");
        }
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn list_imports(&self) -> ApiResult<Vec<ImportRecord>> {
        Ok(self.import_repo.list_imports()?)
    }

    pub fn get_import(&self, import_id: i64) -> ApiResult<ImportRecord> {
        self.import_repo
            .find_import(import_id)?
            .ok_or_else(|| ApiError::NotFound(format!("进货(id={})不存在", import_id)))
    }

    pub fn get_batch_for_import(&self, import_id: i64) -> ApiResult<ImportBatch> {
        self.import_repo
            .find_batch_by_import(import_id)?
            .ok_or_else(|| ApiError::NotFound(format!("进货(id={})的批次不存在", import_id)))
    }

    /// 按 FIFO 顺序列出品类/子品类的全部批次
    pub fn list_batches(&self, category: &str, subcategory: &str) -> ApiResult<Vec<ImportBatch>> {
        Ok(self
            .import_repo
            .list_batches_for_item(category.trim(), subcategory.trim())?)
    }

    pub fn list_inventory(&self) -> ApiResult<Vec<InventorySnapshot>> {
        Ok(self.aggregate.list()?)
    }

    pub fn quantity_on_hand(&self, category: &str, subcategory: &str) -> ApiResult<i64> {
        Ok(self
            .aggregate
            .quantity_on_hand(category.trim(), subcategory.trim())?)
    }

    pub fn stock_valuation(&self) -> ApiResult<Vec<StockValuation>> {
        Ok(self.aggregate.valuation()?)
    }
}
