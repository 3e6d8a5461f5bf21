// ==========================================
// 库存成本核算系统 - 批次台账引擎
// ==========================================
// 职责: 进货 ↔ 成本批次的一对一维护（新建 / 编辑 / 删除）
// 红线: 批次必须与其进货同事务写入（由 ImportRepository 保证）
// 红线: 汇率解析在事务之外完成，不跨网络请求持有事务
// 策略: 汇率不可用时批次按原币单价入账（降级而非失败）
// 策略: 编辑后的数量低于已售数量时拒绝编辑（remaining 不会为负）
// ==========================================

use crate::config::ConfigManager;
use crate::domain::batch::{BatchValuation, ImportBatch};
use crate::domain::import::{ImportRecord, NewImport};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::fx_resolver::FxRateResolver;
use crate::repository::import_repo::ImportRepository;
use std::sync::Arc;

// ==========================================
// BatchLedger - 批次台账
// ==========================================
pub struct BatchLedger {
    import_repo: Arc<ImportRepository>,
    resolver: Arc<FxRateResolver>,
    config: Arc<ConfigManager>,
}

impl BatchLedger {
    pub fn new(
        import_repo: Arc<ImportRepository>,
        resolver: Arc<FxRateResolver>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            import_repo,
            resolver,
            config,
        }
    }

    /// 校验并规范化进货输入；币种为空时使用默认进货币种
    fn prepare(&self, import: NewImport) -> EngineResult<NewImport> {
        let mut import = import.normalized();

        if import.category.is_empty() || import.subcategory.is_empty() {
            return Err(EngineError::InvalidInput("品类与子品类不能为空".to_string()));
        }
        if import.quantity <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "进货数量必须为正数: {}",
                import.quantity
            )));
        }
        if !import.ordered_price.is_finite() || import.ordered_price < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "进货单价无效: {}",
                import.ordered_price
            )));
        }
        if import.currency.is_empty() {
            import.currency = self.config.default_import_currency()?;
        }
        Ok(import)
    }

    /// 计算批次的本位币单价
    ///
    /// - 币种等于本位币: 汇率 1.0
    /// - 汇率可用: unit_cost × rate(batch_date)
    /// - 汇率不可用: 回退为原币单价，fx_to_base = None
    pub async fn value_import(&self, import: &NewImport) -> EngineResult<BatchValuation> {
        let base = self.config.base_currency()?;

        if import.currency == base {
            return Ok(BatchValuation {
                unit_cost: import.ordered_price,
                unit_cost_base: import.ordered_price,
                fx_to_base: Some(1.0),
            });
        }

        match self
            .resolver
            .resolve(Some(import.date), &import.currency, &base)
            .await
        {
            Some(rate) => Ok(BatchValuation {
                unit_cost: import.ordered_price,
                unit_cost_base: import.ordered_price * rate,
                fx_to_base: Some(rate),
            }),
            None => {
                tracing::warn!(
                    date = %import.date,
                    currency = %import.currency,
                    base = %base,
                    "汇率不可用，批次按原币单价入账"
                );
                Ok(BatchValuation {
                    unit_cost: import.ordered_price,
                    unit_cost_base: import.ordered_price,
                    fx_to_base: None,
                })
            }
        }
    }

    /// 新建进货及其批次（remaining = original = quantity）
    pub async fn create_batch(&self, import: NewImport) -> EngineResult<(ImportRecord, ImportBatch)> {
        let import = self.prepare(import)?;
        let valuation = self.value_import(&import).await?;

        let (record, batch) = self.import_repo.insert_with_batch(
            &import,
            &valuation,
            chrono::Local::now().naive_local(),
        )?;

        tracing::info!(
            import_id = record.id,
            batch_id = batch.id,
            item = %record.item_key(),
            quantity = batch.original_quantity,
            unit_cost_base = batch.unit_cost_base,
            "成本批次已创建"
        );
        Ok((record, batch))
    }

    /// 编辑进货并同步批次
    ///
    /// remaining_quantity += (新数量 − 旧数量)，保留已售部分；
    /// 新数量低于已售数量时返回 QuantityBelowConsumed。
    /// 日期/单价/币种未变化时沿用原估值，不重新请求汇率。
    pub async fn edit_batch(&self, import_id: i64, import: NewImport) -> EngineResult<ImportBatch> {
        let import = self.prepare(import)?;

        let existing = self
            .import_repo
            .find_batch_by_import(import_id)?
            .ok_or(EngineError::ImportNotFound(import_id))?;

        let consumed = existing.consumed_quantity();
        if import.quantity < consumed {
            return Err(EngineError::QuantityBelowConsumed {
                import_id,
                consumed,
                requested: import.quantity,
            });
        }

        let pricing_unchanged = existing.batch_date == import.date
            && existing.currency == import.currency
            && existing.unit_cost == import.ordered_price;
        let valuation = if pricing_unchanged {
            BatchValuation {
                unit_cost: existing.unit_cost,
                unit_cost_base: existing.unit_cost_base,
                fx_to_base: existing.fx_to_base,
            }
        } else {
            self.value_import(&import).await?
        };

        let delta = import.quantity - existing.original_quantity;
        let batch = self
            .import_repo
            .update_with_batch(import_id, &import, &valuation, delta)?;

        tracing::info!(
            import_id,
            batch_id = batch.id,
            quantity_delta = delta,
            remaining = batch.remaining_quantity,
            "成本批次已同步编辑"
        );
        Ok(batch)
    }

    /// 删除进货（批次及其销售分配级联删除）
    pub fn delete_batch(&self, import_id: i64) -> EngineResult<ImportRecord> {
        let deleted = self
            .import_repo
            .delete_with_batch(import_id)?
            .ok_or(EngineError::ImportNotFound(import_id))?;

        tracing::info!(import_id, item = %deleted.item_key(), "进货及其批次已删除");
        Ok(deleted)
    }
}
