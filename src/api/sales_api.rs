// ==========================================
// 库存成本核算系统 - 销售成本核算 API
// ==========================================
// 职责: 销售按 FIFO 消耗批次并记录利润；分配与利润查询
// 流程: 售价换算为本位币（在事务之外）→ FIFO 分配（单一事务）→ 审计
// 策略: 批次不足时记录部分分配，返回 shortfall
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::error::ApiResult;
use crate::config::ConfigManager;
use crate::domain::action_log::ActionType;
use crate::domain::batch::{AllocationOutcome, ProfitSummary, SaleAllocation, SaleRequest};
use crate::domain::types::{normalize_currency, Session};
use crate::engine::{AccessGuard, FifoAllocator, FxRateResolver};
use crate::repository::allocation_repo::SaleAllocationRepository;

// ==========================================
// SalesApi - 销售成本核算 API
// ==========================================
pub struct SalesApi {
    allocator: Arc<FifoAllocator>,
    allocation_repo: Arc<SaleAllocationRepository>,
    resolver: Arc<FxRateResolver>,
    config: Arc<ConfigManager>,
    guard: Arc<AccessGuard>,
}

impl SalesApi {
    pub fn new(
        allocator: Arc<FifoAllocator>,
        allocation_repo: Arc<SaleAllocationRepository>,
        resolver: Arc<FxRateResolver>,
        config: Arc<ConfigManager>,
        guard: Arc<AccessGuard>,
    ) -> Self {
        Self {
            allocator,
            allocation_repo,
            resolver,
            config,
            guard,
        }
    }

    /// 记录一次销售
    ///
    /// # 参数
    /// - request.currency: 售价币种；None 时使用默认销售币种
    ///
    /// # 返回
    /// - Ok(AllocationOutcome): shortfall > 0 表示可售批次不足，仅部分分配
    pub async fn record_sale(
        &self,
        session: &Session,
        request: SaleRequest,
    ) -> ApiResult<AllocationOutcome> {
        let currency = match request.currency.as_deref() {
            Some(c) if !c.trim().is_empty() => normalize_currency(c),
            _ => self.config.default_sale_currency()?,
        };
        let base = self.config.base_currency()?;

        let unit_sale_price_base = match self
            .resolver
            .convert(
                Some(request.sale_date),
                request.unit_sale_price,
                &currency,
                &base,
            )
            .await
        {
            Some(converted) => converted,
            None => {
                tracing::warn!(
                    date = %request.sale_date,
                    currency = %currency,
                    base = %base,
                    "售价汇率不可用，按原币售价核算"
                );
                request.unit_sale_price
            }
        };

        let outcome = self.allocator.allocate(&request, unit_sale_price_base)?;

        self.guard.record(
            session,
            ActionType::RecordSale,
            "sale",
            Some(&request.product_id),
            Some(serde_json::json!({
                "category": request.category,
                "subcategory": request.subcategory,
                "quantity": request.quantity,
                "sale_date": request.sale_date.to_string(),
                "unit_sale_price": request.unit_sale_price,
                "currency": currency,
                "unit_sale_price_base": unit_sale_price_base,
                "allocated_quantity": outcome.allocated_quantity,
                "shortfall": outcome.shortfall,
            })),
        );

        Ok(outcome)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn allocations_for_batch(&self, batch_id: i64) -> ApiResult<Vec<SaleAllocation>> {
        Ok(self.allocation_repo.list_by_batch(batch_id)?)
    }

    pub fn allocations_for_product(&self, product_id: &str) -> ApiResult<Vec<SaleAllocation>> {
        Ok(self.allocation_repo.list_by_product(product_id.trim())?)
    }

    /// 已实现利润汇总（日期区间均为闭区间，可不限）
    pub fn profit_summary(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ApiResult<Vec<ProfitSummary>> {
        Ok(self.allocation_repo.profit_summary(from, to)?)
    }
}
