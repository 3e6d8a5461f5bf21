// ==========================================
// 库存成本核算系统 - FIFO 分配引擎
// ==========================================
// 职责: 按先进先出消耗批次，为销售核算成本与单件利润
// 候选: remaining_quantity > 0，按 (batch_date, id) 升序
// 策略: 候选耗尽时记录部分分配，并以 shortfall 报告未满足数量
// 红线: 规划为纯函数；扣减与写入由仓储在单一事务内完成
// ==========================================

use crate::domain::batch::{AllocationDraft, AllocationOutcome, BatchCandidate, SaleRequest};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::allocation_repo::SaleAllocationRepository;
use std::sync::Arc;

/// 规划 FIFO 分配
///
/// 从候选列表头部依次取 min(remaining, 仍需数量)，直到满足或候选耗尽。
/// 候选须已按 (batch_date, id) 升序排列。
pub fn plan_fifo(
    candidates: &[BatchCandidate],
    quantity_needed: i64,
    unit_sale_price: f64,
) -> Vec<AllocationDraft> {
    let mut still_needed = quantity_needed;
    let mut drafts = Vec::new();

    for candidate in candidates {
        if still_needed <= 0 {
            break;
        }
        if candidate.remaining_quantity <= 0 {
            continue;
        }

        let take = candidate.remaining_quantity.min(still_needed);
        drafts.push(AllocationDraft {
            batch_id: candidate.batch_id,
            quantity_from_batch: take,
            unit_cost: candidate.unit_cost_base,
            unit_sale_price,
            profit_per_unit: unit_sale_price - candidate.unit_cost_base,
        });
        still_needed -= take;
    }

    drafts
}

// ==========================================
// FifoAllocator - FIFO 分配器
// ==========================================
pub struct FifoAllocator {
    allocation_repo: Arc<SaleAllocationRepository>,
}

impl FifoAllocator {
    pub fn new(allocation_repo: Arc<SaleAllocationRepository>) -> Self {
        Self { allocation_repo }
    }

    /// 为一次销售分配批次
    ///
    /// # 参数
    /// - request: 销售请求（数量、日期、商品编号）
    /// - unit_sale_price_base: 已换算为本位币的销售单价
    ///
    /// # 返回
    /// - AllocationOutcome: 已提交的分配行、已分配数量、缺口数量
    pub fn allocate(
        &self,
        request: &SaleRequest,
        unit_sale_price_base: f64,
    ) -> EngineResult<AllocationOutcome> {
        if request.quantity <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "销售数量必须为正数: {}",
                request.quantity
            )));
        }
        if !unit_sale_price_base.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "销售单价无效: {}",
                unit_sale_price_base
            )));
        }
        let category = request.category.trim();
        let subcategory = request.subcategory.trim();
        if category.is_empty() || subcategory.is_empty() {
            return Err(EngineError::InvalidInput("品类与子品类不能为空".to_string()));
        }

        let quantity_needed = request.quantity;
        let allocations = self.allocation_repo.commit_fifo(
            category,
            subcategory,
            request.product_id.trim(),
            request.sale_date,
            chrono::Local::now().naive_local(),
            |candidates| plan_fifo(candidates, quantity_needed, unit_sale_price_base),
        )?;

        let allocated_quantity: i64 = allocations.iter().map(|a| a.quantity_from_batch).sum();
        let shortfall = quantity_needed - allocated_quantity;

        if shortfall > 0 {
            tracing::warn!(
                category,
                subcategory,
                requested = quantity_needed,
                allocated = allocated_quantity,
                shortfall,
                "可售批次不足，已记录部分分配"
            );
        } else {
            tracing::info!(
                category,
                subcategory,
                quantity = quantity_needed,
                batches = allocations.len(),
                "销售已按 FIFO 分配"
            );
        }

        Ok(AllocationOutcome {
            allocations,
            allocated_quantity,
            shortfall,
        })
    }
}
