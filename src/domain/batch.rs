// ==========================================
// 库存成本核算系统 - 成本批次与销售分配领域模型
// ==========================================
// 对齐: import_batches / sale_batch_allocations 表
// 红线: 0 <= remaining_quantity <= original_quantity
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportBatch - 成本批次（一次进货对应一个批次）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: i64,
    pub import_id: i64,
    pub batch_date: NaiveDate,
    pub category: String,
    pub subcategory: String,
    pub original_quantity: i64,
    pub remaining_quantity: i64,
    pub unit_cost: f64,          // 批次币种单价
    pub unit_cost_base: f64,     // 本位币单价（batch_date 汇率）
    pub currency: String,
    pub fx_to_base: Option<f64>, // 实际使用的汇率；None 表示未换算
    pub supplier: Option<String>,
    pub batch_notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl ImportBatch {
    /// 已被销售消耗的数量
    pub fn consumed_quantity(&self) -> i64 {
        self.original_quantity - self.remaining_quantity
    }
}

// ==========================================
// BatchValuation - 批次本位币估值结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchValuation {
    pub unit_cost: f64,
    pub unit_cost_base: f64,
    pub fx_to_base: Option<f64>,
}

// ==========================================
// SaleAllocation - 销售数量与批次的关联（创建后不可变）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleAllocation {
    pub id: i64,
    pub batch_id: i64,
    pub product_id: String,
    pub sale_date: NaiveDate,
    pub category: String,
    pub subcategory: String,
    pub quantity_from_batch: i64,
    pub unit_cost: f64,       // 分配时从批次复制的本位币单价
    pub unit_sale_price: f64, // 本位币
    pub profit_per_unit: f64,
}

// ==========================================
// SaleRequest - 销售成本核算请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub product_id: String,
    pub category: String,
    pub subcategory: String,
    pub quantity: i64,
    pub sale_date: NaiveDate,
    pub unit_sale_price: f64,
    pub currency: Option<String>, // None = 默认销售币种
}

// ==========================================
// AllocationOutcome - FIFO 分配结果
// ==========================================
// 策略: 批次耗尽时记录部分分配，并通过 shortfall 报告缺口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub allocations: Vec<SaleAllocation>,
    pub allocated_quantity: i64,
    pub shortfall: i64,
}

impl AllocationOutcome {
    pub fn is_complete(&self) -> bool {
        self.shortfall == 0
    }

    /// 本次分配实现的总利润（本位币）
    pub fn total_profit(&self) -> f64 {
        self.allocations
            .iter()
            .map(|a| a.profit_per_unit * a.quantity_from_batch as f64)
            .sum()
    }
}

// ==========================================
// ProfitSummary - 已实现利润汇总（按品类/子品类）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitSummary {
    pub category: String,
    pub subcategory: String,
    pub quantity_sold: i64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
}

// ==========================================
// BatchCandidate - FIFO 候选批次（只含分配所需字段）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCandidate {
    pub batch_id: i64,
    pub batch_date: NaiveDate,
    pub remaining_quantity: i64,
    pub unit_cost_base: f64,
}

// ==========================================
// AllocationDraft - 待写入的分配（由 FIFO 引擎规划）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationDraft {
    pub batch_id: i64,
    pub quantity_from_batch: i64,
    pub unit_cost: f64,
    pub unit_sale_price: f64,
    pub profit_per_unit: f64,
}
