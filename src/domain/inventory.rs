// ==========================================
// 库存成本核算系统 - 库存快照领域模型
// ==========================================
// 对齐: inventory 表（派生数据，可随时由 imports 重建）
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub category: String,
    pub subcategory: String,
    pub quantity: i64, // 累计进货数量（非可售数量）
    pub last_updated: NaiveDateTime,
}

// 可售库存估值（按批次剩余数量 × 本位币单价）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockValuation {
    pub category: String,
    pub subcategory: String,
    pub remaining_quantity: i64,
    pub value_base: f64,
}
